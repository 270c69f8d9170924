//! SQLite-backed persistent store for profiles, the evidence log, article
//! stances, policy agreements, rankings, and questionnaire answers.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;

use crate::cache::RosterSource;
use crate::profile::{
    Affiliation, ArticleStance, EvidenceEvent, EvidenceRecord, PartyProfile,
    PersonalRankingEntry, PoliticianProfile, PolicyAgreementRecord, SourceType, Stance,
    UserProfile,
};
use crate::questionnaire::{EnhancedAnswers, LegacyAnswers};
use crate::vector::IdeologyVector;

// =============================================================================
// Error
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

// =============================================================================
// Store
// =============================================================================

#[derive(Clone)]
pub struct SqliteProfileStore {
    conn: Arc<Mutex<Connection>>,
    /// Gate concurrent spawn_blocking calls to prevent Tokio blocking pool
    /// starvation. Only one blocking thread waits on the mutex at a time.
    sem: Arc<Semaphore>,
}

impl SqliteProfileStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             PRAGMA foreign_keys=ON;\
             PRAGMA busy_timeout=5000;",
        )?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            sem: Arc::new(Semaphore::new(1)),
        })
    }

    /// Acquire the connection, recovering from mutex poisoning — the SQLite
    /// connection itself is still usable after a panicked holder.
    fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    /// Same, but with a mutable connection for explicit transactions.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError>,
    {
        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn create_tables(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS politicians (\
               id TEXT PRIMARY KEY,\
               affiliation TEXT NOT NULL DEFAULT 'independent',\
               party TEXT,\
               constituency TEXT,\
               economic REAL NOT NULL DEFAULT 0,\
               social REAL NOT NULL DEFAULT 0,\
               cultural REAL NOT NULL DEFAULT 0,\
               globalism REAL NOT NULL DEFAULT 0,\
               environmental REAL NOT NULL DEFAULT 0,\
               authority REAL NOT NULL DEFAULT 0,\
               welfare REAL NOT NULL DEFAULT 0,\
               technocratic REAL NOT NULL DEFAULT 0,\
               total_weight REAL NOT NULL DEFAULT 0,\
               created_at INTEGER NOT NULL,\
               updated_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS parties (\
               name TEXT PRIMARY KEY,\
               economic REAL NOT NULL DEFAULT 0,\
               social REAL NOT NULL DEFAULT 0,\
               cultural REAL NOT NULL DEFAULT 0,\
               globalism REAL NOT NULL DEFAULT 0,\
               environmental REAL NOT NULL DEFAULT 0,\
               authority REAL NOT NULL DEFAULT 0,\
               welfare REAL NOT NULL DEFAULT 0,\
               technocratic REAL NOT NULL DEFAULT 0,\
               total_weight REAL NOT NULL DEFAULT 0,\
               updated_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS users (\
               id TEXT PRIMARY KEY,\
               economic REAL NOT NULL DEFAULT 0,\
               social REAL NOT NULL DEFAULT 0,\
               cultural REAL NOT NULL DEFAULT 0,\
               globalism REAL NOT NULL DEFAULT 0,\
               environmental REAL NOT NULL DEFAULT 0,\
               authority REAL NOT NULL DEFAULT 0,\
               welfare REAL NOT NULL DEFAULT 0,\
               technocratic REAL NOT NULL DEFAULT 0,\
               total_weight REAL NOT NULL DEFAULT 0,\
               updated_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS evidence_log (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               politician_id TEXT NOT NULL,\
               source_type TEXT NOT NULL,\
               source_id TEXT NOT NULL,\
               policy_topic TEXT NOT NULL,\
               raw_delta TEXT NOT NULL,\
               effective_weight REAL NOT NULL,\
               source_date INTEGER,\
               created_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS article_stances (\
               article_id TEXT NOT NULL,\
               politician_id TEXT NOT NULL,\
               stance TEXT NOT NULL,\
               strength INTEGER NOT NULL,\
               PRIMARY KEY (article_id, politician_id)\
             );\
             CREATE TABLE IF NOT EXISTS policy_agreements (\
               user_id TEXT NOT NULL,\
               politician_id TEXT NOT NULL,\
               agreed_count INTEGER NOT NULL DEFAULT 0,\
               disagreed_count INTEGER NOT NULL DEFAULT 0,\
               total_compared INTEGER NOT NULL DEFAULT 0,\
               agreement_rate REAL NOT NULL DEFAULT 0,\
               cumulative_policy_delta REAL NOT NULL DEFAULT 0,\
               updated_at INTEGER NOT NULL,\
               PRIMARY KEY (user_id, politician_id)\
             );\
             CREATE TABLE IF NOT EXISTS rankings (\
               user_id TEXT NOT NULL,\
               politician_id TEXT NOT NULL,\
               ideology_match REAL NOT NULL,\
               policy_agreement REAL NOT NULL,\
               overall_compatibility REAL NOT NULL,\
               personal_rank INTEGER NOT NULL,\
               updated_at INTEGER NOT NULL,\
               PRIMARY KEY (user_id, politician_id)\
             );\
             CREATE TABLE IF NOT EXISTS legacy_answers (\
               user_id TEXT PRIMARY KEY,\
               immigration INTEGER NOT NULL,\
               healthcare INTEGER NOT NULL,\
               housing INTEGER NOT NULL,\
               economy INTEGER NOT NULL,\
               environment INTEGER NOT NULL,\
               social_issues INTEGER NOT NULL,\
               justice INTEGER NOT NULL,\
               education INTEGER NOT NULL,\
               updated_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS enhanced_answers (\
               user_id TEXT PRIMARY KEY,\
               economic REAL NOT NULL,\
               social REAL NOT NULL,\
               cultural REAL NOT NULL,\
               globalism REAL NOT NULL,\
               environmental REAL NOT NULL,\
               authority REAL NOT NULL,\
               welfare REAL NOT NULL,\
               technocratic REAL NOT NULL,\
               updated_at INTEGER NOT NULL\
             );\
             CREATE INDEX IF NOT EXISTS idx_politicians_party ON politicians(party);\
             CREATE INDEX IF NOT EXISTS idx_evidence_politician \
               ON evidence_log(politician_id, created_at);\
             CREATE INDEX IF NOT EXISTS idx_stances_article ON article_stances(article_id);\
             CREATE INDEX IF NOT EXISTS idx_rankings_user ON rankings(user_id, personal_rank);",
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Politicians
    // -------------------------------------------------------------------------

    pub async fn get_politician(&self, id: &str) -> Result<Option<PoliticianProfile>, StoreError> {
        let store = self.clone();
        let id = id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT id, affiliation, party, constituency, \
                     economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM politicians WHERE id = ?1",
                    params![id],
                    politician_from_row,
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn put_politician(&self, profile: &PoliticianProfile) -> Result<(), StoreError> {
        let store = self.clone();
        let profile = profile.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                upsert_politician(conn, &profile)?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list_politicians(&self) -> Result<Vec<PoliticianProfile>, StoreError> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, affiliation, party, constituency, \
                     economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM politicians ORDER BY id",
                )?;
                let rows = stmt.query_map([], politician_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list_party_members(
        &self,
        party: &str,
    ) -> Result<Vec<PoliticianProfile>, StoreError> {
        let store = self.clone();
        let party = party.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, affiliation, party, constituency, \
                     economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM politicians WHERE party = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![party], politician_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Persist an updated profile and append its evidence record as one
    /// transaction, so a crash can never leave a moved vector without its
    /// audit entry (or vice versa). Returns the evidence row id.
    pub async fn apply_politician_update(
        &self,
        profile: &PoliticianProfile,
        event: &EvidenceEvent,
        effective_weight: f64,
    ) -> Result<i64, StoreError> {
        let store = self.clone();
        let profile = profile.clone();
        let event = event.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                upsert_politician(&tx, &profile)?;
                let id = insert_evidence(&tx, &profile.id, &event, effective_weight)?;
                tx.commit()?;
                Ok(id)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Evidence log
    // -------------------------------------------------------------------------

    /// Append an evidence record without touching the profile. Used for
    /// events whose effective weight is zero — still journaled for audit.
    pub async fn log_evidence(
        &self,
        politician_id: &str,
        event: &EvidenceEvent,
        effective_weight: f64,
    ) -> Result<i64, StoreError> {
        let store = self.clone();
        let politician_id = politician_id.to_string();
        let event = event.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| insert_evidence(conn, &politician_id, &event, effective_weight))
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Most recent evidence first.
    pub async fn evidence_for(
        &self,
        politician_id: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let store = self.clone();
        let politician_id = politician_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, politician_id, source_type, source_id, policy_topic, \
                     raw_delta, effective_weight, source_date, created_at \
                     FROM evidence_log WHERE politician_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![politician_id, limit as i64], |row| {
                    evidence_from_row(row)
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(StoreError::Sqlite)?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Parties
    // -------------------------------------------------------------------------

    pub async fn get_party(&self, name: &str) -> Result<Option<PartyProfile>, StoreError> {
        let store = self.clone();
        let name = name.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT name, economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM parties WHERE name = ?1",
                    params![name],
                    party_from_row,
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn put_party(&self, profile: &PartyProfile) -> Result<(), StoreError> {
        let store = self.clone();
        let profile = profile.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let v = profile.vector.as_array();
                conn.execute(
                    "INSERT INTO parties (name, economic, social, cultural, globalism, \
                     environmental, authority, welfare, technocratic, total_weight, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                     ON CONFLICT(name) DO UPDATE SET \
                       economic = excluded.economic, social = excluded.social, \
                       cultural = excluded.cultural, globalism = excluded.globalism, \
                       environmental = excluded.environmental, authority = excluded.authority, \
                       welfare = excluded.welfare, technocratic = excluded.technocratic, \
                       total_weight = excluded.total_weight, updated_at = excluded.updated_at",
                    params![
                        profile.name,
                        v[0],
                        v[1],
                        v[2],
                        v[3],
                        v[4],
                        v[5],
                        v[6],
                        v[7],
                        profile.total_weight,
                        now_epoch(),
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list_parties(&self) -> Result<Vec<PartyProfile>, StoreError> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM parties ORDER BY name",
                )?;
                let rows = stmt.query_map([], party_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    pub async fn get_user(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        let store = self.clone();
        let id = id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT id, economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic, total_weight \
                     FROM users WHERE id = ?1",
                    params![id],
                    user_from_row,
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn put_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let store = self.clone();
        let profile = profile.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let v = profile.vector.as_array();
                conn.execute(
                    "INSERT INTO users (id, economic, social, cultural, globalism, \
                     environmental, authority, welfare, technocratic, total_weight, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                     ON CONFLICT(id) DO UPDATE SET \
                       economic = excluded.economic, social = excluded.social, \
                       cultural = excluded.cultural, globalism = excluded.globalism, \
                       environmental = excluded.environmental, authority = excluded.authority, \
                       welfare = excluded.welfare, technocratic = excluded.technocratic, \
                       total_weight = excluded.total_weight, updated_at = excluded.updated_at",
                    params![
                        profile.id,
                        v[0],
                        v[1],
                        v[2],
                        v[3],
                        v[4],
                        v[5],
                        v[6],
                        v[7],
                        profile.total_weight,
                        now_epoch(),
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Article stances
    // -------------------------------------------------------------------------

    pub async fn put_article_stance(&self, stance: &ArticleStance) -> Result<(), StoreError> {
        let store = self.clone();
        let stance = stance.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO article_stances (article_id, politician_id, stance, strength) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(article_id, politician_id) DO UPDATE SET \
                       stance = excluded.stance, strength = excluded.strength",
                    params![
                        stance.article_id,
                        stance.politician_id,
                        stance.stance.as_str(),
                        stance.strength as i64,
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn stances_for_article(
        &self,
        article_id: &str,
    ) -> Result<Vec<ArticleStance>, StoreError> {
        let store = self.clone();
        let article_id = article_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT article_id, politician_id, stance, strength \
                     FROM article_stances WHERE article_id = ?1 ORDER BY politician_id",
                )?;
                let rows = stmt.query_map(params![article_id], |row| {
                    Ok(ArticleStance {
                        article_id: row.get(0)?,
                        politician_id: row.get(1)?,
                        stance: Stance::from_str(&row.get::<_, String>(2)?),
                        strength: row.get::<_, i64>(3)? as u8,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Policy agreements
    // -------------------------------------------------------------------------

    pub async fn get_agreement(
        &self,
        user_id: &str,
        politician_id: &str,
    ) -> Result<Option<PolicyAgreementRecord>, StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let politician_id = politician_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT user_id, politician_id, agreed_count, disagreed_count, \
                     total_compared, agreement_rate, cumulative_policy_delta \
                     FROM policy_agreements WHERE user_id = ?1 AND politician_id = ?2",
                    params![user_id, politician_id],
                    |row| {
                        Ok(PolicyAgreementRecord {
                            user_id: row.get(0)?,
                            politician_id: row.get(1)?,
                            agreed_count: row.get(2)?,
                            disagreed_count: row.get(3)?,
                            total_compared: row.get(4)?,
                            agreement_rate: row.get(5)?,
                            cumulative_policy_delta: row.get(6)?,
                        })
                    },
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn put_agreement(&self, record: &PolicyAgreementRecord) -> Result<(), StoreError> {
        let store = self.clone();
        let record = record.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO policy_agreements (user_id, politician_id, agreed_count, \
                     disagreed_count, total_compared, agreement_rate, \
                     cumulative_policy_delta, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(user_id, politician_id) DO UPDATE SET \
                       agreed_count = excluded.agreed_count, \
                       disagreed_count = excluded.disagreed_count, \
                       total_compared = excluded.total_compared, \
                       agreement_rate = excluded.agreement_rate, \
                       cumulative_policy_delta = excluded.cumulative_policy_delta, \
                       updated_at = excluded.updated_at",
                    params![
                        record.user_id,
                        record.politician_id,
                        record.agreed_count,
                        record.disagreed_count,
                        record.total_compared,
                        record.agreement_rate,
                        record.cumulative_policy_delta,
                        now_epoch(),
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Rankings
    // -------------------------------------------------------------------------

    /// Replace a user's entire ranking atomically. The ranking is a full
    /// recomputation, so stale rows from removed politicians must not
    /// survive the write.
    pub async fn upsert_rankings(
        &self,
        user_id: &str,
        entries: &[PersonalRankingEntry],
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let entries = entries.to_vec();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM rankings WHERE user_id = ?1", params![user_id])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO rankings (user_id, politician_id, ideology_match, \
                         policy_agreement, overall_compatibility, personal_rank, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    let now = now_epoch();
                    for entry in &entries {
                        stmt.execute(params![
                            entry.user_id,
                            entry.politician_id,
                            entry.ideology_match,
                            entry.policy_agreement,
                            entry.overall_compatibility,
                            entry.personal_rank as i64,
                            now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get_ranking(
        &self,
        user_id: &str,
        politician_id: &str,
    ) -> Result<Option<PersonalRankingEntry>, StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let politician_id = politician_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT user_id, politician_id, ideology_match, policy_agreement, \
                     overall_compatibility, personal_rank \
                     FROM rankings WHERE user_id = ?1 AND politician_id = ?2",
                    params![user_id, politician_id],
                    ranking_from_row,
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn rankings_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<PersonalRankingEntry>, StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, politician_id, ideology_match, policy_agreement, \
                     overall_compatibility, personal_rank \
                     FROM rankings WHERE user_id = ?1 ORDER BY personal_rank",
                )?;
                let rows = stmt.query_map(params![user_id], ranking_from_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Questionnaire answers
    // -------------------------------------------------------------------------

    pub async fn save_legacy_answers(
        &self,
        user_id: &str,
        answers: &LegacyAnswers,
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let answers = answers.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO legacy_answers (user_id, immigration, healthcare, housing, \
                     economy, environment, social_issues, justice, education, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       immigration = excluded.immigration, healthcare = excluded.healthcare, \
                       housing = excluded.housing, economy = excluded.economy, \
                       environment = excluded.environment, \
                       social_issues = excluded.social_issues, justice = excluded.justice, \
                       education = excluded.education, updated_at = excluded.updated_at",
                    params![
                        user_id,
                        answers.immigration as i64,
                        answers.healthcare as i64,
                        answers.housing as i64,
                        answers.economy as i64,
                        answers.environment as i64,
                        answers.social_issues as i64,
                        answers.justice as i64,
                        answers.education as i64,
                        now_epoch(),
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get_legacy_answers(
        &self,
        user_id: &str,
    ) -> Result<Option<LegacyAnswers>, StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT immigration, healthcare, housing, economy, environment, \
                     social_issues, justice, education \
                     FROM legacy_answers WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(LegacyAnswers {
                            immigration: row.get::<_, i64>(0)? as u8,
                            healthcare: row.get::<_, i64>(1)? as u8,
                            housing: row.get::<_, i64>(2)? as u8,
                            economy: row.get::<_, i64>(3)? as u8,
                            environment: row.get::<_, i64>(4)? as u8,
                            social_issues: row.get::<_, i64>(5)? as u8,
                            justice: row.get::<_, i64>(6)? as u8,
                            education: row.get::<_, i64>(7)? as u8,
                        })
                    },
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn save_enhanced_answers(
        &self,
        user_id: &str,
        answers: &EnhancedAnswers,
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let answers = answers.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let v = answers.values.as_array();
                conn.execute(
                    "INSERT INTO enhanced_answers (user_id, economic, social, cultural, \
                     globalism, environmental, authority, welfare, technocratic, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       economic = excluded.economic, social = excluded.social, \
                       cultural = excluded.cultural, globalism = excluded.globalism, \
                       environmental = excluded.environmental, authority = excluded.authority, \
                       welfare = excluded.welfare, technocratic = excluded.technocratic, \
                       updated_at = excluded.updated_at",
                    params![
                        user_id, v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7],
                        now_epoch(),
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get_enhanced_answers(
        &self,
        user_id: &str,
    ) -> Result<Option<EnhancedAnswers>, StoreError> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    "SELECT economic, social, cultural, globalism, environmental, \
                     authority, welfare, technocratic \
                     FROM enhanced_answers WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(EnhancedAnswers {
                            values: vector_from_row(row, 0)?,
                        })
                    },
                )
                .optional()
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[async_trait::async_trait]
impl RosterSource for SqliteProfileStore {
    async fn load_roster(&self) -> Result<Vec<PoliticianProfile>, StoreError> {
        self.list_politicians().await
    }
}

// =============================================================================
// Row converters
// =============================================================================

/// Read eight REAL columns starting at `start` in canonical dimension order.
/// Clamps on the way out so a corrupted row cannot leak an out-of-range axis.
fn vector_from_row(row: &Row<'_>, start: usize) -> Result<IdeologyVector, rusqlite::Error> {
    let mut values = [0.0_f64; 8];
    for (i, v) in values.iter_mut().enumerate() {
        *v = row.get(start + i)?;
    }
    Ok(IdeologyVector::from_array(values))
}

fn politician_from_row(row: &Row<'_>) -> Result<PoliticianProfile, rusqlite::Error> {
    let tag: String = row.get(1)?;
    let party: Option<String> = row.get(2)?;
    let affiliation = match (tag.as_str(), party) {
        ("affiliated", Some(p)) => Affiliation::Affiliated(p),
        _ => Affiliation::Independent,
    };
    Ok(PoliticianProfile {
        id: row.get(0)?,
        affiliation,
        constituency: row.get(3)?,
        vector: vector_from_row(row, 4)?,
        total_weight: row.get::<_, f64>(12)?.max(0.0),
    })
}

fn party_from_row(row: &Row<'_>) -> Result<PartyProfile, rusqlite::Error> {
    Ok(PartyProfile {
        name: row.get(0)?,
        vector: vector_from_row(row, 1)?,
        total_weight: row.get::<_, f64>(9)?.max(0.0),
    })
}

fn user_from_row(row: &Row<'_>) -> Result<UserProfile, rusqlite::Error> {
    Ok(UserProfile {
        id: row.get(0)?,
        vector: vector_from_row(row, 1)?,
        total_weight: row.get::<_, f64>(9)?.max(0.0),
    })
}

fn ranking_from_row(row: &Row<'_>) -> Result<PersonalRankingEntry, rusqlite::Error> {
    Ok(PersonalRankingEntry {
        user_id: row.get(0)?,
        politician_id: row.get(1)?,
        ideology_match: row.get(2)?,
        policy_agreement: row.get(3)?,
        overall_compatibility: row.get(4)?,
        personal_rank: row.get::<_, i64>(5)? as u32,
    })
}

fn evidence_from_row(row: &Row<'_>) -> Result<EvidenceRecord, rusqlite::Error> {
    let delta_json: String = row.get(5)?;
    // The log is an audit surface; a corrupt delta row fails the read
    // rather than silently reporting an empty adjustment.
    let raw_delta = serde_json::from_str(&delta_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let source_date = row
        .get::<_, Option<i64>>(7)?
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));
    Ok(EvidenceRecord {
        id: row.get(0)?,
        politician_id: row.get(1)?,
        source_type: SourceType::from_str(&row.get::<_, String>(2)?),
        source_id: row.get(3)?,
        policy_topic: row.get(4)?,
        raw_delta,
        effective_weight: row.get(6)?,
        source_date,
        created_at: row.get(8)?,
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn upsert_politician(conn: &Connection, profile: &PoliticianProfile) -> Result<(), StoreError> {
    let v = profile.vector.as_array();
    let (tag, party) = match &profile.affiliation {
        Affiliation::Affiliated(p) => ("affiliated", Some(p.as_str())),
        Affiliation::Independent => ("independent", None),
    };
    let now = now_epoch();
    conn.execute(
        "INSERT INTO politicians (id, affiliation, party, constituency, economic, social, \
         cultural, globalism, environmental, authority, welfare, technocratic, total_weight, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
         ON CONFLICT(id) DO UPDATE SET \
           affiliation = excluded.affiliation, party = excluded.party, \
           constituency = excluded.constituency, economic = excluded.economic, \
           social = excluded.social, cultural = excluded.cultural, \
           globalism = excluded.globalism, environmental = excluded.environmental, \
           authority = excluded.authority, welfare = excluded.welfare, \
           technocratic = excluded.technocratic, total_weight = excluded.total_weight, \
           updated_at = excluded.updated_at",
        params![
            profile.id,
            tag,
            party,
            profile.constituency,
            v[0],
            v[1],
            v[2],
            v[3],
            v[4],
            v[5],
            v[6],
            v[7],
            profile.total_weight,
            now,
            now,
        ],
    )?;
    Ok(())
}

fn insert_evidence(
    conn: &Connection,
    politician_id: &str,
    event: &EvidenceEvent,
    effective_weight: f64,
) -> Result<i64, StoreError> {
    let delta_json =
        serde_json::to_string(&event.raw_delta).map_err(|e| StoreError::Serde(e.to_string()))?;
    conn.execute(
        "INSERT INTO evidence_log (politician_id, source_type, source_id, policy_topic, \
         raw_delta, effective_weight, source_date, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            politician_id,
            event.source_type.as_str(),
            event.source_id,
            event.policy_topic,
            delta_json,
            effective_weight,
            event.source_date.map(|d| d.timestamp()),
            now_epoch(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
