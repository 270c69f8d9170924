//! Adaptive delta kernel — diminishing returns, extremity resistance, and
//! the asymmetric direction penalty.
//!
//! One parameterized kernel serves two value spaces: ideology axes
//! ([-10, +10], applied per dimension by the profile update engine) and
//! compatibility scores ([0, 100], applied per vote by the vote processor).
//! A [`DeltaScale`] describes the space; [`bounded_delta`] applies the
//! shared pipeline:
//!
//! 1. diminishing returns — the more evidence already accumulated, the
//!    smaller any single new event's effect, producing convergence rather
//!    than oscillation;
//! 2. extremity resistance — values near the edges of the space are roughly
//!    twice as resistant to further movement as values near the midpoint;
//! 3. direction penalty — moves that push an already-extreme value further
//!    toward the edge are discounted, so becoming *more* extreme is
//!    specifically harder than moving at all;
//! 4. a hard per-event cap regardless of the factors above.

/// Exponential half-life of evidence relevance, in days.
pub const HALF_LIFE_DAYS: f64 = 180.0;
/// Floor on time decay — even ancient evidence retains 5% of its weight.
pub const DECAY_FLOOR: f64 = 0.05;
/// Multiplier applied to moves that push an extreme value further out.
pub const DIRECTION_PENALTY: f64 = 0.7;
/// Fraction of movement lost at the very edge of the value space.
pub const EXTREMITY_RESISTANCE: f64 = 0.5;

/// Geometry of a value space the kernel operates in.
#[derive(Debug, Clone, Copy)]
pub struct DeltaScale {
    /// Center of the space (0 for ideology axes, 50 for compatibility).
    pub midpoint: f64,
    /// Distance from midpoint to either edge.
    pub half_range: f64,
    /// Distance from midpoint beyond which the direction penalty applies.
    pub soft_limit: f64,
    /// Hard cap on any single bounded delta, in absolute terms.
    pub cap: f64,
}

/// Ideology axes: [-10, +10], direction penalty past ±5, per-event cap 0.2.
pub const VECTOR_SPACE: DeltaScale = DeltaScale {
    midpoint: 0.0,
    half_range: 10.0,
    soft_limit: 5.0,
    cap: 0.2,
};

/// Compatibility scores: [0, 100], direction penalty outside 25..75,
/// per-vote cap 2.0.
pub const COMPAT_SPACE: DeltaScale = DeltaScale {
    midpoint: 50.0,
    half_range: 50.0,
    soft_limit: 25.0,
    cap: 2.0,
};

/// `1 / (1 + log10(1 + accumulated))` — strictly decreasing in the amount
/// of evidence already absorbed.
pub fn diminishing_factor(accumulated: f64) -> f64 {
    1.0 / (1.0 + (1.0 + accumulated.max(0.0)).log10())
}

/// `1 - (|current - midpoint| / half_range) × 0.5` — 1.0 at the midpoint,
/// 0.5 at either edge.
pub fn extremity_factor(current: f64, scale: &DeltaScale) -> f64 {
    let offset = (current - scale.midpoint).abs().min(scale.half_range);
    1.0 - (offset / scale.half_range) * EXTREMITY_RESISTANCE
}

/// 0.7 when the move pushes an already-extreme value further past the soft
/// limit in the same sign direction, else 1.0.
pub fn direction_factor(current: f64, delta: f64, scale: &DeltaScale) -> f64 {
    let offset = current - scale.midpoint;
    if offset.abs() > scale.soft_limit && offset.signum() == delta.signum() && delta != 0.0 {
        DIRECTION_PENALTY
    } else {
        1.0
    }
}

/// Apply the full kernel to a raw delta and clamp to the per-event cap.
///
/// `accumulated` is the evidence mass already absorbed (a politician's
/// `total_weight`, or a user/politician pair's `total_compared`); `current`
/// is the value being moved.
pub fn bounded_delta(raw: f64, accumulated: f64, current: f64, scale: &DeltaScale) -> f64 {
    let adjusted = raw
        * diminishing_factor(accumulated)
        * extremity_factor(current, scale)
        * direction_factor(current, raw, scale);
    adjusted.clamp(-scale.cap, scale.cap)
}

/// Time decay for dated evidence: `max(0.05, 0.5 ^ (days / half_life))`.
/// Undated or future-dated evidence is treated as fresh (decay 1.0).
pub fn time_decay(days_since: f64, half_life_days: f64, floor: f64) -> f64 {
    let days = days_since.max(0.0);
    0.5_f64.powf(days / half_life_days).max(floor)
}
