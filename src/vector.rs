//! The 8-dimensional ideology vector model.
//!
//! Every tracked politician, party, and user holds one `IdeologyVector`:
//! eight named axes, each clamped to [-10, +10] at every boundary. Evidence
//! events carry an `IdeologyDelta` — a partial vector whose present
//! components are pre-bounded to ±0.5 by the upstream extractor.
//!
//! All raw floats entering the system pass through the coercion functions in
//! this module. Malformed upstream data is rejected here, before any profile
//! mutation, so no downstream consumer ever observes an out-of-range
//! component.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound of every ideology axis.
pub const AXIS_MIN: f64 = -10.0;
/// Upper bound of every ideology axis.
pub const AXIS_MAX: f64 = 10.0;
/// Per-dimension bound on raw evidence deltas. The upstream extractor
/// promises ±0.5; anything outside is malformed and rejected.
pub const RAW_DELTA_BOUND: f64 = 0.5;

/// The eight ideology axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Economic,
    Social,
    Cultural,
    Globalism,
    Environmental,
    Authority,
    Welfare,
    Technocratic,
}

impl Dimension {
    /// All axes in canonical storage order.
    pub const ALL: [Dimension; 8] = [
        Dimension::Economic,
        Dimension::Social,
        Dimension::Cultural,
        Dimension::Globalism,
        Dimension::Environmental,
        Dimension::Authority,
        Dimension::Welfare,
        Dimension::Technocratic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Economic => "economic",
            Self::Social => "social",
            Self::Cultural => "cultural",
            Self::Globalism => "globalism",
            Self::Environmental => "environmental",
            Self::Authority => "authority",
            Self::Welfare => "welfare",
            Self::Technocratic => "technocratic",
        }
    }
}

/// Errors raised when raw upstream numbers fail coercion.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("{dimension:?} delta {value} outside ±{RAW_DELTA_BOUND}")]
    DeltaOutOfRange { dimension: Dimension, value: f64 },
    #[error("{dimension:?} value is not finite")]
    NotFinite { dimension: Dimension },
}

/// A position in the 8-dimensional ideology space.
///
/// Invariant: every component stays in [`AXIS_MIN`, `AXIS_MAX`]. The setters
/// clamp, so arithmetic through this type cannot escape the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeologyVector {
    pub economic: f64,
    pub social: f64,
    pub cultural: f64,
    pub globalism: f64,
    pub environmental: f64,
    pub authority: f64,
    pub welfare: f64,
    pub technocratic: f64,
}

impl IdeologyVector {
    pub const ZERO: IdeologyVector = IdeologyVector {
        economic: 0.0,
        social: 0.0,
        cultural: 0.0,
        globalism: 0.0,
        environmental: 0.0,
        authority: 0.0,
        welfare: 0.0,
        technocratic: 0.0,
    };

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Economic => self.economic,
            Dimension::Social => self.social,
            Dimension::Cultural => self.cultural,
            Dimension::Globalism => self.globalism,
            Dimension::Environmental => self.environmental,
            Dimension::Authority => self.authority,
            Dimension::Welfare => self.welfare,
            Dimension::Technocratic => self.technocratic,
        }
    }

    /// Set one component, clamped to the axis range.
    pub fn set(&mut self, dimension: Dimension, value: f64) {
        let value = clamp_axis(value);
        match dimension {
            Dimension::Economic => self.economic = value,
            Dimension::Social => self.social = value,
            Dimension::Cultural => self.cultural = value,
            Dimension::Globalism => self.globalism = value,
            Dimension::Environmental => self.environmental = value,
            Dimension::Authority => self.authority = value,
            Dimension::Welfare => self.welfare = value,
            Dimension::Technocratic => self.technocratic = value,
        }
    }

    /// Components in canonical order (matching [`Dimension::ALL`]).
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.economic,
            self.social,
            self.cultural,
            self.globalism,
            self.environmental,
            self.authority,
            self.welfare,
            self.technocratic,
        ]
    }

    /// Build from components in canonical order, clamping each.
    pub fn from_array(values: [f64; 8]) -> Self {
        let mut v = IdeologyVector::ZERO;
        for (dim, value) in Dimension::ALL.iter().zip(values) {
            v.set(*dim, value);
        }
        v
    }

    /// Re-clamp every component. Used when loading from storage so a
    /// corrupted row can never leak an out-of-range value.
    pub fn clamped(self) -> Self {
        Self::from_array(self.as_array())
    }

    /// Mean absolute per-dimension difference. Spans 0 (identical) to 20
    /// (maximally opposed on every axis).
    pub fn avg_abs_diff(&self, other: &IdeologyVector) -> f64 {
        let a = self.as_array();
        let b = other.as_array();
        let total: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
        total / Dimension::ALL.len() as f64
    }
}

/// A partial vector adjustment. Absent components leave the profile
/// untouched; present components must be finite and within ±0.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeologyDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globalism: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welfare: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technocratic: Option<f64>,
}

impl IdeologyDelta {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Economic => self.economic,
            Dimension::Social => self.social,
            Dimension::Cultural => self.cultural,
            Dimension::Globalism => self.globalism,
            Dimension::Environmental => self.environmental,
            Dimension::Authority => self.authority,
            Dimension::Welfare => self.welfare,
            Dimension::Technocratic => self.technocratic,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        let slot = match dimension {
            Dimension::Economic => &mut self.economic,
            Dimension::Social => &mut self.social,
            Dimension::Cultural => &mut self.cultural,
            Dimension::Globalism => &mut self.globalism,
            Dimension::Environmental => &mut self.environmental,
            Dimension::Authority => &mut self.authority,
            Dimension::Welfare => &mut self.welfare,
            Dimension::Technocratic => &mut self.technocratic,
        };
        *slot = Some(value);
    }

    /// Present components in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL
            .iter()
            .filter_map(|d| self.get(*d).map(|v| (*d, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Boundary validation: every present component must be finite and
    /// within the extractor's ±0.5 promise. Called before any profile
    /// mutation so a malformed event is never partially applied.
    pub fn validate(&self) -> Result<(), VectorError> {
        for (dimension, value) in self.iter() {
            coerce_raw_delta(dimension, value)?;
        }
        Ok(())
    }
}

/// Clamp a stored or computed component into the axis range.
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(AXIS_MIN, AXIS_MAX)
}

/// The single coerce-and-clamp boundary for raw evidence deltas.
/// Non-finite or out-of-range input fails loudly; valid input passes
/// through unchanged.
pub fn coerce_raw_delta(dimension: Dimension, value: f64) -> Result<f64, VectorError> {
    if !value.is_finite() {
        return Err(VectorError::NotFinite { dimension });
    }
    if value.abs() > RAW_DELTA_BOUND {
        return Err(VectorError::DeltaOutOfRange { dimension, value });
    }
    Ok(value)
}

/// Coerce an optional [0,1] factor (weight, confidence, reliability) with a
/// default of 1 when absent. NaN degrades to the default rather than
/// poisoning downstream products.
pub fn coerce_unit_factor(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 1.0,
    }
}
