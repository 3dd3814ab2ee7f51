//! Error types for placement planning.
//!
//! Only configuration problems and internal invariant breaches are errors.
//! Unfillable footprints are reported through [`crate::model::LayerStatus`] and
//! collision or overhang findings through [`crate::collision::Violation`].

use thiserror::Error;

/// Result type alias for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Broad classification of a [`PlanError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid input or request parameters.
    Configuration,
    /// The planner produced an inconsistent decomposition.
    InvariantBreach,
}

/// Errors that abort a planning computation.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A dimension, weight or distance is out of range.
    #[error("invalid {field}: {value} (must be positive and finite)")]
    InvalidDimension { field: &'static str, value: f64 },

    /// A request parameter is malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An override references a block that is not part of the layer.
    #[error("unknown block '{key}' in {context}")]
    UnknownBlock { key: String, context: &'static str },

    /// A sequence with zero layers was requested or measured.
    #[error("layer sequence contains no layers")]
    EmptySequence,

    /// The block decomposition overlaps or leaves gaps.
    #[error("planner invariant breached: {0}")]
    InvariantBreach(String),
}

impl PlanError {
    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(details: impl Into<String>) -> Self {
        Self::InvalidParameter(details.into())
    }

    /// Create an unknown block error.
    #[must_use]
    pub fn unknown_block(key: impl Into<String>, context: &'static str) -> Self {
        Self::UnknownBlock {
            key: key.into(),
            context,
        }
    }

    /// Create an invariant breach error.
    #[must_use]
    pub fn invariant_breach(details: impl Into<String>) -> Self {
        Self::InvariantBreach(details.into())
    }

    /// Classifies the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::InvalidDimension { .. }
            | PlanError::InvalidParameter(_)
            | PlanError::UnknownBlock { .. }
            | PlanError::EmptySequence => ErrorKind::Configuration,
            PlanError::InvariantBreach(_) => ErrorKind::InvariantBreach,
        }
    }
}
