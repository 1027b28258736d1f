//! Error types for the planning engine
//!
//! Every fallible operation in this crate returns [`PlannerError`].
//!
//! # Error Categories
//!
//! - Configuration: no usable global observer configuration
//! - Geometry: a target's coordinates are missing or unparsable
//! - Override: a target's own overrides hold an out-of-range value
//! - Validation: an exposure ledger edit would break a frame-count invariant
//! - Export: the sequence exporter cannot build a document
//!
//! An empty imaging window is *not* an error for window computation or
//! ranking; it only becomes [`PlannerError::NotObservableTonight`] when a
//! sequence export is requested for it.

use thiserror::Error;

use crate::TargetId;

/// Main error type for the planning engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================

    /// No global observer configuration exists, or it is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Settings or snapshot document could not be read or parsed
    #[error("Settings error: {0}")]
    Settings(String),

    /// Priority weights are negative or not finite
    #[error("Invalid priority weights: {0}")]
    InvalidWeights(String),

    // =========================================================================
    // Target Errors
    // =========================================================================

    /// No target with this id in the snapshot
    #[error("Unknown target {0}")]
    UnknownTarget(TargetId),

    /// Target coordinates are missing or unparsable
    #[error("Geometry error for target {target}: {reason}")]
    Geometry {
        target: TargetId,
        reason: String,
    },

    /// A per-target override value is out of range
    #[error("Invalid override for target {target}: {reason}")]
    InvalidOverride {
        target: TargetId,
        reason: String,
    },

    // =========================================================================
    // Ledger Errors
    // =========================================================================

    /// Ledger edit rejected, prior channel state is unchanged
    #[error("Validation error on channel '{filter}': {reason}")]
    Validation {
        filter: String,
        reason: String,
    },

    // =========================================================================
    // Export Errors
    // =========================================================================

    /// A custom filter name has no hardware slot
    #[error("Filter '{0}' has no hardware slot mapping; add a slot for it before exporting")]
    UnmappedFilter(String),

    /// The target has no usable imaging window tonight
    #[error("Target '{target}' is not observable tonight: {reason}")]
    NotObservableTonight {
        target: String,
        reason: String,
    },

    /// Every channel of the plan is already complete
    #[error("Target '{0}' has no remaining exposures to export")]
    NothingToExport(String),
}

impl PlannerError {
    pub fn validation(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    pub fn geometry(target: TargetId, reason: impl Into<String>) -> Self {
        Self::Geometry {
            target,
            reason: reason.into(),
        }
    }

    /// Errors that only affect a single target during batch work
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            Self::Geometry { .. } | Self::InvalidOverride { .. } | Self::NotObservableTonight { .. }
        )
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        PlannerError::Settings(e.to_string())
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(e: std::io::Error) -> Self {
        PlannerError::Settings(e.to_string())
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_filter_names_the_filter() {
        let err = PlannerError::UnmappedFilter("Duo-NB1".to_string());
        assert!(err.to_string().contains("Duo-NB1"));
    }

    #[test]
    fn test_per_target_classification() {
        assert!(PlannerError::geometry(TargetId(3), "missing RA").is_per_target());
        assert!(PlannerError::InvalidOverride {
            target: TargetId(3),
            reason: "min altitude 120".to_string()
        }
        .is_per_target());
        assert!(!PlannerError::Configuration("none".to_string()).is_per_target());
        assert!(!PlannerError::validation("Ha", "negative").is_per_target());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: PlannerError = parse.unwrap_err().into();
        assert!(matches!(err, PlannerError::Settings(_)));
    }
}
