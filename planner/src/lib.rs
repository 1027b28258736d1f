//! AstroPlanner planning engine
//!
//! Works out when a target can be imaged tonight, which target deserves the
//! night, keeps per-filter exposure bookkeeping consistent, and exports the
//! remaining exposures as an automation sequence for telescope-control
//! software.
//!
//! All computation is synchronous and works on explicitly passed snapshots
//! of the persisted records.

pub mod astro;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod filters;
pub mod hms;
pub mod ledger;
pub mod palette;
pub mod priority;
pub mod snapshot;
pub mod tonight;
pub mod window;

pub use astro::{Ephemeris, LowPrecisionEphemeris};
pub use config::{resolve, EffectiveConfig, ObserverConfig, PlannerSettings, TargetOverride};
pub use coords::{Coordinates, EquatorialCoords, TargetGeometry};
pub use error::{PlannerError, PlannerResult};
pub use export::{export_sequence, ExportRequest, SequenceBlock, SequenceDocument};
pub use filters::FilterSlots;
pub use ledger::{LedgerEdit, PlanChannel};
pub use priority::{rank, PriorityCandidate, PriorityResult, PriorityWeights};
pub use snapshot::{PlannerSnapshot, TargetRecord};
pub use tonight::{export_for_target, recommend_tonight, Recommendation};
pub use window::{compute_window, ImagingWindow, TimeSpan, WindowClosure};

use serde::{Deserialize, Serialize};

/// Identifier of a persisted target record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub i64);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
