//! Planner snapshot document
//!
//! A point-in-time copy of everything the persistence layer owns: settings,
//! targets, their overrides and plan channels. Every computation reads one
//! snapshot and never holds on to it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{PlannerSettings, TargetOverride};
use crate::coords::{Coordinates, TargetGeometry};
use crate::error::{PlannerError, PlannerResult};
use crate::ledger::PlanChannel;
use crate::TargetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetId,
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default, rename = "override")]
    pub target_override: Option<TargetOverride>,
    /// Plan order is export order
    #[serde(default)]
    pub channels: Vec<PlanChannel>,
}

impl TargetRecord {
    pub fn geometry(&self) -> TargetGeometry {
        TargetGeometry {
            id: self.id,
            name: self.name.clone(),
            coordinates: self.coordinates.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerSnapshot {
    #[serde(default)]
    pub settings: PlannerSettings,
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
}

impl PlannerSnapshot {
    /// Parse a snapshot and check its settings and every plan channel
    pub fn from_json(json: &str) -> PlannerResult<Self> {
        let snapshot: PlannerSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Read a snapshot file, applying observer environment overrides
    pub fn load(path: &Path) -> PlannerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::Settings(format!("{}: {}", path.display(), e)))?;
        let mut snapshot = Self::from_json(&text)?;
        if let Some(observer) = snapshot.settings.observer.as_mut() {
            observer.apply_env()?;
        }
        tracing::debug!(
            "Loaded snapshot {} with {} targets",
            path.display(),
            snapshot.targets.len()
        );
        Ok(snapshot)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        self.settings.validate()?;
        for target in &self.targets {
            for channel in &target.channels {
                channel.validate()?;
            }
        }
        Ok(())
    }

    pub fn target(&self, id: TargetId) -> PlannerResult<&TargetRecord> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .ok_or(PlannerError::UnknownTarget(id))
    }
}
