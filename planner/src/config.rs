//! Observer configuration and the context resolver
//!
//! The global [`ObserverConfig`] row and an optional per-target
//! [`TargetOverride`] are merged into one [`EffectiveConfig`] before any
//! window or priority computation runs.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};
use crate::filters::FilterSlots;
use crate::priority::PriorityWeights;

/// Largest UTC offset accepted for an observer (18 hours)
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Global observer defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Latitude in degrees, north positive
    pub latitude: f64,
    /// Longitude in degrees, east positive
    pub longitude: f64,
    /// Elevation above sea level in meters
    #[serde(default)]
    pub elevation_m: f64,
    /// Local time offset from UTC in minutes (east positive)
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Minimum target altitude for imaging, degrees
    #[serde(default = "default_min_altitude")]
    pub min_altitude_deg: f64,
    /// Minutes reserved before the end of darkness for shutting down
    #[serde(default = "default_packup_minutes")]
    pub packup_offset_minutes: u32,
    /// Bumped by the persistence layer on every change of this row
    #[serde(default)]
    pub version: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        // Riyadh
        Self {
            latitude: 24.7136,
            longitude: 46.6753,
            elevation_m: 600.0,
            utc_offset_minutes: 180,
            min_altitude_deg: default_min_altitude(),
            packup_offset_minutes: default_packup_minutes(),
            version: 0,
        }
    }
}

fn default_min_altitude() -> f64 {
    30.0
}

fn default_packup_minutes() -> u32 {
    30
}

impl ObserverConfig {
    /// Check ranges of every field
    pub fn validate(&self) -> PlannerResult<()> {
        if !self.latitude.is_finite() || self.latitude.abs() > 90.0 {
            return Err(PlannerError::Configuration(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || self.longitude.abs() > 180.0 {
            return Err(PlannerError::Configuration(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.elevation_m.is_finite() {
            return Err(PlannerError::Configuration("elevation is not a number".to_string()));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(PlannerError::Configuration(format!(
                "UTC offset of {} minutes is out of range",
                self.utc_offset_minutes
            )));
        }
        check_min_altitude(self.min_altitude_deg)?;
        Ok(())
    }

    /// The observer's local time zone as a fixed offset
    pub fn timezone(&self) -> PlannerResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            PlannerError::Configuration(format!(
                "UTC offset of {} minutes is not representable",
                self.utc_offset_minutes
            ))
        })
    }

    /// Apply `OBSERVER_*` environment variables on top of this configuration
    pub fn apply_env(&mut self) -> PlannerResult<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> PlannerResult<()> {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> PlannerResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| PlannerError::Configuration(format!("{} has invalid value '{}'", key, raw)))
        }

        if let Some(raw) = lookup("OBSERVER_LAT") {
            self.latitude = parse("OBSERVER_LAT", &raw)?;
        }
        if let Some(raw) = lookup("OBSERVER_LON") {
            self.longitude = parse("OBSERVER_LON", &raw)?;
        }
        if let Some(raw) = lookup("OBSERVER_ELEV_M") {
            self.elevation_m = parse("OBSERVER_ELEV_M", &raw)?;
        }
        if let Some(raw) = lookup("OBSERVER_UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = parse("OBSERVER_UTC_OFFSET_MINUTES", &raw)?;
        }
        Ok(())
    }
}

fn check_min_altitude(value: f64) -> PlannerResult<()> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        return Err(PlannerError::Configuration(format!(
            "minimum altitude {} is outside [-90, 90]",
            value
        )));
    }
    Ok(())
}

/// Per-target replacements for the global defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetOverride {
    #[serde(default)]
    pub min_altitude_deg: Option<f64>,
    #[serde(default)]
    pub packup_offset_minutes: Option<u32>,
}

/// Observer configuration in force for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub utc_offset_minutes: i32,
    pub min_altitude_deg: f64,
    pub packup_offset_minutes: u32,
    /// Version of the global row this was resolved from
    pub config_version: u64,
}

impl EffectiveConfig {
    pub fn timezone(&self) -> FixedOffset {
        // Range was checked during resolution
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn packup_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.packup_offset_minutes))
    }

    /// False once the global row has changed since this was resolved
    pub fn is_current_for(&self, global: &ObserverConfig) -> bool {
        self.config_version == global.version
    }
}

/// Merge the global defaults with an optional target override.
///
/// Each overridable field is taken from the override when present,
/// otherwise from the global row.
pub fn resolve(
    global: Option<&ObserverConfig>,
    target_override: Option<&TargetOverride>,
) -> PlannerResult<EffectiveConfig> {
    let global = global.ok_or_else(|| {
        PlannerError::Configuration("no global observer configuration exists".to_string())
    })?;
    global.validate()?;

    let min_altitude_deg = target_override
        .and_then(|o| o.min_altitude_deg)
        .unwrap_or(global.min_altitude_deg);
    check_min_altitude(min_altitude_deg)?;

    let packup_offset_minutes = target_override
        .and_then(|o| o.packup_offset_minutes)
        .unwrap_or(global.packup_offset_minutes);

    Ok(EffectiveConfig {
        latitude: global.latitude,
        longitude: global.longitude,
        elevation_m: global.elevation_m,
        utc_offset_minutes: global.utc_offset_minutes,
        min_altitude_deg,
        packup_offset_minutes,
        config_version: global.version,
    })
}

/// Top-level settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// Global observer row; `None` means it has not been created yet
    #[serde(default)]
    pub observer: Option<ObserverConfig>,
    #[serde(default)]
    pub priority: PriorityWeights,
    #[serde(default)]
    pub filter_slots: FilterSlots,
    /// Camera cooling set point for exported sequences, °C
    #[serde(default = "default_cool_temperature")]
    pub camera_cool_temp_c: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            observer: Some(ObserverConfig::default()),
            priority: PriorityWeights::default(),
            filter_slots: FilterSlots::default(),
            camera_cool_temp_c: default_cool_temperature(),
        }
    }
}

fn default_cool_temperature() -> f64 {
    -10.0
}

impl PlannerSettings {
    pub fn from_json(json: &str) -> PlannerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the parts that serde defaults cannot guard
    pub fn validate(&self) -> PlannerResult<()> {
        self.priority.validate()?;
        self.filter_slots.validate()
    }
}
