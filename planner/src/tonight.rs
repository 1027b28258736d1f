//! Tonight's recommendation and per-target export
//!
//! Glue between a [`PlannerSnapshot`] and the pure components: resolve the
//! observer context per target, compute its window, then rank or export.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::astro::Ephemeris;
use crate::config::{resolve, EffectiveConfig};
use crate::error::{PlannerError, PlannerResult};
use crate::export::{export_sequence, ExportRequest, SequenceDocument};
use crate::priority::{rank, PriorityCandidate, PriorityResult};
use crate::snapshot::{PlannerSnapshot, TargetRecord};
use crate::window::{compute_window, ImagingWindow};
use crate::TargetId;

/// A target left out of the ranking and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub id: TargetId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub night: NaiveDate,
    /// Best first
    pub ranking: Vec<PriorityResult>,
    pub windows: BTreeMap<TargetId, ImagingWindow>,
    pub skipped: Vec<SkippedTarget>,
}

impl Recommendation {
    /// Top observable target, if any
    pub fn best(&self) -> Option<&PriorityResult> {
        self.ranking.first().filter(|r| r.observable)
    }
}

/// Rank every target in the snapshot for `night`.
///
/// A missing global configuration fails the whole call. Targets with bad
/// coordinates or a bad override are logged and skipped.
pub fn recommend_tonight(
    snapshot: &PlannerSnapshot,
    night: NaiveDate,
    ephemeris: &dyn Ephemeris,
) -> PlannerResult<Recommendation> {
    let global = snapshot.settings.observer.as_ref();
    resolve(global, None)?;

    let mut candidates = Vec::with_capacity(snapshot.targets.len());
    let mut windows = BTreeMap::new();
    let mut skipped = Vec::new();

    for target in &snapshot.targets {
        match target_window(snapshot, target, night, ephemeris) {
            Ok(window) => {
                candidates.push(PriorityCandidate::new(
                    target.id,
                    target.name.clone(),
                    target.channels.clone(),
                    &window,
                ));
                windows.insert(target.id, window);
            }
            Err(e) if e.is_per_target() => {
                tracing::warn!("Skipping target {} '{}': {}", target.id, target.name, e);
                skipped.push(SkippedTarget {
                    id: target.id,
                    name: target.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let ranking = rank(&candidates, &snapshot.settings.priority)?;

    Ok(Recommendation {
        night,
        ranking,
        windows,
        skipped,
    })
}

/// Export the remaining exposures of one target as a sequence document
pub fn export_for_target(
    snapshot: &PlannerSnapshot,
    id: TargetId,
    night: NaiveDate,
    now: DateTime<Utc>,
    ephemeris: &dyn Ephemeris,
) -> PlannerResult<SequenceDocument> {
    let target = snapshot.target(id)?;
    let window = target_window(snapshot, target, night, ephemeris)?;

    export_sequence(&ExportRequest {
        target_name: &target.name,
        channels: &target.channels,
        window: &window,
        slots: &snapshot.settings.filter_slots,
        camera_cool_temp_c: snapshot.settings.camera_cool_temp_c,
        now,
    })
}

fn target_window(
    snapshot: &PlannerSnapshot,
    target: &TargetRecord,
    night: NaiveDate,
    ephemeris: &dyn Ephemeris,
) -> PlannerResult<ImagingWindow> {
    let global = snapshot.settings.observer.as_ref();
    resolve(global, None)?;
    let config: EffectiveConfig =
        resolve(global, target.target_override.as_ref()).map_err(|e| match e {
            PlannerError::Configuration(reason) => PlannerError::InvalidOverride {
                target: target.id,
                reason,
            },
            other => other,
        })?;
    let coords = target.geometry().resolve()?;
    let window = compute_window(night, &config, &coords, ephemeris);

    match window.closure {
        Some(closure) => tracing::debug!("{} '{}' window closed: {}", target.id, target.name, closure),
        None => tracing::debug!(
            "{} '{}' usable for {:.0} min",
            target.id,
            target.name,
            window.usable_minutes()
        ),
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::LowPrecisionEphemeris;
    use crate::export::SequenceBlock;
    use chrono::TimeZone;

    // Riyadh, mid-October
    const SNAPSHOT: &str = r#"{
        "settings": {"observer": {"latitude": 24.7136, "longitude": 46.6753, "elevation_m": 600, "utc_offset_minutes": 180}},
        "targets": [
            {"id": 1, "name": "M31", "coordinates": {"ra_hours": 0.712, "dec_deg": 41.27}, "channels": [
                {"filter": "L", "planned_frames": 60, "completed_frames": 50, "per_frame_seconds": 180, "total_seconds": 10800}
            ]},
            {"id": 2, "name": "NGC 7000", "coordinates": {"ra_hours": 20.98, "dec_deg": 44.33}, "channels": [
                {"filter": "Ha", "planned_frames": 40, "completed_frames": 0, "per_frame_seconds": 300, "total_seconds": 12000},
                {"filter": "OIII", "planned_frames": 20, "completed_frames": 20, "per_frame_seconds": 300, "total_seconds": 6000}
            ]},
            {"id": 3, "name": "Southern Cross", "coordinates": {"ra_hours": 12.45, "dec_deg": -60.0}, "channels": [
                {"filter": "R", "planned_frames": 10, "completed_frames": 0, "per_frame_seconds": 180, "total_seconds": 1800}
            ]},
            {"id": 4, "name": "Typo", "coordinates": {"ra": "??", "dec": "+10"}, "channels": [
                {"filter": "L", "planned_frames": 10, "completed_frames": 0, "per_frame_seconds": 180, "total_seconds": 1800}
            ]}
        ]
    }"#;

    fn night() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    #[test]
    fn test_recommendation_order_and_skips() {
        let snapshot = PlannerSnapshot::from_json(SNAPSHOT).unwrap();
        let rec = recommend_tonight(&snapshot, night(), &LowPrecisionEphemeris).unwrap();

        let ids: Vec<i64> = rec.ranking.iter().map(|r| r.id.0).collect();
        // fresh NGC 7000 beats nearly finished M31, Crux never clears 30° from Riyadh
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(rec.best().map(|r| r.name.as_str()), Some("NGC 7000"));
        assert_eq!(rec.ranking[0].dominant_filter.as_deref(), Some("Ha"));
        assert!(!rec.ranking[2].observable);

        assert_eq!(rec.skipped.len(), 1);
        assert_eq!(rec.skipped[0].id, TargetId(4));
        assert!(!rec.windows.contains_key(&TargetId(4)));
    }

    #[test]
    fn test_missing_observer_is_fatal() {
        let snapshot = PlannerSnapshot::from_json(r#"{"settings": {}, "targets": []}"#).unwrap();
        let err = recommend_tonight(&snapshot, night(), &LowPrecisionEphemeris).unwrap_err();
        assert!(matches!(err, PlannerError::Configuration(_)));
    }

    #[test]
    fn test_bad_override_skips_only_that_target() {
        let json = r#"{
            "settings": {"observer": {"latitude": 24.7136, "longitude": 46.6753, "utc_offset_minutes": 180}},
            "targets": [
                {"id": 1, "name": "M31", "coordinates": {"ra_hours": 0.712, "dec_deg": 41.27},
                 "override": {"min_altitude_deg": 120}, "channels": [
                    {"filter": "L", "planned_frames": 10, "completed_frames": 0, "per_frame_seconds": 180, "total_seconds": 1800}
                ]},
                {"id": 2, "name": "NGC 7000", "coordinates": {"ra_hours": 20.98, "dec_deg": 44.33}, "channels": [
                    {"filter": "Ha", "planned_frames": 10, "completed_frames": 0, "per_frame_seconds": 300, "total_seconds": 3000}
                ]}
            ]
        }"#;
        let snapshot = PlannerSnapshot::from_json(json).unwrap();
        let rec = recommend_tonight(&snapshot, night(), &LowPrecisionEphemeris).unwrap();

        assert_eq!(rec.ranking.len(), 1);
        assert_eq!(rec.ranking[0].id, TargetId(2));
        assert_eq!(rec.skipped.len(), 1);
        assert_eq!(rec.skipped[0].id, TargetId(1));
        assert!(rec.skipped[0].reason.contains("override"));

        let now = Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap();
        let err = export_for_target(&snapshot, TargetId(1), night(), now, &LowPrecisionEphemeris).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidOverride { target: TargetId(1), .. }));
    }

    #[test]
    fn test_export_for_target() {
        let snapshot = PlannerSnapshot::from_json(SNAPSHOT).unwrap();
        // local noon, long before dusk
        let now = Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap();
        let doc = export_for_target(&snapshot, TargetId(2), night(), now, &LowPrecisionEphemeris).unwrap();

        assert!(matches!(doc.blocks[0], SequenceBlock::Cool { .. }));
        assert!(matches!(doc.blocks[1], SequenceBlock::Wait { .. }));
        assert_eq!(
            doc.blocks[2],
            SequenceBlock::ChangeFilter {
                filter: "Ha".to_string(),
                slot: 5
            }
        );
        assert_eq!(
            doc.blocks[3],
            SequenceBlock::Expose {
                frames: 40,
                exposure_seconds: 300.0
            }
        );
        assert_eq!(doc.blocks.last(), Some(&SequenceBlock::Park));
        assert_eq!(doc.blocks.len(), 5);
    }

    #[test]
    fn test_export_errors() {
        let snapshot = PlannerSnapshot::from_json(SNAPSHOT).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap();

        let err = export_for_target(&snapshot, TargetId(3), night(), now, &LowPrecisionEphemeris).unwrap_err();
        assert!(matches!(err, PlannerError::NotObservableTonight { .. }));

        let err = export_for_target(&snapshot, TargetId(4), night(), now, &LowPrecisionEphemeris).unwrap_err();
        assert!(matches!(err, PlannerError::Geometry { .. }));

        let err = export_for_target(&snapshot, TargetId(99), night(), now, &LowPrecisionEphemeris).unwrap_err();
        assert_eq!(err, PlannerError::UnknownTarget(TargetId(99)));
    }
}
