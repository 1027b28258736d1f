//! Exposure ledger
//!
//! Each filter channel of a plan tracks frame count, per-frame duration and
//! total duration. Editing any one of them recomputes the others so that
//! `planned_frames × per_frame_seconds` and `total_seconds` never drift
//! apart by more than a second.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};
use crate::hms;

/// Slack when deriving a frame count, so 7 s / 0.14 s is 50 frames, not 51
const FRAME_RATIO_EPSILON: f64 = 1e-6;

/// Largest allowed drift between the stored total and frames × per-frame
pub const TOTAL_TOLERANCE_SECS: f64 = 1.0;

/// One filter channel of an imaging plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanChannel {
    /// Filter name, e.g. `"Ha"` or a custom name
    pub filter: String,
    pub planned_frames: u32,
    #[serde(default)]
    pub completed_frames: u32,
    /// Sub-exposure length in seconds, may be fractional
    pub per_frame_seconds: f64,
    pub total_seconds: f64,
    /// Filter wheel position, needed only for custom filter names
    #[serde(default)]
    pub slot: Option<u32>,
}

/// A single field edit coming from the user-facing layer.
///
/// Counts are signed so that negative form input can be rejected rather
/// than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum LedgerEdit {
    FrameCount(i64),
    PerFrameSeconds(f64),
    TotalSeconds(f64),
    CompletedFrames(i64),
}

impl LedgerEdit {
    /// Total-duration edit from user text such as `"2:30"`
    pub fn total_from_hms(text: &str) -> Option<LedgerEdit> {
        hms::parse_hms(text).map(|secs| LedgerEdit::TotalSeconds(secs as f64))
    }
}

/// Round to millisecond precision so products like 50 × 0.14 land on 7
fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

impl PlanChannel {
    pub fn new(filter: impl Into<String>, planned_frames: u32, per_frame_seconds: f64) -> PlannerResult<Self> {
        let filter = filter.into();
        check_per_frame(&filter, per_frame_seconds)?;
        Ok(Self {
            total_seconds: round_ms(f64::from(planned_frames) * per_frame_seconds),
            filter,
            planned_frames,
            completed_frames: 0,
            per_frame_seconds,
            slot: None,
        })
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Apply one edit and return the recomputed channel.
    ///
    /// On error `self` is untouched and no partial result exists.
    pub fn apply(&self, edit: LedgerEdit) -> PlannerResult<PlanChannel> {
        let mut next = self.clone();

        match edit {
            LedgerEdit::FrameCount(count) => {
                let count = self.count(count, "frame count")?;
                self.check_covers_completed(count)?;
                next.planned_frames = count;
                next.total_seconds = round_ms(f64::from(count) * self.per_frame_seconds);
            }
            LedgerEdit::PerFrameSeconds(seconds) => {
                check_per_frame(&self.filter, seconds)?;
                next.per_frame_seconds = seconds;
                next.total_seconds = round_ms(f64::from(self.planned_frames) * seconds);
            }
            LedgerEdit::TotalSeconds(total) => {
                if !total.is_finite() || total < 0.0 {
                    return Err(PlannerError::validation(
                        &self.filter,
                        format!("total duration {} must be a non-negative number", total),
                    ));
                }
                let ratio = (total / self.per_frame_seconds - FRAME_RATIO_EPSILON).ceil().max(0.0);
                if ratio > f64::from(u32::MAX) {
                    return Err(PlannerError::validation(&self.filter, "total duration needs too many frames"));
                }
                let mut count = ratio as u32;
                // the slack above must never leave the total short of what was entered
                if round_ms(f64::from(count) * self.per_frame_seconds) < round_ms(total) {
                    count = count.checked_add(1).ok_or_else(|| {
                        PlannerError::validation(&self.filter, "total duration needs too many frames")
                    })?;
                }
                self.check_covers_completed(count)?;
                next.planned_frames = count;
                next.total_seconds = round_ms(f64::from(count) * self.per_frame_seconds);
            }
            LedgerEdit::CompletedFrames(count) => {
                let count = self.count(count, "completed frames")?;
                if count > self.planned_frames {
                    return Err(PlannerError::validation(
                        &self.filter,
                        format!(
                            "completed frames ({}) cannot exceed planned frames ({})",
                            count, self.planned_frames
                        ),
                    ));
                }
                next.completed_frames = count;
            }
        }

        tracing::debug!(
            "Ledger edit {:?} on '{}': {} x {}s = {}s",
            edit,
            next.filter,
            next.planned_frames,
            next.per_frame_seconds,
            next.total_seconds
        );
        Ok(next)
    }

    /// Add frames captured in a session
    pub fn record_session(&self, frames: u32) -> PlannerResult<PlanChannel> {
        let completed = i64::from(self.completed_frames) + i64::from(frames);
        self.apply(LedgerEdit::CompletedFrames(completed))
    }

    /// Check the invariants of a record read from persistence
    pub fn validate(&self) -> PlannerResult<()> {
        check_per_frame(&self.filter, self.per_frame_seconds)?;
        if self.completed_frames > self.planned_frames {
            return Err(PlannerError::validation(
                &self.filter,
                "completed frames exceed planned frames",
            ));
        }
        let expected = f64::from(self.planned_frames) * self.per_frame_seconds;
        if !self.total_seconds.is_finite() || (self.total_seconds - expected).abs() > TOTAL_TOLERANCE_SECS {
            return Err(PlannerError::validation(
                &self.filter,
                format!(
                    "total {}s does not match {} x {}s",
                    self.total_seconds, self.planned_frames, self.per_frame_seconds
                ),
            ));
        }
        Ok(())
    }

    pub fn remaining_frames(&self) -> u32 {
        self.planned_frames.saturating_sub(self.completed_frames)
    }

    pub fn remaining_seconds(&self) -> f64 {
        f64::from(self.remaining_frames()) * self.per_frame_seconds
    }

    pub fn completed_seconds(&self) -> f64 {
        f64::from(self.completed_frames) * self.per_frame_seconds
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_frames() == 0
    }

    fn count(&self, value: i64, what: &str) -> PlannerResult<u32> {
        u32::try_from(value).map_err(|_| {
            PlannerError::validation(&self.filter, format!("{} {} is out of range", what, value))
        })
    }

    fn check_covers_completed(&self, planned: u32) -> PlannerResult<()> {
        if planned < self.completed_frames {
            return Err(PlannerError::validation(
                &self.filter,
                format!(
                    "planned frames ({}) cannot drop below completed frames ({})",
                    planned, self.completed_frames
                ),
            ));
        }
        Ok(())
    }
}

fn check_per_frame(filter: &str, seconds: f64) -> PlannerResult<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(PlannerError::validation(
            filter,
            format!("per-frame duration {} must be a positive number of seconds", seconds),
        ));
    }
    Ok(())
}
