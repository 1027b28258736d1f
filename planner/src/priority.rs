//! Tonight's target ranking
//!
//! Each active target gets a score from how much of its plan is still
//! missing and how long it is usable tonight:
//!
//! ```text
//! score = completion_weight × (1 − completion_ratio)
//!       + window_weight × min(1, usable_minutes / window_saturation_minutes)
//! ```
//!
//! Observable targets always sort before targets with an empty window.
//! Ties fall back to the target id, so the order never depends on input
//! order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};
use crate::hms;
use crate::ledger::PlanChannel;
use crate::window::{ImagingWindow, WindowClosure};
use crate::TargetId;

/// Tunable scoring weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    #[serde(default = "default_completion_weight")]
    pub completion_weight: f64,
    #[serde(default = "default_window_weight")]
    pub window_weight: f64,
    /// Usable minutes beyond which a longer window adds nothing
    #[serde(default = "default_window_saturation")]
    pub window_saturation_minutes: f64,
}

fn default_completion_weight() -> f64 {
    0.6
}

fn default_window_weight() -> f64 {
    0.4
}

fn default_window_saturation() -> f64 {
    360.0
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            completion_weight: default_completion_weight(),
            window_weight: default_window_weight(),
            window_saturation_minutes: default_window_saturation(),
        }
    }
}

impl PriorityWeights {
    pub fn validate(&self) -> PlannerResult<()> {
        for (name, value) in [
            ("completion_weight", self.completion_weight),
            ("window_weight", self.window_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlannerError::InvalidWeights(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.window_saturation_minutes.is_finite() || self.window_saturation_minutes <= 0.0 {
            return Err(PlannerError::InvalidWeights(format!(
                "window_saturation_minutes must be positive, got {}",
                self.window_saturation_minutes
            )));
        }
        Ok(())
    }

    pub fn score(&self, completion_ratio: f64, usable_minutes: f64) -> f64 {
        let missing = 1.0 - completion_ratio.clamp(0.0, 1.0);
        let window = (usable_minutes.max(0.0) / self.window_saturation_minutes).min(1.0);
        self.completion_weight * missing + self.window_weight * window
    }
}

/// One target's state going into the ranking
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityCandidate {
    pub id: TargetId,
    pub name: String,
    pub channels: Vec<PlanChannel>,
    pub usable_minutes: f64,
    /// Why the window is empty; `None` when observable
    pub closure: Option<WindowClosure>,
}

impl PriorityCandidate {
    pub fn new(id: TargetId, name: impl Into<String>, channels: Vec<PlanChannel>, window: &ImagingWindow) -> Self {
        Self {
            id,
            name: name.into(),
            channels,
            usable_minutes: window.usable_minutes(),
            closure: if window.is_empty() {
                Some(window.closure.unwrap_or(WindowClosure::OutsideDarkness))
            } else {
                None
            },
        }
    }

    pub fn is_observable(&self) -> bool {
        self.closure.is_none()
    }

    /// Any channel with frames still to take
    pub fn is_active(&self) -> bool {
        self.channels.iter().any(|c| !c.is_complete())
    }

    /// Completed share of the planned exposure time, in [0, 1]
    pub fn completion_ratio(&self) -> f64 {
        let planned: f64 = self
            .channels
            .iter()
            .map(|c| f64::from(c.planned_frames) * c.per_frame_seconds)
            .sum();
        if planned <= 0.0 {
            return 1.0;
        }
        let completed: f64 = self
            .channels
            .iter()
            .map(|c| f64::from(c.completed_frames.min(c.planned_frames)) * c.per_frame_seconds)
            .sum();
        (completed / planned).clamp(0.0, 1.0)
    }

    /// Incomplete channel with the most remaining time, first in plan order on ties
    pub fn dominant_channel(&self) -> Option<&PlanChannel> {
        self.channels
            .iter()
            .filter(|c| !c.is_complete())
            .fold(None, |best: Option<&PlanChannel>, channel| match best {
                Some(b) if b.remaining_seconds() >= channel.remaining_seconds() => Some(b),
                _ => Some(channel),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityResult {
    pub id: TargetId,
    pub name: String,
    pub score: f64,
    pub observable: bool,
    pub completion_ratio: f64,
    pub usable_minutes: f64,
    pub dominant_filter: Option<String>,
    pub rationale: String,
}

/// Rank active candidates, best first
pub fn rank(candidates: &[PriorityCandidate], weights: &PriorityWeights) -> PlannerResult<Vec<PriorityResult>> {
    weights.validate()?;

    let mut results: Vec<PriorityResult> = candidates
        .iter()
        .filter(|candidate| {
            let active = candidate.is_active();
            if !active {
                tracing::debug!("Skipping {} '{}': plan complete", candidate.id, candidate.name);
            }
            active
        })
        .map(|candidate| score_candidate(candidate, weights))
        .collect();

    results.sort_by(compare_results);

    if let Some(best) = results.first() {
        tracing::info!(
            "Ranked {} targets, best is '{}' ({:.3})",
            results.len(),
            best.name,
            best.score
        );
    }
    Ok(results)
}

fn score_candidate(candidate: &PriorityCandidate, weights: &PriorityWeights) -> PriorityResult {
    let completion_ratio = candidate.completion_ratio();
    let usable_minutes = if candidate.is_observable() {
        candidate.usable_minutes.max(0.0)
    } else {
        0.0
    };
    let score = weights.score(completion_ratio, usable_minutes);
    let dominant = candidate.dominant_channel();

    let availability = match candidate.closure {
        None => format!("{} usable tonight", format_minutes(usable_minutes)),
        Some(closure) => format!("not observable tonight ({})", closure.describe()),
    };
    let mut rationale = format!("{:.0}% complete, {}", completion_ratio * 100.0, availability);
    if let Some(channel) = dominant {
        rationale.push_str(&format!(
            ", most needed: {} ({} remaining)",
            channel.filter,
            hms::format_hms(channel.remaining_seconds())
        ));
    }

    tracing::debug!("{} '{}' scored {:.3}: {}", candidate.id, candidate.name, score, rationale);

    PriorityResult {
        id: candidate.id,
        name: candidate.name.clone(),
        score,
        observable: candidate.is_observable(),
        completion_ratio,
        usable_minutes,
        dominant_filter: dominant.map(|c| c.filter.clone()),
        rationale,
    }
}

fn compare_results(a: &PriorityResult, b: &PriorityResult) -> Ordering {
    b.observable
        .cmp(&a.observable)
        .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// `312.0` -> `"5h 12m"`
fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as u64;
    format!("{}h {:02}m", total / 60, total % 60)
}
