//! Sequence export
//!
//! Turns a target's remaining exposures and tonight's window into an
//! ordered list of instruction blocks for telescope-automation software:
//!
//! ```text
//! Cool → [Wait until window start] → (ChangeFilter → Expose)* → Park
//! ```
//!
//! The document is a pure function of the request. Its id is a UUIDv5 of
//! the serialized content, so exporting unchanged state twice gives the
//! same document byte for byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlannerError, PlannerResult};
use crate::filters::{self, FilterSlots};
use crate::ledger::PlanChannel;
use crate::window::{ImagingWindow, TimeSpan, WindowClosure};

/// Bumped whenever block fields change shape
pub const FORMAT_VERSION: u32 = 1;

/// Namespace for document ids
const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d0a_8c55_1e2f_7a9b_3c4d);

/// One automation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SequenceBlock {
    Cool { target_temperature_c: f64 },
    Wait { until: DateTime<Utc> },
    ChangeFilter { filter: String, slot: u32 },
    Expose { frames: u32, exposure_seconds: f64 },
    Park,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDocument {
    pub format_version: u32,
    pub id: Uuid,
    pub target: String,
    pub window: TimeSpan,
    pub blocks: Vec<SequenceBlock>,
}

/// Id-less view of a document, hashed to derive the id
#[derive(Serialize)]
struct DocumentContent<'a> {
    format_version: u32,
    target: &'a str,
    window: &'a TimeSpan,
    blocks: &'a [SequenceBlock],
}

/// Everything the exporter reads
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub target_name: &'a str,
    /// Channels in the order their exposures should run
    pub channels: &'a [PlanChannel],
    pub window: &'a ImagingWindow,
    pub slots: &'a FilterSlots,
    pub camera_cool_temp_c: f64,
    pub now: DateTime<Utc>,
}

/// Build the sequence document for the remaining exposures
pub fn export_sequence(request: &ExportRequest<'_>) -> PlannerResult<SequenceDocument> {
    let window = request.window.effective.ok_or_else(|| PlannerError::NotObservableTonight {
        target: request.target_name.to_string(),
        reason: request
            .window
            .closure
            .unwrap_or(WindowClosure::OutsideDarkness)
            .describe()
            .to_string(),
    })?;

    let remaining: Vec<&PlanChannel> = request.channels.iter().filter(|c| !c.is_complete()).collect();
    if remaining.is_empty() {
        return Err(PlannerError::NothingToExport(request.target_name.to_string()));
    }

    let mut blocks = Vec::with_capacity(remaining.len() * 2 + 3);
    blocks.push(SequenceBlock::Cool {
        target_temperature_c: request.camera_cool_temp_c,
    });

    if window.start > request.now {
        blocks.push(SequenceBlock::Wait { until: window.start });
    }

    for channel in remaining {
        let slot = resolve_slot(channel, request.slots)?;
        blocks.push(SequenceBlock::ChangeFilter {
            filter: channel.filter.clone(),
            slot,
        });
        blocks.push(SequenceBlock::Expose {
            frames: channel.remaining_frames(),
            exposure_seconds: channel.per_frame_seconds,
        });
    }

    blocks.push(SequenceBlock::Park);

    let content = DocumentContent {
        format_version: FORMAT_VERSION,
        target: request.target_name,
        window: &window,
        blocks: &blocks,
    };
    let id = Uuid::new_v5(&DOCUMENT_NAMESPACE, &serde_json::to_vec(&content)?);

    tracing::info!(
        "Exported sequence {} for '{}' with {} blocks",
        id,
        request.target_name,
        blocks.len()
    );

    Ok(SequenceDocument {
        format_version: FORMAT_VERSION,
        id,
        target: request.target_name.to_string(),
        window,
        blocks,
    })
}

/// Standard names go through the configured mapping, then the channel's
/// slot, then the standard wheel layout. Custom names need the channel's
/// own slot or a configured entry.
fn resolve_slot(channel: &PlanChannel, slots: &FilterSlots) -> PlannerResult<u32> {
    let slot = if filters::is_standard(&channel.filter) {
        slots
            .resolve(&channel.filter)
            .or(channel.slot)
            .or_else(|| FilterSlots::standard().resolve(&channel.filter))
    } else {
        channel.slot.or_else(|| slots.resolve(&channel.filter))
    };
    slot.ok_or_else(|| PlannerError::UnmappedFilter(channel.filter.clone()))
}
