//! Default exposure plans per palette
//!
//! Given a target type, a palette and the sky's Bortle class, suggest a set
//! of [`PlanChannel`]s to start editing from. Totals scale with sky
//! brightness and split across channels by weight.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlannerResult;
use crate::ledger::{LedgerEdit, PlanChannel};

/// Sub-exposure for Ha, OIII and SII
pub const NARROWBAND_SUB_SECONDS: f64 = 300.0;

/// Sub-exposure for L, R, G and B
pub const BROADBAND_SUB_SECONDS: f64 = 180.0;

/// Total integration when the target type is unknown
const FALLBACK_TOTAL_MINUTES: f64 = 420.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Palette {
    Sho,
    Hoo,
    Lrgb,
    LrgbNb,
    /// Single luminance channel, used for anything unrecognised
    Luminance,
}

impl Palette {
    pub fn parse(name: &str) -> Palette {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "SHO" => Palette::Sho,
            "HOO" => Palette::Hoo,
            "LRGB" => Palette::Lrgb,
            "LRGBNB" => Palette::LrgbNb,
            _ => Palette::Luminance,
        }
    }

    /// Filter names and relative weights, in plan order
    fn weights(&self) -> &'static [(&'static str, f64)] {
        match self {
            Palette::Sho => &[("Ha", 0.5), ("OIII", 0.3), ("SII", 0.2)],
            Palette::Hoo => &[("Ha", 0.6), ("OIII", 0.4)],
            Palette::Lrgb => &[("L", 0.5), ("R", 0.17), ("G", 0.17), ("B", 0.16)],
            Palette::LrgbNb => &[
                ("L", 0.4),
                ("R", 0.12),
                ("G", 0.12),
                ("B", 0.11),
                ("Ha", 0.15),
                ("OIII", 0.10),
            ],
            Palette::Luminance => &[("L", 1.0)],
        }
    }

    pub fn dominant_filter(&self) -> &'static str {
        match self {
            Palette::Sho | Palette::Hoo => "Ha",
            Palette::Lrgb | Palette::LrgbNb | Palette::Luminance => "L",
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Palette::Sho => "SHO",
            Palette::Hoo => "HOO",
            Palette::Lrgb => "LRGB",
            Palette::LrgbNb => "LRGBNB",
            Palette::Luminance => "L",
        };
        f.write_str(name)
    }
}

/// Base integration in minutes for a kind of target
pub fn base_total_minutes(target_type: &str) -> f64 {
    match target_type.trim().to_ascii_lowercase().as_str() {
        "emission" => 600.0,
        "diffuse" => 480.0,
        "reflection" => 420.0,
        "galaxy" => 360.0,
        "cluster" => 240.0,
        _ => FALLBACK_TOTAL_MINUTES,
    }
}

/// Brighter skies need more integration
pub fn bortle_factor(bortle: u8) -> f64 {
    if bortle >= 8 {
        1.3
    } else if bortle >= 6 {
        1.1
    } else {
        1.0
    }
}

fn sub_exposure_seconds(filter: &str) -> f64 {
    match filter {
        "Ha" | "OIII" | "SII" => NARROWBAND_SUB_SECONDS,
        _ => BROADBAND_SUB_SECONDS,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteSuggestion {
    pub palette: Palette,
    pub dominant_filter: String,
    pub total_minutes: u32,
    pub channels: Vec<PlanChannel>,
}

/// Suggest a starting plan.
///
/// Each channel gets `round(total × weight / Σweights)` minutes, turned into
/// whole frames of the channel's default sub length.
pub fn suggest(target_type: &str, palette: Palette, bortle: u8) -> PlannerResult<PaletteSuggestion> {
    let total_minutes = (base_total_minutes(target_type) * bortle_factor(bortle)).round();
    let weights = palette.weights();
    let weight_sum: f64 = weights.iter().map(|(_, w)| w).sum();

    let mut channels = Vec::with_capacity(weights.len());
    for (filter, weight) in weights {
        let minutes = (total_minutes * weight / weight_sum).round();
        let channel = PlanChannel::new(*filter, 0, sub_exposure_seconds(filter))?
            .apply(LedgerEdit::TotalSeconds(minutes * 60.0))?;
        channels.push(channel);
    }

    tracing::debug!(
        "Suggested {} plan for '{}' at Bortle {}: {} min over {} channels",
        palette,
        target_type,
        bortle,
        total_minutes,
        channels.len()
    );

    Ok(PaletteSuggestion {
        palette,
        dominant_filter: palette.dominant_filter().to_string(),
        total_minutes: total_minutes as u32,
        channels,
    })
}
