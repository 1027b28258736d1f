//! Target coordinates
//!
//! Targets arrive from persistence with coordinates either in decimal form
//! or as sexagesimal strings. Both resolve to [`EquatorialCoords`]; anything
//! missing or unparsable is a geometry error for that target only.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};
use crate::TargetId;

/// J2000 equatorial position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialCoords {
    /// Right ascension in hours [0, 24)
    pub ra_hours: f64,
    /// Declination in degrees [-90, 90]
    pub dec_deg: f64,
}

impl EquatorialCoords {
    pub fn new(ra_hours: f64, dec_deg: f64) -> Result<Self, String> {
        if !ra_hours.is_finite() || !(0.0..24.0).contains(&ra_hours) {
            return Err(format!("right ascension {} h is outside [0, 24)", ra_hours));
        }
        if !dec_deg.is_finite() || !(-90.0..=90.0).contains(&dec_deg) {
            return Err(format!("declination {}° is outside [-90, 90]", dec_deg));
        }
        Ok(Self { ra_hours, dec_deg })
    }
}

/// Coordinates as stored on a target record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Decimal { ra_hours: f64, dec_deg: f64 },
    /// e.g. `"05:35:17.3"` / `"-05 23 28"`
    Sexagesimal { ra: String, dec: String },
}

/// Target identity plus its position on the sky
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub id: TargetId,
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl TargetGeometry {
    pub fn resolve(&self) -> PlannerResult<EquatorialCoords> {
        let coordinates = self
            .coordinates
            .as_ref()
            .ok_or_else(|| PlannerError::geometry(self.id, "coordinates are missing"))?;

        let result = match coordinates {
            Coordinates::Decimal { ra_hours, dec_deg } => EquatorialCoords::new(*ra_hours, *dec_deg),
            Coordinates::Sexagesimal { ra, dec } => parse_sexagesimal(ra)
                .ok_or_else(|| format!("cannot parse right ascension '{}'", ra))
                .and_then(|ra_hours| {
                    parse_sexagesimal(dec)
                        .ok_or_else(|| format!("cannot parse declination '{}'", dec))
                        .and_then(|dec_deg| EquatorialCoords::new(ra_hours, dec_deg))
                }),
        };

        result.map_err(|reason| PlannerError::geometry(self.id, reason))
    }
}

/// Parse `"DD:MM:SS.s"`, `"DD MM SS"`, `"DDhMMmSSs"` or a plain decimal.
///
/// A leading sign applies to the whole value, so `"-00:30:00"` is -0.5.
pub fn parse_sexagesimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, body) = match trimmed.chars().next() {
        Some('-') => (true, &trimmed[1..]),
        Some('+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let parts: Vec<&str> = body
        .split(|c: char| c == ':' || c == ' ' || c == 'h' || c == 'm' || c == 's' || c == 'd' || c == '°' || c == '\'' || c == '"')
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut value = 0.0;
    let mut scale = 1.0;
    for (i, part) in parts.iter().enumerate() {
        let component: f64 = part.parse().ok()?;
        if !component.is_finite() || component < 0.0 {
            return None;
        }
        // minutes and seconds must stay below 60
        if i > 0 && component >= 60.0 {
            return None;
        }
        value += component / scale;
        scale *= 60.0;
    }

    Some(if negative { -value } else { value })
}
