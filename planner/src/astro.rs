//! Astronomical helper functions
//!
//! The window calculator only needs two things from an ephemeris: the sun's
//! altitude and a target's altitude at a given instant for a given site.
//! [`Ephemeris`] is that seam. [`LowPrecisionEphemeris`] implements it with
//! the usual low-precision solar position and sidereal time formulas, good
//! to a few arcminutes, which is plenty for planning a night.

use chrono::{DateTime, Utc};

use crate::config::EffectiveConfig;
use crate::coords::EquatorialCoords;

/// Julian Day of the J2000.0 epoch
pub const J2000: f64 = 2451545.0;

/// Julian Day of the Unix epoch
const UNIX_EPOCH_JD: f64 = 2440587.5;

/// Observer location on the ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

impl From<&EffectiveConfig> for Site {
    fn from(config: &EffectiveConfig) -> Self {
        Self {
            latitude: config.latitude,
            longitude: config.longitude,
            elevation_m: config.elevation_m,
        }
    }
}

/// Source of sun and target altitudes
pub trait Ephemeris {
    /// Altitude of the sun's center in degrees
    fn sun_altitude(&self, at: DateTime<Utc>, site: &Site) -> f64;

    /// Altitude of a fixed target in degrees
    fn target_altitude(&self, at: DateTime<Utc>, site: &Site, target: &EquatorialCoords) -> f64;
}

/// Built-in low-precision ephemeris
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPrecisionEphemeris;

impl Ephemeris for LowPrecisionEphemeris {
    fn sun_altitude(&self, at: DateTime<Utc>, site: &Site) -> f64 {
        let jd = julian_day(&at);
        let (sun_ra, sun_dec) = solar_position(jd);
        altitude(jd, site.latitude, site.longitude, sun_ra, sun_dec)
    }

    fn target_altitude(&self, at: DateTime<Utc>, site: &Site, target: &EquatorialCoords) -> f64 {
        let jd = julian_day(&at);
        altitude(jd, site.latitude, site.longitude, target.ra_hours, target.dec_deg)
    }
}

/// Julian Day of an instant, with sub-second precision
pub fn julian_day(dt: &DateTime<Utc>) -> f64 {
    let seconds = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + seconds / 86400.0
}

/// Local sidereal time in hours
pub fn local_sidereal_time(jd: f64, longitude: f64) -> f64 {
    let d = jd - J2000;
    let t = d / 36525.0;

    // Greenwich Mean Sidereal Time in degrees
    let gmst = 280.46061837 + 360.98564736629 * d + 0.000387933 * t * t - t * t * t / 38710000.0;

    (gmst + longitude).rem_euclid(360.0) / 15.0
}

/// Apparent solar right ascension (hours) and declination (degrees)
pub fn solar_position(jd: f64) -> (f64, f64) {
    let n = jd - J2000;

    // Mean longitude and mean anomaly (degrees)
    let l = (280.460 + 0.9856474 * n).rem_euclid(360.0);
    let g = (357.528 + 0.9856003 * n).rem_euclid(360.0).to_radians();

    // Ecliptic longitude
    let lambda = (l + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();

    // Obliquity of the ecliptic
    let epsilon = (23.439 - 0.0000004 * n).to_radians();

    let ra_deg = (epsilon.cos() * lambda.sin()).atan2(lambda.cos()).to_degrees();
    let declination = (epsilon.sin() * lambda.sin()).asin().to_degrees();

    (ra_deg.rem_euclid(360.0) / 15.0, declination)
}

/// Altitude (degrees) of an object at `ra_hours`/`dec_deg`
pub fn altitude(jd: f64, latitude: f64, longitude: f64, ra_hours: f64, dec_deg: f64) -> f64 {
    let lst = local_sidereal_time(jd, longitude);
    let ha_rad = ((lst - ra_hours) * 15.0).to_radians();
    let dec_rad = dec_deg.to_radians();
    let lat_rad = latitude.to_radians();

    let sin_alt = lat_rad.sin() * dec_rad.sin() + lat_rad.cos() * dec_rad.cos() * ha_rad.cos();
    sin_alt.clamp(-1.0, 1.0).asin().to_degrees()
}
