//! H:M:S formatting and parsing for durations

/// `5445.0` -> `"1:30:45"`. Negative input is treated as zero.
pub fn format_hms(total_seconds: f64) -> String {
    let (hours, minutes, seconds) = split(total_seconds);
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Like [`format_hms`] but drops the seconds when they are zero
pub fn format_hms_short(total_seconds: f64) -> String {
    let (hours, minutes, seconds) = split(total_seconds);
    if seconds == 0 {
        format!("{}:{:02}", hours, minutes)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn split(total_seconds: f64) -> (u64, u64, u64) {
    let total = if total_seconds.is_finite() && total_seconds > 0.0 {
        total_seconds as u64
    } else {
        0
    };
    (total / 3600, (total % 3600) / 60, total % 60)
}

/// Parse a duration typed by a user into seconds.
///
/// Accepts `"H:M:S"`, `"H:M"`, or a plain number: values up to 24 are
/// hours, anything larger is minutes.
pub fn parse_hms(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.contains(':') {
        let parts = text
            .split(':')
            .map(|p| p.trim().parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;
        let (h, m, s) = match parts.as_slice() {
            [h, m] => (*h, *m, 0),
            [h, m, s] => (*h, *m, *s),
            _ => return None,
        };
        return h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(s);
    }

    let value: f64 = text.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value <= 24.0 {
        Some((value * 3600.0) as u64)
    } else {
        Some((value * 60.0) as u64)
    }
}
