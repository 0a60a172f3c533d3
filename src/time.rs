//! Clock-time parsing and formatting. All values are naive wall-clock
//! seconds since local midnight; there is no timezone or day rollover.

use crate::model::Secs;

pub const SECS_PER_DAY: Secs = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFormat(pub String);

impl std::fmt::Display for InvalidFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid time format: {:?} (expected hh:mm:ss)", self.0)
    }
}

impl std::error::Error for InvalidFormat {}

/// Parse `hh:mm:ss` into seconds since midnight.
///
/// Exactly three colon-separated non-negative integers are required, with
/// minutes and seconds below 60. Totals that fall outside the day are
/// rejected so every stored value round-trips through [`seconds_to_time`].
pub fn time_to_seconds(s: &str) -> Result<Secs, InvalidFormat> {
    let err = || InvalidFormat(s.to_string());
    let mut parts = s.split(':');
    let (Some(h), Some(m), Some(sec), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };

    let field = |p: &str| -> Result<u32, InvalidFormat> {
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        p.parse::<u32>().map_err(|_| err())
    };
    let (h, m, sec) = (field(h)?, field(m)?, field(sec)?);
    if m >= 60 || sec >= 60 {
        return Err(err());
    }

    let total = h
        .checked_mul(3600)
        .and_then(|t| t.checked_add(m * 60 + sec))
        .ok_or_else(err)?;
    if total >= SECS_PER_DAY {
        return Err(err());
    }
    Ok(total)
}

/// Inverse of [`time_to_seconds`]: zero-padded `hh:mm:ss`.
pub fn seconds_to_time(secs: Secs) -> String {
    debug_assert!(secs < SECS_PER_DAY, "seconds_to_time out of day: {secs}");
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share at
/// least one instant. Touching endpoints do not overlap.
pub fn intervals_overlap(a_start: Secs, a_end: Secs, b_start: Secs, b_end: Secs) -> bool {
    a_start < b_end && b_start < a_end
}

/// 12-hour display of a range, e.g. `9:00 AM - 10:00 AM`.
pub fn format_readable_range(start: Secs, end: Secs) -> String {
    format!("{} - {}", format_12h(start), format_12h(end))
}

fn format_12h(secs: Secs) -> String {
    let hour = (secs / 3600) % 24;
    let minute = (secs / 60) % 60;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{minute:02} {suffix}")
}
