// Hard limits on client-supplied input. Requests exceeding them are rejected
// before they reach the WAL.

/// Time blocks on one weekly day or override.
pub const MAX_BLOCKS_PER_DAY: usize = 48;

/// Upper bound for a single block's slot duration (one full day).
pub const MAX_SLOT_DURATION_MINUTES: u32 = 24 * 60;

/// Live + historical bookings kept on one calendar date.
pub const MAX_BOOKINGS_PER_DAY: usize = 1_000;

pub const MAX_VISITOR_NAME_LEN: usize = 200;
pub const MAX_VISITOR_EMAIL_LEN: usize = 320;
pub const MAX_VISITOR_PHONE_LEN: usize = 40;
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Upper bound for `Settings.max_advance_booking_days`.
pub const MAX_ADVANCE_BOOKING_DAYS: u32 = 3_650;

/// Upper bound for `Settings.min_advance_booking_hours`.
pub const MAX_MIN_ADVANCE_HOURS: f64 = 24.0 * 365.0;

/// Raw JSON accepted for a time-block list.
pub const MAX_BLOCKS_JSON_LEN: usize = 16 * 1024;
