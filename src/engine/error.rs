use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;
use crate::time::InvalidFormat;

#[derive(Debug)]
pub enum BookingError {
    /// Malformed time or date input.
    InvalidFormat(String),
    InvalidInput(String),
    /// Start is inside the minimum-notice window.
    TooSoon { min_hours: f64 },
    /// Date is past the maximum advance window.
    TooFar { max_days: u32 },
    /// Requested range matches no generated slot.
    SlotNotFound,
    /// Slot exists but was occupied when validated.
    SlotUnavailable,
    /// Lost the commit-time race to this booking.
    Conflict(Ulid),
    NotFound(Ulid),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    LimitExceeded(&'static str),
    Storage(String),
}

impl BookingError {
    /// Stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            BookingError::InvalidFormat(_) => "invalid_format",
            BookingError::InvalidInput(_) => "invalid_input",
            BookingError::TooSoon { .. } => "too_soon",
            BookingError::TooFar { .. } => "too_far",
            BookingError::SlotNotFound => "slot_not_found",
            BookingError::SlotUnavailable => "slot_unavailable",
            BookingError::Conflict(_) => "conflict",
            BookingError::NotFound(_) => "not_found",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::LimitExceeded(_) => "limit_exceeded",
            BookingError::Storage(_) => "storage",
        }
    }

    /// Whether the caller's slot list is stale and should be re-fetched.
    pub fn should_refresh(&self) -> bool {
        matches!(
            self,
            BookingError::SlotNotFound | BookingError::SlotUnavailable | BookingError::Conflict(_)
        )
    }

    /// Text safe to show a visitor. Unknown ranges get a generic message so
    /// schedule internals don't leak; a lost race reads the same as a taken
    /// slot.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::TooSoon { min_hours } => {
                format!("appointments must be booked at least {min_hours} hours in advance")
            }
            BookingError::TooFar { max_days } => {
                format!("appointments can be booked at most {max_days} days in advance")
            }
            BookingError::SlotNotFound => "the requested time is unavailable".into(),
            BookingError::SlotUnavailable | BookingError::Conflict(_) => {
                "that time was just taken, please pick another time".into()
            }
            BookingError::Storage(_) => "something went wrong, please try again".into(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidFormat(s) => write!(f, "invalid format: {s}"),
            BookingError::InvalidInput(s) => write!(f, "invalid input: {s}"),
            BookingError::TooSoon { min_hours } => {
                write!(f, "too soon: minimum notice is {min_hours} hours")
            }
            BookingError::TooFar { max_days } => {
                write!(f, "too far ahead: maximum is {max_days} days")
            }
            BookingError::SlotNotFound => write!(f, "no such slot"),
            BookingError::SlotUnavailable => write!(f, "slot unavailable"),
            BookingError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            BookingError::NotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<InvalidFormat> for BookingError {
    fn from(e: InvalidFormat) -> Self {
        BookingError::InvalidFormat(e.to_string())
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::InvalidTransition { from, to } => BookingError::InvalidTransition { from, to },
            StoreError::Overlap(id) => BookingError::Conflict(id),
            StoreError::LimitExceeded(msg) => BookingError::LimitExceeded(msg),
            StoreError::Wal(e) => BookingError::Storage(e),
        }
    }
}
