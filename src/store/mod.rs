//! Storage port consumed by the engine.
//!
//! The engine never touches persistence directly; everything goes through
//! [`Store`]. Booking writes go through a [`BookingTxn`], which holds the
//! date's exclusive lock so the commit-time overlap check and the insert are
//! a single serializable step.

mod ledger;
mod wal_store;

pub use ledger::DayLedger;
pub use wal_store::WalStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Backstop: an insert would overlap a live booking.
    Overlap(Ulid),
    LimitExceeded(&'static str),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "booking not found: {id}"),
            StoreError::InvalidTransition { from, to } => {
                write!(f, "cannot move booking from {from} to {to}")
            }
            StoreError::Overlap(id) => write!(f, "overlaps live booking {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait Store: Send + Sync {
    // ── Reads ────────────────────────────────────────────────

    async fn weekly_template(&self, day_of_week: u8) -> Result<Option<WeeklyScheduleDay>, StoreError>;

    /// All configured weekly days, ordered by day of week.
    async fn weekly_templates(&self) -> Result<Vec<WeeklyScheduleDay>, StoreError>;

    async fn daily_override(&self, date: NaiveDate) -> Result<Option<DailyOverride>, StoreError>;

    async fn settings(&self) -> Result<Settings, StoreError>;

    /// Every booking on `date` regardless of status, ordered by start.
    async fn list_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>, StoreError>;

    /// Pending/confirmed bookings on `date`, ordered by start.
    async fn list_live_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>, StoreError>;

    async fn list_live_bookings_overlapping(
        &self,
        date: NaiveDate,
        span: Span,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    // ── Booking writes ───────────────────────────────────────

    /// Lock `date` for a booking write. Dropping the transaction without
    /// calling `insert` releases the lock and writes nothing.
    async fn begin_booking(&self, date: NaiveDate) -> Result<Box<dyn BookingTxn>, StoreError>;

    /// Apply a status transition under the date lock.
    async fn set_booking_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, StoreError>;

    // ── Schedule management ──────────────────────────────────

    async fn put_weekly_day(&self, day: WeeklyScheduleDay) -> Result<(), StoreError>;

    /// Returns whether a template existed.
    async fn clear_weekly_day(&self, day_of_week: u8) -> Result<bool, StoreError>;

    async fn put_override(&self, day: DailyOverride) -> Result<(), StoreError>;

    /// Returns whether an override existed.
    async fn clear_override(&self, date: NaiveDate) -> Result<bool, StoreError>;

    async fn put_settings(&self, settings: Settings) -> Result<(), StoreError>;
}

/// Exclusive write access to one date's bookings.
#[async_trait]
pub trait BookingTxn: Send {
    /// Live bookings overlapping `span`, read under the lock.
    fn live_overlapping(&self, span: &Span) -> Vec<Booking>;

    /// Persist and apply the booking, then release the lock.
    async fn insert(self: Box<Self>, booking: Booking) -> Result<Booking, StoreError>;
}
