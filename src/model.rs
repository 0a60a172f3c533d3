use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time::seconds_to_time;

/// Seconds since local midnight. The only clock-time type.
pub type Secs = u32;

/// Half-open interval `[start, end)` within one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Secs,
    pub end: Secs,
}

impl Span {
    pub fn new(start: Secs, end: Secs) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_secs(&self) -> Secs {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        crate::time::intervals_overlap(self.start, self.end, other.start, other.end)
    }
}

/// A configured availability window, tiled into slots of `slot_duration`
/// minutes. `None` falls back to `Settings::duration_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub span: Span,
    pub slot_duration: Option<u32>,
}

/// Recurring template for one day of the week (Sunday = 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleDay {
    pub day_of_week: u8,
    pub enabled: bool,
    pub blocks: Vec<TimeBlock>,
}

/// Exception for one calendar date. Fully supersedes the weekly template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyOverride {
    pub date: NaiveDate,
    pub enabled: bool,
    pub is_holiday: bool,
    pub blocks: Vec<TimeBlock>,
}

/// Sunday = 0 … Saturday = 6.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Live bookings occupy their slot; terminal ones free it.
    pub fn is_live(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
}

/// A committed reservation of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub date: NaiveDate,
    pub span: Span,
    pub visitor: Visitor,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn start_time(&self) -> String {
        seconds_to_time(self.span.start)
    }

    pub fn end_time(&self) -> String {
        seconds_to_time(self.span.end)
    }

    pub fn start_seconds(&self) -> Secs {
        self.span.start
    }

    pub fn end_seconds(&self) -> Secs {
        self.span.end
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/// Occupancy of a derived slot: free, or the status of the booking holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Booked(BookingStatus),
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked(status) => status.as_str(),
        }
    }
}

/// A bookable interval derived for one day. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub span: Span,
    pub available: bool,
    pub status: SlotStatus,
    pub booking_id: Option<Ulid>,
}

impl Slot {
    pub fn open(span: Span) -> Self {
        Self {
            span,
            available: true,
            status: SlotStatus::Available,
            booking_id: None,
        }
    }

    pub fn start_time(&self) -> String {
        seconds_to_time(self.span.start)
    }

    pub fn end_time(&self) -> String {
        seconds_to_time(self.span.end)
    }

    pub fn readable(&self) -> String {
        crate::time::format_readable_range(self.span.start, self.span.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Slot length used by blocks that don't specify their own.
    pub duration_minutes: u32,
    pub max_advance_booking_days: u32,
    /// Fractional hours allowed.
    pub min_advance_booking_hours: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            max_advance_booking_days: 60,
            min_advance_booking_hours: 24.0,
        }
    }
}

/// Coarse per-day status for calendar grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    /// Every slot is free.
    Available,
    /// Slots exist but every one is taken.
    Unavailable,
    /// Some slots taken, some free.
    TimeSlotsBooking,
    /// Closed: holiday, disabled, or no slots.
    WeekdayUnavailable,
    /// Date is before today.
    FromTodayUnavailable,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Available => "available",
            DayStatus::Unavailable => "unavailable",
            DayStatus::TimeSlotsBooking => "time_slots_booking",
            DayStatus::WeekdayUnavailable => "weekday_unavailable",
            DayStatus::FromTodayUnavailable => "from_today_unavailable",
        }
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    WeeklyDaySet {
        day: WeeklyScheduleDay,
    },
    WeeklyDayCleared {
        day_of_week: u8,
    },
    OverrideSet {
        day: DailyOverride,
    },
    OverrideCleared {
        date: NaiveDate,
    },
    SettingsUpdated {
        settings: Settings,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        date: NaiveDate,
        status: BookingStatus,
    },
}
