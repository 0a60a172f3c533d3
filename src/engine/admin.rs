use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{BookingError, Engine};

/// Reject block lists the slot generator would tile into nonsense: empty or
/// reversed spans, zero or oversized slot lengths, and blocks that overlap
/// one another.
pub(super) fn validate_blocks(blocks: &[TimeBlock]) -> Result<(), BookingError> {
    if blocks.len() > MAX_BLOCKS_PER_DAY {
        return Err(BookingError::LimitExceeded("too many time blocks"));
    }
    for b in blocks {
        if b.span.start >= b.span.end {
            return Err(BookingError::InvalidInput("time block start must be before end".into()));
        }
        if let Some(minutes) = b.slot_duration {
            if minutes == 0 {
                return Err(BookingError::InvalidInput("slot duration must be positive".into()));
            }
            if minutes > MAX_SLOT_DURATION_MINUTES {
                return Err(BookingError::LimitExceeded("slot duration too long"));
            }
        }
    }
    let mut sorted: Vec<Span> = blocks.iter().map(|b| b.span).collect();
    sorted.sort_by_key(|s| s.start);
    if let Some(pair) = sorted.windows(2).find(|w| w[0].overlaps(&w[1])) {
        return Err(BookingError::InvalidInput(format!(
            "time blocks overlap: {}-{} and {}-{}",
            crate::time::seconds_to_time(pair[0].start),
            crate::time::seconds_to_time(pair[0].end),
            crate::time::seconds_to_time(pair[1].start),
            crate::time::seconds_to_time(pair[1].end),
        )));
    }
    Ok(())
}

fn validate_settings(s: &Settings) -> Result<(), BookingError> {
    if s.duration_minutes == 0 {
        return Err(BookingError::InvalidInput("duration_minutes must be positive".into()));
    }
    if s.duration_minutes > MAX_SLOT_DURATION_MINUTES {
        return Err(BookingError::LimitExceeded("duration_minutes too long"));
    }
    if s.max_advance_booking_days > MAX_ADVANCE_BOOKING_DAYS {
        return Err(BookingError::LimitExceeded("max_advance_booking_days too large"));
    }
    let h = s.min_advance_booking_hours;
    if !h.is_finite() || h < 0.0 {
        return Err(BookingError::InvalidInput(
            "min_advance_booking_hours must be a non-negative number".into(),
        ));
    }
    if h > MAX_MIN_ADVANCE_HOURS {
        return Err(BookingError::LimitExceeded("min_advance_booking_hours too large"));
    }
    Ok(())
}

impl Engine {
    // ── Schedule management ──────────────────────────────────

    pub async fn set_weekly_day(&self, mut day: WeeklyScheduleDay) -> Result<(), BookingError> {
        if day.day_of_week > 6 {
            return Err(BookingError::InvalidInput(format!(
                "day_of_week must be 0-6, got {}",
                day.day_of_week
            )));
        }
        validate_blocks(&day.blocks)?;
        day.blocks.sort_by_key(|b| b.span.start);
        let dow = day.day_of_week;
        self.store.put_weekly_day(day).await?;
        info!(day_of_week = dow, "weekly schedule updated");
        Ok(())
    }

    /// Returns whether a template was removed.
    pub async fn clear_weekly_day(&self, day_of_week: u8) -> Result<bool, BookingError> {
        if day_of_week > 6 {
            return Err(BookingError::InvalidInput(format!("day_of_week must be 0-6, got {day_of_week}")));
        }
        let removed = self.store.clear_weekly_day(day_of_week).await?;
        if removed {
            info!(day_of_week, "weekly schedule cleared");
        }
        Ok(removed)
    }

    pub async fn weekly_schedule(&self) -> Result<Vec<WeeklyScheduleDay>, BookingError> {
        Ok(self.store.weekly_templates().await?)
    }

    pub async fn set_override(&self, mut day: DailyOverride) -> Result<(), BookingError> {
        validate_blocks(&day.blocks)?;
        day.blocks.sort_by_key(|b| b.span.start);
        let date = day.date;
        self.store.put_override(day).await?;
        info!(%date, "daily override set");
        Ok(())
    }

    /// Returns whether an override was removed.
    pub async fn clear_override(&self, date: NaiveDate) -> Result<bool, BookingError> {
        let removed = self.store.clear_override(date).await?;
        if removed {
            info!(%date, "daily override cleared");
        }
        Ok(removed)
    }

    pub async fn get_override(&self, date: NaiveDate) -> Result<Option<DailyOverride>, BookingError> {
        Ok(self.store.daily_override(date).await?)
    }

    pub async fn settings(&self) -> Result<Settings, BookingError> {
        Ok(self.store.settings().await?)
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<(), BookingError> {
        validate_settings(&settings)?;
        self.store.put_settings(settings).await?;
        info!(
            duration_minutes = settings.duration_minutes,
            max_advance_booking_days = settings.max_advance_booking_days,
            min_advance_booking_hours = settings.min_advance_booking_hours,
            "settings updated"
        );
        Ok(())
    }

    // ── Booking administration ───────────────────────────────

    pub async fn list_bookings(&self, date: NaiveDate) -> Result<Vec<Booking>, BookingError> {
        Ok(self.store.list_bookings(date).await?)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.store.get_booking(id).await?.ok_or(BookingError::NotFound(id))
    }

    pub async fn transition_booking(&self, id: Ulid, status: BookingStatus) -> Result<Booking, BookingError> {
        let booking = self.store.set_booking_status(id, status).await?;
        info!(%id, status = %status, "booking status changed");
        Ok(booking)
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.transition_booking(id, BookingStatus::Cancelled).await
    }
}
