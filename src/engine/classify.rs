use chrono::NaiveDate;

use crate::model::*;

use super::resolve::ResolvedDay;

/// Collapse a day into one calendar-grid status. Checks run in order and
/// the first match wins: past, holiday, closed/no slots, fully booked,
/// partially booked, open.
pub fn classify_day(date: NaiveDate, today: NaiveDate, resolved: &ResolvedDay, slots: &[Slot]) -> DayStatus {
    if date < today {
        return DayStatus::FromTodayUnavailable;
    }
    if resolved.holiday {
        return DayStatus::WeekdayUnavailable;
    }
    if resolved.blocks.is_empty() || slots.is_empty() {
        return DayStatus::WeekdayUnavailable;
    }
    let taken = slots.iter().filter(|s| !s.available).count();
    if taken == slots.len() {
        DayStatus::Unavailable
    } else if taken > 0 {
        DayStatus::TimeSlotsBooking
    } else {
        DayStatus::Available
    }
}
