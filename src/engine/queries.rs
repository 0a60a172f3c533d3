use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};

use crate::model::*;

use super::classify::classify_day;
use super::overlay::overlay_bookings;
use super::resolve::{resolve_blocks, ResolvedDay};
use super::slots::generate_day_slots;
use super::{BookingError, Engine};

/// One date's slots with their occupancy and the rolled-up status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub slots: Vec<Slot>,
}

impl DayAvailability {
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|s| s.available).count()
    }
}

/// Calendar-grid cell for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySummary {
    pub status: DayStatus,
    pub slot_count: usize,
    pub available_count: usize,
}

impl Engine {
    /// Effective blocks for `date`, override first.
    pub(super) async fn resolve_day_blocks(&self, date: NaiveDate) -> Result<ResolvedDay, BookingError> {
        let override_day = self.store.daily_override(date).await?;
        // An override wins outright, so the template lookup is skipped.
        let weekly = match override_day {
            Some(_) => None,
            None => self.store.weekly_template(day_of_week(date)).await?,
        };
        Ok(resolve_blocks(override_day.as_ref(), weekly.as_ref()))
    }

    /// Resolve, tile, and overlay live bookings for one date.
    pub(super) async fn compute_day(
        &self,
        date: NaiveDate,
        settings: &Settings,
        today: NaiveDate,
    ) -> Result<(ResolvedDay, DayAvailability), BookingError> {
        let resolved = self.resolve_day_blocks(date).await?;
        let mut slots = generate_day_slots(&resolved.blocks, settings.duration_minutes);
        if !slots.is_empty() {
            let live = self.store.list_live_bookings(date).await?;
            overlay_bookings(&mut slots, &live);
        }
        let status = classify_day(date, today, &resolved, &slots);
        Ok((resolved, DayAvailability { date, status, slots }))
    }

    pub async fn resolve_day_availability(&self, date: NaiveDate) -> Result<DayAvailability, BookingError> {
        let settings = self.store.settings().await?;
        let (_, day) = self.compute_day(date, &settings, self.today()).await?;
        Ok(day)
    }

    /// Summaries for every date of `year-month`, in date order. "Today" is
    /// sampled once so a month straddling midnight stays consistent.
    pub async fn resolve_month_availability(
        &self,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<NaiveDate, DaySummary>, BookingError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BookingError::InvalidInput(format!("invalid month: {year:04}-{month:02}")))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| BookingError::InvalidInput(format!("month out of range: {year:04}-{month:02}")))?;

        let settings = self.store.settings().await?;
        let today = self.today();
        let mut out = BTreeMap::new();
        for date in first.iter_days().take_while(|d| *d < next) {
            let (_, day) = self.compute_day(date, &settings, today).await?;
            out.insert(
                date,
                DaySummary {
                    status: day.status,
                    slot_count: day.slots.len(),
                    available_count: day.available_count(),
                },
            );
        }
        Ok(out)
    }
}
