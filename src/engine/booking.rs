use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{BOOKINGS_COMMITTED_TOTAL, BOOKING_REJECTIONS_TOTAL};
use crate::time::time_to_seconds;

use super::{BookingError, Engine};

/// A visitor's request for one slot, as received from the caller.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub visitor: Visitor,
}

pub(super) fn validate_visitor(v: &Visitor) -> Result<(), BookingError> {
    let name = v.name.trim();
    if name.is_empty() {
        return Err(BookingError::InvalidInput("name is required".into()));
    }
    if name.len() > MAX_VISITOR_NAME_LEN {
        return Err(BookingError::LimitExceeded("visitor name too long"));
    }
    let email = v.email.trim();
    if email.len() > MAX_VISITOR_EMAIL_LEN {
        return Err(BookingError::LimitExceeded("visitor email too long"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(BookingError::InvalidInput(format!("invalid email: {email}"))),
    }
    let phone = v.phone.trim();
    if phone.is_empty() {
        return Err(BookingError::InvalidInput("phone is required".into()));
    }
    if phone.len() > MAX_VISITOR_PHONE_LEN {
        return Err(BookingError::LimitExceeded("visitor phone too long"));
    }
    if let Some(msg) = &v.message
        && msg.len() > MAX_MESSAGE_LEN
    {
        return Err(BookingError::LimitExceeded("message too long"));
    }
    Ok(())
}

impl Engine {
    /// Validate a request against freshly computed availability, then commit
    /// it under the date lock.
    ///
    /// Phase 1 (read-only): time parsing, visitor fields, advance window,
    /// exact slot match, slot occupancy.
    /// Phase 2: re-read overlapping live bookings from the store while
    /// holding the date's exclusive lock and insert only if there are none.
    pub async fn validate_and_book(&self, req: BookingRequest) -> Result<Booking, BookingError> {
        let result = self.try_book(req).await;
        match &result {
            Ok(b) => {
                metrics::counter!(BOOKINGS_COMMITTED_TOTAL).increment(1);
                info!(id = %b.id, date = %b.date, start = %b.start_time(), end = %b.end_time(), "booking committed");
            }
            Err(e) => {
                metrics::counter!(BOOKING_REJECTIONS_TOTAL, "reason" => e.reason()).increment(1);
                debug!(reason = e.reason(), error = %e, "booking rejected");
            }
        }
        result
    }

    async fn try_book(&self, req: BookingRequest) -> Result<Booking, BookingError> {
        let span = self.validate(&req).await?;
        self.commit(req, span).await
    }

    /// Phase 2. Nothing but the locked re-check sits between here and the insert.
    pub(super) async fn commit(&self, req: BookingRequest, span: Span) -> Result<Booking, BookingError> {
        let txn = self.store.begin_booking(req.date).await?;
        if let Some(existing) = txn.live_overlapping(&span).first() {
            return Err(BookingError::Conflict(existing.id));
        }
        let booking = Booking {
            id: Ulid::new(),
            date: req.date,
            span,
            visitor: req.visitor,
            status: BookingStatus::Pending,
            created_at: self.now(),
        };
        Ok(txn.insert(booking).await?)
    }

    /// Phase 1. Returns the matched slot's span.
    pub(super) async fn validate(&self, req: &BookingRequest) -> Result<Span, BookingError> {
        let start = time_to_seconds(&req.start_time)?;
        let end = time_to_seconds(&req.end_time)?;
        validate_visitor(&req.visitor)?;

        let settings = self.store.settings().await?;
        let now = self.now();

        let start_at = req.date.and_time(
            NaiveTime::from_num_seconds_from_midnight_opt(start, 0)
                .ok_or_else(|| BookingError::InvalidFormat(req.start_time.clone()))?,
        );
        let lead_secs = (start_at - now).num_seconds() as f64;
        if lead_secs < settings.min_advance_booking_hours * 3600.0 {
            return Err(BookingError::TooSoon {
                min_hours: settings.min_advance_booking_hours,
            });
        }
        let horizon = now.date() + Duration::days(i64::from(settings.max_advance_booking_days));
        if req.date > horizon {
            return Err(BookingError::TooFar {
                max_days: settings.max_advance_booking_days,
            });
        }

        if start >= end {
            return Err(BookingError::SlotNotFound);
        }
        let (_, day) = self.compute_day(req.date, &settings, now.date()).await?;
        let slot = day
            .slots
            .iter()
            .find(|s| s.span.start == start && s.span.end == end)
            .ok_or(BookingError::SlotNotFound)?;
        if !slot.available {
            return Err(BookingError::SlotUnavailable);
        }
        Ok(slot.span)
    }
}
