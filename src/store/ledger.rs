use ulid::Ulid;

use crate::model::*;

/// All bookings on one calendar date, sorted by `span.start`.
///
/// Cancelled and completed bookings stay in the ledger for listing; only
/// live ones take part in overlap queries.
#[derive(Debug, Default)]
pub struct DayLedger {
    bookings: Vec<Booking>,
}

impl DayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    pub fn all(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn live(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(|b| b.is_live())
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    pub fn get(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn get_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Live bookings whose span overlaps `query` (half-open).
    /// Binary search skips everything starting at or after `query.end`.
    pub fn live_overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.is_live() && b.span.end > query.start)
    }
}
