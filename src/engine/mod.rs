//! Availability and booking core.
//!
//! Slot generation, resolution, overlay and classification are pure
//! functions over plain data; [`Engine`] wires them to a [`Store`] and a
//! [`Clock`]. The only suspension points are store calls.

mod admin;
mod booking;
mod classify;
mod error;
mod overlay;
mod queries;
mod resolve;
mod slots;

pub use booking::BookingRequest;
pub use classify::classify_day;
pub use error::BookingError;
pub use overlay::overlay_bookings;
pub use queries::{DayAvailability, DaySummary};
pub use resolve::{resolve_blocks, DaySource, ResolvedDay};
pub use slots::generate_day_slots;

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::store::Store;

/// Source of "now". Dates are local calendar dates, never instants.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(t) => *t,
        }
    }
}

pub struct Engine {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, Clock::System)
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
