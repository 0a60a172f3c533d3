use crate::model::*;

/// Mark every slot overlapped by a live booking as taken, tagging it with
/// the first such booking's status and id. Terminal bookings are skipped
/// even if the caller passes them in.
pub fn overlay_bookings(slots: &mut [Slot], bookings: &[Booking]) {
    for slot in slots.iter_mut() {
        if let Some(b) = bookings
            .iter()
            .find(|b| b.is_live() && b.span.overlaps(&slot.span))
        {
            slot.available = false;
            slot.status = SlotStatus::Booked(b.status);
            slot.booking_id = Some(b.id);
        }
    }
}
