use crate::model::*;

/// Tile each block into back-to-back slots and return them sorted by start.
///
/// Blocks are tiled independently: a trailing remainder shorter than the
/// slot length is dropped, and slots never straddle two blocks. Overlapping
/// blocks produce overlapping slots; nothing is deduplicated here.
/// `default_minutes` applies to blocks without their own duration.
pub fn generate_day_slots(blocks: &[TimeBlock], default_minutes: u32) -> Vec<Slot> {
    let mut slots = Vec::new();
    for block in blocks {
        let minutes = block.slot_duration.unwrap_or(default_minutes);
        if minutes == 0 {
            continue;
        }
        let step = minutes * 60;
        let mut cursor = block.span.start;
        while let Some(end) = cursor.checked_add(step).filter(|&e| e <= block.span.end) {
            slots.push(Slot::open(Span::new(cursor, end)));
            cursor = end;
        }
    }
    slots.sort_by_key(|s| (s.span.start, s.span.end));
    slots
}
