use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

// ── Availability ──────────────────────────────────────────────────

/// What stands in the way of a candidate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Conflict {
    Booking(Ulid),
    Block(Ulid),
}

/// Bookings of `vehicle_id` that hold the vehicle during `candidate`.
/// Cancelled bookings stay in the collection but never block.
pub fn blocking_bookings<'a>(
    vehicle_id: Ulid,
    candidate: &'a DateRange,
    bookings: &'a [Booking],
) -> impl Iterator<Item = &'a Booking> {
    bookings.iter().filter(move |b| {
        b.vehicle_id == vehicle_id && b.status.blocks_availability() && b.range.overlaps(candidate)
    })
}

/// True iff no non-cancelled booking of the vehicle overlaps `candidate`.
///
/// The collection is taken as given: when re-checking an existing booking
/// the caller leaves that booking out first.
pub fn is_available(vehicle_id: Ulid, candidate: &DateRange, bookings: &[Booking]) -> bool {
    blocking_bookings(vehicle_id, candidate, bookings)
        .next()
        .is_none()
}

/// First booking, then first date block, that overlaps `candidate`.
pub fn first_conflict(
    vehicle_id: Ulid,
    candidate: &DateRange,
    bookings: &[Booking],
    blocks: &[DateBlock],
) -> Option<Conflict> {
    if let Some(b) = blocking_bookings(vehicle_id, candidate, bookings).next() {
        return Some(Conflict::Booking(b.id));
    }
    blocks
        .iter()
        .find(|blk| blk.vehicle_id == vehicle_id && blk.range.overlaps(candidate))
        .map(|blk| Conflict::Block(blk.id))
}

pub fn is_available_with_blocks(
    vehicle_id: Ulid,
    candidate: &DateRange,
    bookings: &[Booking],
    blocks: &[DateBlock],
) -> bool {
    first_conflict(vehicle_id, candidate, bookings, blocks).is_none()
}

/// Days inside `window` on which the vehicle is held by a booking or a block,
/// as sorted, disjoint ranges.
pub fn occupied_days(
    vehicle_id: Ulid,
    window: &DateRange,
    bookings: &[Booking],
    blocks: &[DateBlock],
) -> Vec<DateRange> {
    let mut taken: Vec<DateRange> = bookings
        .iter()
        .filter(|b| b.vehicle_id == vehicle_id && b.status.blocks_availability())
        .map(|b| b.range)
        .chain(
            blocks
                .iter()
                .filter(|blk| blk.vehicle_id == vehicle_id)
                .map(|blk| blk.range),
        )
        .filter_map(|r| r.intersection(window))
        .collect();
    taken.sort_by_key(|r| r.start());
    merge_ranges(&taken)
}

/// Complement of [`occupied_days`] within `window`.
pub fn free_ranges(
    vehicle_id: Ulid,
    window: &DateRange,
    bookings: &[Booking],
    blocks: &[DateBlock],
) -> Vec<DateRange> {
    let taken = occupied_days(vehicle_id, window, bookings, blocks);
    let mut free = Vec::new();
    let mut cursor = Some(window.start());

    for t in &taken {
        let Some(from) = cursor else { break };
        if from < t.start()
            && let Some(until) = t.start().pred_opt()
        {
            free.extend(DateRange::new(from, until).ok());
        }
        cursor = t.end().succ_opt();
    }

    if let Some(from) = cursor
        && from <= window.end()
    {
        free.extend(DateRange::new(from, window.end()).ok());
    }

    free
}

/// Every occupied date inside `window`, ascending.
pub fn occupied_dates(
    vehicle_id: Ulid,
    window: &DateRange,
    bookings: &[Booking],
    blocks: &[DateBlock],
) -> Vec<NaiveDate> {
    occupied_days(vehicle_id, window, bookings, blocks)
        .iter()
        .flat_map(|r| r.days())
        .collect()
}

/// Merge ranges sorted by start into disjoint ranges. Ranges that touch
/// (one ends the day before the next starts) are joined.
pub fn merge_ranges(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && last.end().succ_opt().is_none_or(|next| range.start() <= next)
        {
            *last = last.hull(&range);
            continue;
        }
        merged.push(range);
    }
    merged
}
