use chrono::Datelike;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{Conflict, first_conflict};
use super::EngineError;

pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    let (start_year, end_year) = (range.start().year(), range.end().year());
    if start_year < MIN_YEAR || end_year > MAX_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if range.len_days() > MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("range too long"));
    }
    Ok(())
}

pub(crate) fn validate_text(value: &str, what: &'static str) -> Result<(), EngineError> {
    if value.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

/// Reject `range` if it collides with anything on the vehicle. `exclude` is
/// the booking being edited, which never conflicts with itself.
///
/// Runs under the vehicle's write lock, so the answer holds until the
/// caller's event is applied.
pub(crate) fn check_no_conflict(
    vs: &VehicleState,
    range: &DateRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    let bookings: Vec<Booking> = vs
        .overlapping_bookings(range)
        .filter(|b| Some(b.id) != exclude)
        .cloned()
        .collect();
    let blocks: Vec<DateBlock> = vs.overlapping_blocks(range).cloned().collect();

    match first_conflict(vs.vehicle.id, range, &bookings, &blocks) {
        Some(Conflict::Booking(id)) => Err(EngineError::Conflict(id)),
        Some(Conflict::Block(id)) => Err(EngineError::Blocked(id)),
        None => Ok(()),
    }
}

/// A block may cover days already closed by another block, but never a live booking.
pub(crate) fn check_blockable(vs: &VehicleState, range: &DateRange) -> Result<(), EngineError> {
    match vs
        .overlapping_bookings(range)
        .find(|b| b.status.blocks_availability())
    {
        Some(b) => Err(EngineError::Conflict(b.id)),
        None => Ok(()),
    }
}
