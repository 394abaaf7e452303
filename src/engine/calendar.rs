use chrono::{Datelike, Days, NaiveDate, Weekday};
use ulid::Ulid;

use crate::model::*;

// ── Month grid ────────────────────────────────────────────────────

/// Bookings listed per cell before the "+N more" line.
pub const DEFAULT_PREVIEW: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFilter {
    pub vehicle_id: Option<Ulid>,
    /// Statuses the caller chose to hide (e.g. Cancelled).
    pub excluded: Vec<BookingStatus>,
    pub week_start: Weekday,
}

impl Default for CalendarFilter {
    fn default() -> Self {
        Self {
            vehicle_id: None,
            excluded: Vec::new(),
            week_start: Weekday::Sun,
        }
    }
}

impl CalendarFilter {
    pub fn admits(&self, booking: &Booking) -> bool {
        self.vehicle_id.is_none_or(|id| id == booking.vehicle_id)
            && !self.excluded.contains(&booking.status)
    }
}

/// One displayed day. Borrows the bookings it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell<'a> {
    pub date: NaiveDate,
    /// False for the padding days before/after the target month.
    pub in_current_month: bool,
    /// Bookings covering `date`, in input order.
    pub bookings: Vec<&'a Booking>,
}

impl<'a> CalendarCell<'a> {
    /// The first `limit` bookings and how many were left out.
    pub fn preview(&self, limit: usize) -> (&[&'a Booking], usize) {
        let shown = self.bookings.len().min(limit);
        (&self.bookings[..shown], self.bookings.len() - shown)
    }

    pub fn starts_on(&self, booking: &Booking) -> bool {
        booking.range.start() == self.date
    }

    pub fn ends_on(&self, booking: &Booking) -> bool {
        booking.range.end() == self.date
    }

    /// Customer names are printed on a booking's first day and again at the
    /// start of every week row it continues into.
    pub fn shows_name(&self, booking: &Booking, week_start: Weekday) -> bool {
        self.starts_on(booking) || self.date.weekday() == week_start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMonth<'a> {
    /// The target month.
    pub month: DateRange,
    /// Displayed days: `month` padded out to whole weeks.
    pub grid: DateRange,
    /// One per day of `grid`; always a multiple of seven.
    pub cells: Vec<CalendarCell<'a>>,
}

impl<'a> CalendarMonth<'a> {
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell<'a>]> {
        self.cells.chunks(7)
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&CalendarCell<'a>> {
        if !self.grid.contains(date) {
            return None;
        }
        let idx = (date - self.grid.start()).num_days() as usize;
        self.cells.get(idx)
    }
}

fn days_into_week(day: Weekday, week_start: Weekday) -> u64 {
    let (d, s) = (day.num_days_from_monday(), week_start.num_days_from_monday());
    u64::from((7 + d - s) % 7)
}

/// Whole weeks covering the month of `anchor`.
pub fn grid_range(anchor: NaiveDate, week_start: Weekday) -> DateRange {
    let month = DateRange::month_of(anchor);
    let (first, last) = (month.start(), month.end());

    let lead = days_into_week(first.weekday(), week_start);
    let trail = 6 - days_into_week(last.weekday(), week_start);
    let start = first.checked_sub_days(Days::new(lead)).unwrap_or(first);
    let end = last.checked_add_days(Days::new(trail)).unwrap_or(last);

    month
        .hull(&DateRange::single(start))
        .hull(&DateRange::single(end))
}

/// Project `bookings` onto the month grid of `anchor`.
///
/// Each booking is placed on every displayed day it covers, including the
/// padding days, so bookings crossing a month boundary stay visible. Within
/// a cell bookings keep the order of `bookings`. Pure: the same inputs give
/// an equal grid.
pub fn build<'a>(
    anchor: NaiveDate,
    bookings: &'a [Booking],
    filter: &CalendarFilter,
) -> CalendarMonth<'a> {
    let month = DateRange::month_of(anchor);
    let grid = grid_range(anchor, filter.week_start);

    let mut cells: Vec<CalendarCell<'a>> = grid
        .days()
        .map(|date| CalendarCell {
            date,
            in_current_month: month.contains(date),
            bookings: Vec::new(),
        })
        .collect();

    for booking in bookings.iter().filter(|b| filter.admits(b)) {
        let Some(visible) = booking.range.intersection(&grid) else {
            continue;
        };
        let from = (visible.start() - grid.start()).num_days() as usize;
        let to = (visible.end() - grid.start()).num_days() as usize;
        for cell in &mut cells[from..=to] {
            cell.bookings.push(booking);
        }
    }

    CalendarMonth { month, grid, cells }
}
