use chrono::NaiveDate;
use serde::Serialize;

use crate::model::*;

use super::availability::occupied_days;

/// Headline numbers for the operator dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_vehicles: usize,
    /// Non-cancelled bookings running today.
    pub active_bookings: usize,
    pub pending_requests: usize,
    /// Quote totals of non-cancelled bookings that start in the month.
    pub monthly_revenue: Money,
    /// Booked vehicle-days over available vehicle-days in the month, 0-100.
    pub utilization_percent: f64,
}

pub fn dashboard(
    month: DateRange,
    today: NaiveDate,
    vehicles: &[Vehicle],
    bookings: &[Booking],
) -> DashboardStats {
    let live = || bookings.iter().filter(|b| b.status.blocks_availability());

    let active_bookings = live().filter(|b| b.range.contains(today)).count();
    let pending_requests = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Pending)
        .count();
    let monthly_revenue = live()
        .filter(|b| month.contains(b.range.start()))
        .map(Booking::total)
        .fold(0, Money::saturating_add);

    DashboardStats {
        total_vehicles: vehicles.len(),
        active_bookings,
        pending_requests,
        monthly_revenue,
        utilization_percent: utilization(month, vehicles, bookings),
    }
}

/// Overlapping bookings on one vehicle count once per day.
fn utilization(month: DateRange, vehicles: &[Vehicle], bookings: &[Booking]) -> f64 {
    if vehicles.is_empty() {
        return 0.0;
    }
    let booked: i64 = vehicles
        .iter()
        .flat_map(|v| occupied_days(v.id, &month, bookings, &[]))
        .map(|r| r.len_days())
        .sum();
    let capacity = vehicles.len() as f64 * month.len_days() as f64;
    let pct = booked as f64 / capacity * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Non-cancelled bookings starting today or later, soonest first.
pub fn upcoming(bookings: &[Booking], today: NaiveDate, limit: usize) -> Vec<&Booking> {
    let mut next: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status.blocks_availability() && b.range.start() >= today)
        .collect();
    next.sort_by_key(|b| (b.range.start(), b.id));
    next.truncate(limit);
    next
}
