//! Read-side queries the storefront and the admin console run. Each call
//! takes a fresh snapshot from the repository and hands it to the pure
//! functions in [`crate::engine`]; nothing is cached between calls.

use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::availability::{first_conflict, occupied_days};
use crate::engine::calendar::{CalendarFilter, grid_range};
use crate::engine::pricing;
use crate::engine::stats::{self, DashboardStats};
use crate::engine::{Conflict, EngineError};
use crate::model::*;
use crate::observability;
use crate::repository::{BookingFilter, BookingRepository, VehicleQuery, VehicleRepository};

pub struct Desk<R> {
    repo: Arc<R>,
}

impl<R> Clone for Desk<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: BookingRepository + VehicleRepository> Desk<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// What keeps `vehicle_id` from being booked for `range`. Pass the
    /// booking being edited as `exclude` so it does not collide with itself.
    /// A vehicle that is not Active is `VehicleUnavailable`, as on the engine.
    pub async fn check_availability(
        &self,
        vehicle_id: Ulid,
        range: DateRange,
        exclude: Option<Ulid>,
    ) -> Result<Option<Conflict>, EngineError> {
        let vehicle = self
            .repo
            .vehicle(vehicle_id)
            .await
            .ok_or(EngineError::NotFound(vehicle_id))?;
        if !vehicle.status.is_bookable() {
            return Err(EngineError::VehicleUnavailable(vehicle_id));
        }
        Ok(self.conflict(vehicle_id, range, exclude).await)
    }

    async fn conflict(
        &self,
        vehicle_id: Ulid,
        range: DateRange,
        exclude: Option<Ulid>,
    ) -> Option<Conflict> {
        let filter = BookingFilter::for_vehicle(vehicle_id).within(range);
        let mut bookings = self.repo.bookings(&filter).await;
        if let Some(id) = exclude {
            bookings.retain(|b| b.id != id);
        }
        let blocks = self.repo.blocks(vehicle_id).await;
        first_conflict(vehicle_id, &range, &bookings, &blocks)
    }

    /// Price `range` at the vehicle's current daily rate.
    pub async fn quote(
        &self,
        vehicle_id: Ulid,
        range: DateRange,
        discount: Money,
        deposit: Money,
    ) -> Result<Quote, EngineError> {
        let vehicle = self
            .repo
            .vehicle(vehicle_id)
            .await
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let quote = pricing::quote(&range, vehicle.daily_rate, discount, deposit)?;
        metrics::counter!(observability::QUOTES_TOTAL).increment(1);
        Ok(quote)
    }

    /// Bookings visible on the month grid of `anchor`, ordered by start then
    /// id, ready for [`calendar::build`](crate::engine::calendar::build).
    pub async fn calendar_bookings(
        &self,
        anchor: NaiveDate,
        filter: &CalendarFilter,
    ) -> Vec<Booking> {
        let query = BookingFilter {
            vehicle_id: filter.vehicle_id,
            window: Some(grid_range(anchor, filter.week_start)),
            ..BookingFilter::default()
        };
        let mut bookings = self.repo.bookings(&query).await;
        bookings.retain(|b| filter.admits(b));
        bookings
    }

    /// Active vehicles matching `query` with nothing booked or blocked in `range`.
    pub async fn available_vehicles(&self, range: DateRange, query: &VehicleQuery) -> Vec<Vehicle> {
        let candidates: Vec<Vehicle> = self
            .repo
            .vehicles()
            .await
            .into_iter()
            .filter(|v| v.status.is_bookable() && query.matches(v))
            .collect();

        let mut free = Vec::with_capacity(candidates.len());
        for vehicle in candidates {
            if self.conflict(vehicle.id, range, None).await.is_none() {
                free.push(vehicle);
            }
        }
        free
    }

    /// Booked or blocked days of one vehicle inside `window`, merged.
    pub async fn booked_days(&self, vehicle_id: Ulid, window: DateRange) -> Vec<DateRange> {
        let bookings = self
            .repo
            .bookings(&BookingFilter::for_vehicle(vehicle_id).within(window))
            .await;
        let blocks = self.repo.blocks(vehicle_id).await;
        occupied_days(vehicle_id, &window, &bookings, &blocks)
    }

    /// Dashboard for the month containing `anchor`, as seen on `today`.
    pub async fn dashboard(&self, anchor: NaiveDate, today: NaiveDate) -> DashboardStats {
        let vehicles = self.repo.vehicles().await;
        let bookings = self.repo.bookings(&BookingFilter::default()).await;
        stats::dashboard(DateRange::month_of(anchor), today, &vehicles, &bookings)
    }

    pub async fn upcoming(&self, today: NaiveDate, limit: usize) -> Vec<Booking> {
        let bookings = self.repo.bookings(&BookingFilter::default()).await;
        stats::upcoming(&bookings, today, limit)
            .into_iter()
            .cloned()
            .collect()
    }
}
