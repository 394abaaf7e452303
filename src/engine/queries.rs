use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::repository::{BookingFilter, BookingRepository, VehicleRepository, sort_bookings};

use super::availability::{Conflict, first_conflict};
use super::conflict::validate_range;
use super::{Engine, EngineError};

impl Engine {
    /// Vehicles in id (creation) order.
    pub async fn list_vehicles(&self) -> Vec<Vehicle> {
        let shared: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(shared.len());
        for vs in shared {
            out.push(vs.read().await.vehicle.clone());
        }
        out.sort_by_key(|v| v.id);
        out
    }

    pub async fn get_vehicle(&self, id: Ulid) -> Result<Vehicle, EngineError> {
        let vs = self.get_vehicle_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = vs.read().await;
        Ok(guard.vehicle.clone())
    }

    /// Bookings matching `filter`, ordered by start date then id.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let shared: Vec<_> = match filter.vehicle_id {
            Some(id) => self.get_vehicle_state(&id).into_iter().collect(),
            None => self.state.iter().map(|e| e.value().clone()).collect(),
        };

        let mut out = Vec::new();
        for vs in shared {
            let guard = vs.read().await;
            match filter.window {
                Some(window) => out.extend(
                    guard
                        .overlapping_bookings(&window)
                        .filter(|b| filter.matches(b))
                        .cloned(),
                ),
                None => out.extend(guard.bookings.iter().filter(|b| filter.matches(b)).cloned()),
            }
        }
        sort_bookings(&mut out);
        out
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let vehicle_id = self
            .get_vehicle_for_entity(&id)
            .ok_or(EngineError::NotFound(id))?;
        let vs = self
            .get_vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let guard = vs.read().await;
        guard.booking(id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn list_blocks(&self, vehicle_id: Ulid) -> Result<Vec<DateBlock>, EngineError> {
        let vs = self
            .get_vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let guard = vs.read().await;
        Ok(guard.blocks.clone())
    }

    /// What, if anything, keeps the vehicle from being booked for `range`.
    /// A vehicle that is not Active is reported as unavailable.
    pub async fn check_availability(
        &self,
        vehicle_id: Ulid,
        range: DateRange,
    ) -> Result<Option<Conflict>, EngineError> {
        validate_range(&range)?;
        let vs = self
            .get_vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let guard = vs.read().await;
        if !guard.vehicle.status.is_bookable() {
            return Err(EngineError::VehicleUnavailable(vehicle_id));
        }

        let bookings: Vec<Booking> = guard.overlapping_bookings(&range).cloned().collect();
        let blocks: Vec<DateBlock> = guard.overlapping_blocks(&range).cloned().collect();
        let conflict = first_conflict(vehicle_id, &range, &bookings, &blocks);

        metrics::counter!(
            observability::AVAILABILITY_CHECKS_TOTAL,
            "result" => if conflict.is_none() { "free" } else { "taken" }
        )
        .increment(1);
        Ok(conflict)
    }
}

#[async_trait]
impl BookingRepository for Engine {
    async fn bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        self.list_bookings(filter).await
    }

    async fn booking(&self, id: Ulid) -> Option<Booking> {
        self.get_booking(id).await.ok()
    }
}

#[async_trait]
impl VehicleRepository for Engine {
    async fn vehicles(&self) -> Vec<Vehicle> {
        self.list_vehicles().await
    }

    async fn vehicle(&self, id: Ulid) -> Option<Vehicle> {
        self.get_vehicle(id).await.ok()
    }

    async fn blocks(&self, vehicle_id: Ulid) -> Vec<DateBlock> {
        self.list_blocks(vehicle_id).await.unwrap_or_default()
    }
}
