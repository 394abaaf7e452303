use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_blockable, check_no_conflict, validate_range, validate_text};
use super::pricing::quote;
use super::{Engine, EngineError, WalCommand};

/// Everything needed to request a booking. The price is derived from the
/// vehicle's daily rate at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub range: DateRange,
    pub customer: Customer,
    pub pickup_location: Option<String>,
    pub drop_location: Option<String>,
    pub discount: Money,
    pub deposit: Money,
}

impl NewBooking {
    fn validate(&self) -> Result<(), EngineError> {
        validate_range(&self.range)?;
        validate_text(&self.customer.name, "customer name too long")?;
        validate_text(&self.customer.phone, "phone too long")?;
        if let Some(ref p) = self.pickup_location {
            validate_text(p, "pickup location too long")?;
        }
        if let Some(ref d) = self.drop_location {
            validate_text(d, "drop location too long")?;
        }
        Ok(())
    }
}

fn validate_vehicle(vehicle: &Vehicle) -> Result<(), EngineError> {
    validate_text(&vehicle.make, "make too long")?;
    validate_text(&vehicle.model, "model too long")?;
    validate_text(&vehicle.plate, "plate too long")?;
    if vehicle.seats > MAX_SEATS {
        return Err(EngineError::LimitExceeded("too many seats"));
    }
    if vehicle.daily_rate < 0 {
        return Err(EngineError::InvalidQuote(super::QuoteError::NegativeRate(
            vehicle.daily_rate,
        )));
    }
    Ok(())
}

impl Engine {
    // ── Fleet ────────────────────────────────────────────

    pub async fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), EngineError> {
        validate_vehicle(&vehicle)?;
        let _catalog = self.catalog.lock().await;
        if self.state.len() >= MAX_VEHICLES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many vehicles"));
        }
        if self.state.contains_key(&vehicle.id) {
            return Err(EngineError::AlreadyExists(vehicle.id));
        }

        let id = vehicle.id;
        let event = Event::VehicleAdded { vehicle: vehicle.clone() };
        self.wal_append(&event).await?;
        self.state
            .insert(id, Arc::new(RwLock::new(VehicleState::new(vehicle))));
        self.notify.send(id, &event);
        info!("vehicle {id} added");
        Ok(())
    }

    /// Replace a vehicle's details. Existing bookings keep the price they were quoted.
    pub async fn update_vehicle(&self, vehicle: Vehicle) -> Result<(), EngineError> {
        validate_vehicle(&vehicle)?;
        let vs = self
            .get_vehicle_state(&vehicle.id)
            .ok_or(EngineError::NotFound(vehicle.id))?;
        let mut guard = vs.write().await;

        let event = Event::VehicleUpdated { vehicle };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Remove a vehicle with no Pending/Confirmed/Ongoing bookings. Its
    /// finished bookings and blocks go with it.
    pub async fn remove_vehicle(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;
        let vs = self.get_vehicle_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = vs.write().await;
        if guard.open_bookings() > 0 {
            return Err(EngineError::HasOpenBookings(id));
        }

        let event = Event::VehicleRemoved { id };
        self.wal_append(&event).await?;
        self.notify.send(id, &event);
        self.forget_vehicle(&guard);
        info!("vehicle {id} removed");
        Ok(())
    }

    // ── Bookings ─────────────────────────────────────────

    /// Check availability and store the booking under the vehicle's write
    /// lock, so two requests for the same days cannot both succeed.
    pub async fn create_booking(
        &self,
        request: NewBooking,
        initial: BookingStatus,
    ) -> Result<Booking, EngineError> {
        if !initial.is_initial() {
            return Err(EngineError::InvalidInitialStatus(initial));
        }
        request.validate()?;
        if self.entity_to_vehicle.contains_key(&request.id) {
            return Err(EngineError::AlreadyExists(request.id));
        }

        let vs = self
            .get_vehicle_state(&request.vehicle_id)
            .ok_or(EngineError::NotFound(request.vehicle_id))?;
        let mut guard = vs.write().await;
        if !guard.vehicle.status.is_bookable() {
            return Err(EngineError::VehicleUnavailable(request.vehicle_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_VEHICLE {
            return Err(EngineError::LimitExceeded("too many bookings on vehicle"));
        }
        if let Err(e) = check_no_conflict(&guard, &request.range, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!("booking {} rejected: {e}", request.id);
            return Err(e);
        }

        let quote = quote(
            &request.range,
            guard.vehicle.daily_rate,
            request.discount,
            request.deposit,
        )?;
        let booking = Booking {
            id: request.id,
            vehicle_id: request.vehicle_id,
            range: request.range,
            status: initial,
            customer: request.customer,
            pickup_location: request.pickup_location,
            drop_location: request.drop_location,
            quote: Some(quote),
        };

        let event = Event::BookingCreated { booking: booking.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL, "status" => initial.as_str())
            .increment(1);
        Ok(booking)
    }

    /// Move a booking along its lifecycle.
    pub async fn set_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        let current = guard.booking(id).ok_or(EngineError::NotFound(id))?.status;
        if !current.can_become(status) {
            return Err(EngineError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let event = Event::BookingStatusChanged {
            id,
            vehicle_id: guard.vehicle.id,
            status,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        booking_after(&guard, id)
    }

    /// Record a new discount/deposit pair and re-derive the totals.
    pub async fn update_payment(
        &self,
        id: Ulid,
        discount: Money,
        deposit: Money,
    ) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::BookingClosed(id));
        }
        let quote = match booking.quote {
            Some(q) => q.with_adjustments(discount, deposit)?,
            None => quote(&booking.range, guard.vehicle.daily_rate, discount, deposit)?,
        };

        let event = Event::BookingRepriced {
            id,
            vehicle_id: guard.vehicle.id,
            quote,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        booking_after(&guard, id)
    }

    /// Move a booking to new dates. The booking does not conflict with its
    /// own old dates; the quoted rate, discount and deposit carry over.
    pub async fn reschedule(&self, id: Ulid, range: DateRange) -> Result<Booking, EngineError> {
        validate_range(&range)?;
        let mut guard = self.resolve_entity_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.status.is_terminal() {
            return Err(EngineError::BookingClosed(id));
        }
        let quote = match booking.quote {
            Some(q) => q.for_range(&range, q.daily_rate())?,
            None => quote(&range, guard.vehicle.daily_rate, 0, 0)?,
        };
        if let Err(e) = check_no_conflict(&guard, &range, Some(id)) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let event = Event::BookingRescheduled {
            id,
            vehicle_id: guard.vehicle.id,
            range,
            quote: Some(quote),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        booking_after(&guard, id)
    }

    // ── Date blocks ──────────────────────────────────────

    pub async fn block_dates(
        &self,
        id: Ulid,
        vehicle_id: Ulid,
        range: DateRange,
        reason: String,
    ) -> Result<DateBlock, EngineError> {
        validate_range(&range)?;
        validate_text(&reason, "reason too long")?;
        if self.entity_to_vehicle.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let vs = self
            .get_vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let mut guard = vs.write().await;
        if guard.blocks.len() >= MAX_BLOCKS_PER_VEHICLE {
            return Err(EngineError::LimitExceeded("too many blocks on vehicle"));
        }
        check_blockable(&guard, &range)?;

        let block = DateBlock {
            id,
            vehicle_id,
            range,
            reason,
        };
        let event = Event::DatesBlocked { block: block.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(block)
    }

    pub async fn unblock(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        if !guard.blocks.iter().any(|b| b.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let vehicle_id = guard.vehicle.id;
        let event = Event::BlockRemoved { id, vehicle_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(vehicle_id)
    }

    // ── WAL maintenance ──────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the current state.
    ///
    /// Holds the catalog lock and every vehicle's read lock until the new file
    /// is in place, so no mutation lands between the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;

        let mut vehicle_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        vehicle_ids.sort();

        let mut guards = Vec::with_capacity(vehicle_ids.len());
        for id in &vehicle_ids {
            if let Some(vs) = self.get_vehicle_state(id) {
                guards.push(vs.read_owned().await);
            }
        }

        let mut events = Vec::new();
        for vs in &guards {
            events.push(Event::VehicleAdded {
                vehicle: vs.vehicle.clone(),
            });
            events.extend(vs.bookings.iter().map(|b| Event::BookingCreated { booking: b.clone() }));
            events.extend(vs.blocks.iter().map(|b| Event::DatesBlocked { block: b.clone() }));
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;

        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn booking_after(vs: &VehicleState, id: Ulid) -> Result<Booking, EngineError> {
    vs.booking(id).cloned().ok_or(EngineError::NotFound(id))
}
