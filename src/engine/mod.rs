pub mod availability;
pub mod calendar;
mod conflict;
mod error;
mod mutations;
pub mod pricing;
mod queries;
pub mod stats;

pub use availability::Conflict;
pub use error::{EngineError, QuoteError};
pub use mutations::NewBooking;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::wal::Wal;

pub type SharedVehicleState = Arc<RwLock<VehicleState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            // Commit what we have before compacting or counting
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    debug!("WAL writer stopped: {}", wal.path().display());
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush of {} events failed: {e}", batch.len());
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even on append error so partially buffered bytes don't leak into
    // the next batch; the callers of this batch are told it failed.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

// ── Engine ───────────────────────────────────────────────

/// One tenant's fleet: vehicles with their bookings and date blocks.
pub struct Engine {
    pub state: DashMap<Ulid, SharedVehicleState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking/block id → vehicle id
    pub(super) entity_to_vehicle: DashMap<Ulid, Ulid>,
    /// Serializes vehicle add/remove against compaction.
    pub(super) catalog: Mutex<()>,
}

/// Apply an event to a vehicle's state. The caller holds the write lock.
fn apply_to_vehicle(vs: &mut VehicleState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::VehicleUpdated { vehicle } => {
            vs.vehicle = vehicle.clone();
        }
        Event::BookingCreated { booking } => {
            entity_map.insert(booking.id, booking.vehicle_id);
            vs.insert_booking(booking.clone());
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(b) = vs.booking_mut(*id) {
                b.status = *status;
            }
        }
        Event::BookingRepriced { id, quote, .. } => {
            if let Some(b) = vs.booking_mut(*id) {
                b.quote = Some(*quote);
            }
        }
        Event::BookingRescheduled {
            id, range, quote, ..
        } => {
            // Re-insert to keep the start order
            if let Some(mut b) = vs.remove_booking(*id) {
                b.range = *range;
                if quote.is_some() {
                    b.quote = *quote;
                }
                vs.insert_booking(b);
            }
        }
        Event::DatesBlocked { block } => {
            entity_map.insert(block.id, block.vehicle_id);
            vs.insert_block(block.clone());
        }
        Event::BlockRemoved { id, .. } => {
            vs.remove_block(*id);
            entity_map.remove(id);
        }
        // VehicleAdded/Removed are handled at the DashMap level, not here
        Event::VehicleAdded { .. } | Event::VehicleRemoved { .. } => {}
    }
}

fn forget_entities(vs: &VehicleState, entity_map: &DashMap<Ulid, Ulid>) {
    for b in &vs.bookings {
        entity_map.remove(&b.id);
    }
    for blk in &vs.blocks {
        entity_map.remove(&blk.id);
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        let events = replay.events;
        let wal = Wal::open_at(&wal_path, replay.valid_len)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let entity_to_vehicle = DashMap::new();
        let mut vehicles: HashMap<Ulid, VehicleState> = HashMap::new();
        for event in &events {
            match event {
                Event::VehicleAdded { vehicle } => {
                    vehicles.insert(vehicle.id, VehicleState::new(vehicle.clone()));
                }
                Event::VehicleRemoved { id } => {
                    if let Some(vs) = vehicles.remove(id) {
                        forget_entities(&vs, &entity_to_vehicle);
                    }
                }
                other => {
                    if let Some(vs) = vehicles.get_mut(&other.vehicle_id()) {
                        apply_to_vehicle(vs, other, &entity_to_vehicle);
                    }
                }
            }
        }

        info!(
            "replayed {} events from {}: {} vehicles",
            events.len(),
            wal_path.display(),
            vehicles.len()
        );

        let state = DashMap::new();
        for (id, vs) in vehicles {
            state.insert(id, Arc::new(RwLock::new(vs)));
        }

        Ok(Self {
            state,
            wal_tx,
            notify,
            entity_to_vehicle,
            catalog: Mutex::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_vehicle_state(&self, id: &Ulid) -> Option<SharedVehicleState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_vehicle_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_vehicle.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        vs: &mut VehicleState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_vehicle(vs, event, &self.entity_to_vehicle);
        self.notify.send(vs.vehicle.id, event);
        Ok(())
    }

    /// Lookup entity → vehicle, get its state, acquire the write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<VehicleState>, EngineError> {
        let vehicle_id = self
            .get_vehicle_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let vs = self
            .get_vehicle_state(&vehicle_id)
            .ok_or(EngineError::NotFound(vehicle_id))?;
        Ok(vs.write_owned().await)
    }

    pub(super) fn forget_vehicle(&self, vs: &VehicleState) {
        forget_entities(vs, &self.entity_to_vehicle);
        self.state.remove(&vs.vehicle.id);
        self.notify.remove(&vs.vehicle.id);
    }
}
