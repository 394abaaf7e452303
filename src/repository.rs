//! Read access to fleet data, as the storefront and the admin console see it.
//!
//! [`Engine`](crate::engine::Engine) implements both traits for a tenant's
//! own store; [`MemoryRepository`] holds fixed data for tests and benches.

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

// ── Filters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub vehicle_id: Option<Ulid>,
    pub status: Option<BookingStatus>,
    /// Keep bookings overlapping this range.
    pub window: Option<DateRange>,
    /// Case-insensitive substring of the customer's name or phone.
    pub search: Option<String>,
}

impl BookingFilter {
    pub fn for_vehicle(vehicle_id: Ulid) -> Self {
        Self {
            vehicle_id: Some(vehicle_id),
            ..Self::default()
        }
    }

    pub fn within(mut self, window: DateRange) -> Self {
        self.window = Some(window);
        self
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if self.vehicle_id.is_some_and(|id| id != booking.vehicle_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != booking.status) {
            return false;
        }
        if self.window.is_some_and(|w| !w.overlaps(&booking.range)) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                booking.customer.name.to_lowercase().contains(&needle)
                    || booking.customer.phone.to_lowercase().contains(&needle)
            }
        }
    }
}

/// Public catalogue filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleQuery {
    pub vehicle_type: Option<VehicleType>,
    pub min_rate: Option<Money>,
    pub max_rate: Option<Money>,
    pub min_seats: Option<u16>,
}

impl VehicleQuery {
    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        self.vehicle_type.is_none_or(|t| t == vehicle.vehicle_type)
            && self.min_rate.is_none_or(|r| vehicle.daily_rate >= r)
            && self.max_rate.is_none_or(|r| vehicle.daily_rate <= r)
            && self.min_seats.is_none_or(|s| vehicle.seats >= s)
    }
}

// ── Gateways ─────────────────────────────────────────────────────

/// Lookups never fail: a missing record is `None` or an empty list.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Matching bookings ordered by start date, then id.
    async fn bookings(&self, filter: &BookingFilter) -> Vec<Booking>;

    async fn booking(&self, id: Ulid) -> Option<Booking>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    /// All vehicles ordered by id.
    async fn vehicles(&self) -> Vec<Vehicle>;

    async fn vehicle(&self, id: Ulid) -> Option<Vehicle>;

    async fn blocks(&self, vehicle_id: Ulid) -> Vec<DateBlock>;
}

pub(crate) fn sort_bookings(bookings: &mut [Booking]) {
    bookings.sort_by_key(|b| (b.range.start(), b.id));
}

/// Fixture store. Accepts any data as given, overlaps included.
#[derive(Default)]
pub struct MemoryRepository {
    vehicles: DashMap<Ulid, Vehicle>,
    bookings: DashMap<Ulid, Booking>,
    blocks: DashMap<Ulid, DateBlock>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id, vehicle);
    }

    pub fn insert_booking(&self, booking: Booking) {
        self.bookings.insert(booking.id, booking);
    }

    pub fn insert_block(&self, block: DateBlock) {
        self.blocks.insert(block.id, block);
    }

    pub fn remove_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.remove(id).map(|(_, b)| b)
    }
}

#[async_trait]
impl BookingRepository for MemoryRepository {
    async fn bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        sort_bookings(&mut out);
        out
    }

    async fn booking(&self, id: Ulid) -> Option<Booking> {
        self.bookings.get(&id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl VehicleRepository for MemoryRepository {
    async fn vehicles(&self) -> Vec<Vehicle> {
        let mut out: Vec<Vehicle> = self.vehicles.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|v| v.id);
        out
    }

    async fn vehicle(&self, id: Ulid) -> Option<Vehicle> {
        self.vehicles.get(&id).map(|e| e.value().clone())
    }

    async fn blocks(&self, vehicle_id: Ulid) -> Vec<DateBlock> {
        let mut out: Vec<DateBlock> = self
            .blocks
            .iter()
            .filter(|e| e.value().vehicle_id == vehicle_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|b| (b.range.start(), b.id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    #[test]
    fn filter_by_fields() {
        let v = vehicle(100);
        let mut b = booking(v.id, "2024-06-10", "2024-06-12", BookingStatus::Pending);
        b.customer.name = "Sita Sharma".into();

        assert!(BookingFilter::default().matches(&b));
        assert!(BookingFilter::for_vehicle(v.id).matches(&b));
        assert!(!BookingFilter::for_vehicle(Ulid::new()).matches(&b));

        let confirmed = BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..BookingFilter::default()
        };
        assert!(!confirmed.matches(&b));

        assert!(BookingFilter::default().within(range("2024-06-12", "2024-06-20")).matches(&b));
        assert!(!BookingFilter::default().within(range("2024-06-13", "2024-06-20")).matches(&b));
    }

    #[test]
    fn search_name_or_phone() {
        let v = vehicle(100);
        let mut b = booking(v.id, "2024-06-10", "2024-06-12", BookingStatus::Pending);
        b.customer.name = "Sita Sharma".into();
        b.customer.phone = "9801112222".into();

        let search = |s: &str| BookingFilter {
            search: Some(s.into()),
            ..BookingFilter::default()
        };
        assert!(search("sharma").matches(&b));
        assert!(search("SITA").matches(&b));
        assert!(search("1112").matches(&b));
        assert!(search("   ").matches(&b));
        assert!(!search("ram").matches(&b));
    }

    #[test]
    fn vehicle_query() {
        let mut v = vehicle(5000);
        v.vehicle_type = VehicleType::Suv;
        v.seats = 7;

        assert!(VehicleQuery::default().matches(&v));
        let q = VehicleQuery {
            vehicle_type: Some(VehicleType::Suv),
            min_rate: Some(5000),
            max_rate: Some(8000),
            min_seats: Some(7),
        };
        assert!(q.matches(&v));
        assert!(!VehicleQuery { min_seats: Some(8), ..q.clone() }.matches(&v));
        assert!(!VehicleQuery { max_rate: Some(4999), ..q.clone() }.matches(&v));
        assert!(!VehicleQuery { vehicle_type: Some(VehicleType::Van), ..q }.matches(&v));
    }

    #[tokio::test]
    async fn memory_repository_orders_results() {
        let repo = MemoryRepository::new();
        let v = vehicle(100);
        repo.insert_vehicle(v.clone());
        let late = booking(v.id, "2024-06-20", "2024-06-21", BookingStatus::Pending);
        let early = booking(v.id, "2024-06-01", "2024-06-02", BookingStatus::Confirmed);
        repo.insert_booking(late.clone());
        repo.insert_booking(early.clone());
        repo.insert_block(block(v.id, "2024-06-05", "2024-06-05"));

        let all = repo.bookings(&BookingFilter::default()).await;
        assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![early.id, late.id]);
        assert_eq!(repo.booking(late.id).await, Some(late));
        assert_eq!(repo.vehicle(v.id).await, Some(v.clone()));
        assert_eq!(repo.blocks(v.id).await.len(), 1);
        assert!(repo.blocks(Ulid::new()).await.is_empty());
        assert!(repo.vehicle(Ulid::new()).await.is_none());
    }
}
