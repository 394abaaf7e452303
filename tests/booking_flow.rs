//! End-to-end flow through the public API: an operator sets up a fleet,
//! a customer request comes in, the desk prices and schedules it, and the
//! tenant is reopened from its log.

use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use fleetlink::config::Config;
use fleetlink::desk::Desk;
use fleetlink::engine::calendar::{self, CalendarFilter};
use fleetlink::engine::{Conflict, EngineError, NewBooking};
use fleetlink::model::*;
use fleetlink::repository::{BookingFilter, VehicleQuery};
use fleetlink::tenant::TenantManager;

fn data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("fleetlink_it").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(date(start), date(end)).unwrap()
}

fn vehicle(make: &str, model: &str, plate: &str, vehicle_type: VehicleType, rate: Money) -> Vehicle {
    Vehicle {
        id: Ulid::new(),
        make: make.into(),
        model: model.into(),
        plate: plate.into(),
        vehicle_type,
        status: VehicleStatus::Active,
        seats: 7,
        daily_rate: rate,
    }
}

fn request(vehicle_id: Ulid, r: DateRange, name: &str) -> NewBooking {
    NewBooking {
        id: Ulid::new(),
        vehicle_id,
        range: r,
        customer: Customer {
            name: name.into(),
            phone: "9841000000".into(),
        },
        pickup_location: Some("Thamel".into()),
        drop_location: Some("Pokhara".into()),
        discount: 0,
        deposit: 0,
    }
}

#[tokio::test]
async fn request_to_completion() {
    let dir = data_dir("request_to_completion");
    let config = Config::from_lookup(|var| match var {
        "FLEETLINK_DATA_DIR" => Some(dir.display().to_string()),
        "FLEETLINK_HOST" => Some("red.fleetlink.com".into()),
        _ => None,
    })
    .unwrap();
    let tenant = config.tenant_config(None).unwrap();
    assert_eq!(tenant.tenant_id, "red");

    let tenants = TenantManager::new(config.data_dir.clone(), config.compact_threshold);
    let engine = tenants.get_or_create(&tenant.tenant_id).unwrap();
    let desk = Desk::new(engine.clone());

    let suv = vehicle("Mahindra", "Scorpio", "BA-1-JA-4321", VehicleType::Suv, 800_000);
    let van = vehicle("Toyota", "HiAce", "BA-2-KHA-77", VehicleType::Van, 650_000);
    assert_ok!(engine.add_vehicle(suv.clone()).await);
    assert_ok!(engine.add_vehicle(van.clone()).await);

    // Storefront: what is free for the trip, and what would it cost
    let trip = range("2024-06-14", "2024-06-17");
    let suvs = VehicleQuery {
        vehicle_type: Some(VehicleType::Suv),
        ..VehicleQuery::default()
    };
    assert_eq!(desk.available_vehicles(trip, &suvs).await, vec![suv.clone()]);
    let quote = desk.quote(suv.id, trip, 100_000, 500_000).await.unwrap();
    assert_eq!(quote.total(), 2_300_000);
    assert_eq!(quote.payment_status(), PaymentStatus::Partial);

    // Customer request lands as Pending
    let mut req = request(suv.id, trip, "Sita Sharma");
    req.discount = 100_000;
    req.deposit = 500_000;
    let booking = engine
        .create_booking(req, BookingStatus::Pending)
        .await
        .unwrap();
    assert_eq!(booking.quote, Some(quote));

    // A second customer wants overlapping days
    let clash = engine
        .create_booking(
            request(suv.id, range("2024-06-17", "2024-06-18"), "Ravi"),
            BookingStatus::Pending,
        )
        .await;
    assert!(matches!(clash, Err(EngineError::Conflict(id)) if id == booking.id));
    assert_eq!(
        desk.check_availability(suv.id, range("2024-06-17", "2024-06-18"), None)
            .await
            .unwrap(),
        Some(Conflict::Booking(booking.id))
    );
    assert_eq!(desk.available_vehicles(trip, &VehicleQuery::default()).await, vec![van.clone()]);

    // Operator confirms, the trip runs and ends
    for next in [
        BookingStatus::Confirmed,
        BookingStatus::Ongoing,
        BookingStatus::Completed,
    ] {
        assert_ok!(engine.set_status(booking.id, next).await);
    }
    assert_err!(engine.reschedule(booking.id, range("2024-06-20", "2024-06-22")).await);

    // Month view
    let filter = CalendarFilter {
        week_start: Weekday::Mon,
        ..CalendarFilter::default()
    };
    let bookings = desk.calendar_bookings(date("2024-06-01"), &filter).await;
    let month = calendar::build(date("2024-06-01"), &bookings, &filter);
    assert_eq!(month.cells.len(), 35);
    for d in trip.days() {
        let cell = month.cell(d).unwrap();
        assert_eq!(cell.bookings.len(), 1);
        assert_eq!(cell.bookings[0].id, booking.id);
    }
    assert!(month.cell(date("2024-06-18")).unwrap().bookings.is_empty());

    let stats = desk.dashboard(date("2024-06-01"), date("2024-06-15")).await;
    assert_eq!(stats.total_vehicles, 2);
    assert_eq!(stats.monthly_revenue, 2_300_000);
    assert_eq!(stats.pending_requests, 0);
}

#[tokio::test]
async fn tenant_survives_restart() {
    let dir = data_dir("restart");
    let v = vehicle("Suzuki", "Swift", "BA-3-PA-12", VehicleType::Sedan, 300_000);
    let booking = {
        let tenants = TenantManager::new(dir.clone(), 1000);
        let engine = tenants.get_or_create("green").unwrap();
        engine.add_vehicle(v.clone()).await.unwrap();
        let b = engine
            .create_booking(
                request(v.id, range("2024-06-10", "2024-06-12"), "Asha"),
                BookingStatus::Confirmed,
            )
            .await
            .unwrap();
        engine
            .block_dates(Ulid::new(), v.id, range("2024-06-20", "2024-06-21"), "Service".into())
            .await
            .unwrap();
        engine.compact_wal().await.unwrap();
        engine.update_payment(b.id, 0, 600_000).await.unwrap()
    };

    let tenants = TenantManager::new(dir, 1000);
    let engine = tenants.get_or_create("green").unwrap();
    assert_eq!(engine.get_booking(booking.id).await.unwrap(), booking);
    assert_eq!(booking.payment_status(), Some(PaymentStatus::Paid));
    assert_eq!(engine.list_blocks(v.id).await.unwrap().len(), 1);

    let booked = Desk::new(engine.clone())
        .booked_days(v.id, DateRange::month_of(date("2024-06-01")))
        .await;
    assert_eq!(
        booked,
        vec![range("2024-06-10", "2024-06-12"), range("2024-06-20", "2024-06-21")]
    );
    assert_eq!(
        engine
            .list_bookings(&BookingFilter::for_vehicle(v.id))
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn change_feed_reaches_subscribers() {
    let dir = data_dir("change_feed");
    let tenants = TenantManager::new(dir, 1000);
    let engine = tenants.get_or_create("demo").unwrap();
    let v = vehicle("Toyota", "HiAce", "BA-2-KHA-78", VehicleType::Van, 650_000);
    engine.add_vehicle(v.clone()).await.unwrap();

    let mut feed = engine.notify.subscribe(v.id);
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(event) = feed.recv().await {
            seen.push(event);
            if seen.len() == 2 {
                break;
            }
        }
        seen
    });

    let b = engine
        .create_booking(
            request(v.id, range("2024-06-10", "2024-06-12"), "Asha"),
            BookingStatus::Pending,
        )
        .await
        .unwrap();
    engine
        .set_status(b.id, BookingStatus::Cancelled)
        .await
        .unwrap();

    let seen = watcher.await.unwrap();
    assert!(matches!(seen[0], Event::BookingCreated { .. }));
    assert!(matches!(
        seen[1],
        Event::BookingStatusChanged {
            status: BookingStatus::Cancelled,
            ..
        }
    ));
}
