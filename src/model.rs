use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::QuoteError;
use crate::engine::pricing::price;

/// Minor currency units (cents, paisa). The only money type.
pub type Money = i64;

// ── Date ranges ──────────────────────────────────────────────────

/// Inclusive calendar-date interval `[start, end]`.
///
/// A booking occupies both its start and its end day in full, so two ranges
/// that share a single day overlap. Fields are private: every value in
/// circulation (including deserialized ones) satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeParts", into = "RangeParts")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct RangeParts {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RangeParts> for DateRange {
    type Error = RangeError;

    fn try_from(parts: RangeParts) -> Result<Self, Self::Error> {
        DateRange::new(parts.start, parts.end)
    }
}

impl From<DateRange> for RangeParts {
    fn from(range: DateRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// The calendar month containing `anchor`.
    pub fn month_of(anchor: NaiveDate) -> Self {
        let first = anchor - Days::new(u64::from(anchor.day0()));
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        Self { start: first, end: last }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Calendar days from start to end; 0 for a single-day range.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Number of days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        self.span_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Smallest range covering both.
    pub fn hull(&self, other: &DateRange) -> DateRange {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Inclusive overlap test. Symmetric, and every range overlaps itself.
pub fn overlaps(a: &DateRange, b: &DateRange) -> bool {
    a.overlaps(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::EndBeforeStart { start, end } => {
                write!(f, "invalid range: end {end} precedes start {start}")
            }
        }
    }
}

impl std::error::Error for RangeError {}

// ── Booking status ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
}

/// Presentation tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Warning,
    Info,
    Success,
    Muted,
    Danger,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Ongoing,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    /// Cancelled bookings never hold the vehicle. Everything else does.
    pub fn blocks_availability(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    /// Still awaiting or in the middle of a trip.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Ongoing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Statuses a booking may be created with.
    pub fn is_initial(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_become(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Ongoing)
                | (Confirmed, Cancelled)
                | (Ongoing, Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Ongoing => "Ongoing",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn tone(self) -> StatusTone {
        match self {
            BookingStatus::Pending => StatusTone::Warning,
            BookingStatus::Confirmed => StatusTone::Info,
            BookingStatus::Ongoing => StatusTone::Success,
            BookingStatus::Completed => StatusTone::Muted,
            BookingStatus::Cancelled => StatusTone::Danger,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant::new("booking status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Derived from the amounts, never set on its own.
    pub fn from_amounts(deposit: Money, remaining: Money) -> Self {
        if remaining == 0 {
            PaymentStatus::Paid
        } else if deposit > 0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Quote ────────────────────────────────────────────────────────

/// Price breakdown for a date range. Only the pricing module builds one,
/// so `payment_status` always agrees with the amounts. Deserialized quotes
/// are re-priced and rejected if any stored figure disagrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuoteRecord")]
pub struct Quote {
    pub(crate) days: i64,
    pub(crate) daily_rate: Money,
    pub(crate) subtotal: Money,
    pub(crate) discount: Money,
    pub(crate) deposit: Money,
    pub(crate) total: Money,
    pub(crate) remaining: Money,
    pub(crate) payment_status: PaymentStatus,
}

/// Wire shape of a stored [`Quote`]; same field order as the derived `Serialize`.
#[derive(Deserialize)]
struct QuoteRecord {
    days: i64,
    daily_rate: Money,
    subtotal: Money,
    discount: Money,
    deposit: Money,
    total: Money,
    remaining: Money,
    payment_status: PaymentStatus,
}

impl TryFrom<QuoteRecord> for Quote {
    type Error = QuoteError;

    fn try_from(r: QuoteRecord) -> Result<Self, Self::Error> {
        if r.days < 1 {
            return Err(QuoteError::Inconsistent);
        }
        let quote = price(r.days, r.daily_rate, r.discount, r.deposit)?;
        let stored = (r.subtotal, r.total, r.remaining, r.payment_status);
        if stored != (quote.subtotal, quote.total, quote.remaining, quote.payment_status) {
            return Err(QuoteError::Inconsistent);
        }
        Ok(quote)
    }
}

impl Quote {
    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn daily_rate(&self) -> Money {
        self.daily_rate
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn deposit(&self) -> Money {
        self.deposit
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn remaining(&self) -> Money {
        self.remaining
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }
}

// ── Vehicles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Sedan,
    Suv,
    Van,
    Luxury,
    Bus,
}

impl VehicleType {
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Sedan,
        VehicleType::Suv,
        VehicleType::Van,
        VehicleType::Luxury,
        VehicleType::Bus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Sedan => "Sedan",
            VehicleType::Suv => "SUV",
            VehicleType::Van => "Van",
            VehicleType::Luxury => "Luxury",
            VehicleType::Bus => "Bus",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant::new("vehicle type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Active,
    Maintenance,
    Inactive,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 3] = [
        VehicleStatus::Active,
        VehicleStatus::Maintenance,
        VehicleStatus::Inactive,
    ];

    pub fn is_bookable(self) -> bool {
        matches!(self, VehicleStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Active => "Active",
            VehicleStatus::Maintenance => "Maintenance",
            VehicleStatus::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleStatus::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant::new("vehicle status", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Ulid,
    pub make: String,
    pub model: String,
    pub plate: String,
    pub vehicle_type: VehicleType,
    pub status: VehicleStatus,
    pub seats: u16,
    pub daily_rate: Money,
}

impl Vehicle {
    /// Short label for dense views: the last plate segment, else the model prefix.
    pub fn code(&self) -> String {
        match self.plate.rsplit('-').next().filter(|s| !s.is_empty()) {
            Some(tail) => tail.to_string(),
            None => self.model.chars().take(3).collect(),
        }
    }
}

// ── Bookings and blocks ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub range: DateRange,
    pub status: BookingStatus,
    pub customer: Customer,
    pub pickup_location: Option<String>,
    pub drop_location: Option<String>,
    pub quote: Option<Quote>,
}

impl Booking {
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.quote.map(|q| q.payment_status())
    }

    /// Amount due after discount, 0 when unpriced.
    pub fn total(&self) -> Money {
        self.quote.map_or(0, |q| q.total())
    }
}

/// Operator-entered closure of a vehicle (maintenance, personal use).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBlock {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub range: DateRange,
    pub reason: String,
}

// ── Per-vehicle state ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VehicleState {
    pub vehicle: Vehicle,
    /// Sorted by `range.start`; equal starts keep insertion order.
    pub bookings: Vec<Booking>,
    /// Sorted by `range.start`.
    pub blocks: Vec<DateBlock>,
}

impl VehicleState {
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            vehicle,
            bookings: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.range.start() <= booking.range.start());
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn insert_block(&mut self, block: DateBlock) {
        let pos = self
            .blocks
            .partition_point(|b| b.range.start() <= block.range.start());
        self.blocks.insert(pos, block);
    }

    pub fn remove_block(&mut self, id: Ulid) -> Option<DateBlock> {
        let pos = self.blocks.iter().position(|b| b.id == id)?;
        Some(self.blocks.remove(pos))
    }

    /// Bookings (any status) whose range overlaps the query.
    /// Uses binary search to skip bookings starting after `query.end`.
    pub fn overlapping_bookings(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start() <= query.end());
        let query_start = query.start();
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end() >= query_start)
    }

    pub fn overlapping_blocks(&self, query: &DateRange) -> impl Iterator<Item = &DateBlock> {
        let right_bound = self
            .blocks
            .partition_point(|b| b.range.start() <= query.end());
        let query_start = query.start();
        self.blocks[..right_bound]
            .iter()
            .filter(move |b| b.range.end() >= query_start)
    }

    pub fn open_bookings(&self) -> usize {
        self.bookings.iter().filter(|b| b.status.is_open()).count()
    }
}

// ── WAL records ──────────────────────────────────────────────────

/// Flat event records. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    VehicleAdded {
        vehicle: Vehicle,
    },
    VehicleUpdated {
        vehicle: Vehicle,
    },
    VehicleRemoved {
        id: Ulid,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        vehicle_id: Ulid,
        status: BookingStatus,
    },
    BookingRepriced {
        id: Ulid,
        vehicle_id: Ulid,
        quote: Quote,
    },
    BookingRescheduled {
        id: Ulid,
        vehicle_id: Ulid,
        range: DateRange,
        quote: Option<Quote>,
    },
    DatesBlocked {
        block: DateBlock,
    },
    BlockRemoved {
        id: Ulid,
        vehicle_id: Ulid,
    },
}

impl Event {
    /// The vehicle this event belongs to.
    pub fn vehicle_id(&self) -> Ulid {
        match self {
            Event::VehicleAdded { vehicle } | Event::VehicleUpdated { vehicle } => vehicle.id,
            Event::VehicleRemoved { id } => *id,
            Event::BookingCreated { booking } => booking.vehicle_id,
            Event::DatesBlocked { block } => block.vehicle_id,
            Event::BookingStatusChanged { vehicle_id, .. }
            | Event::BookingRepriced { vehicle_id, .. }
            | Event::BookingRescheduled { vehicle_id, .. }
            | Event::BlockRemoved { vehicle_id, .. } => *vehicle_id,
        }
    }
}

// ── Parse errors ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn range_rejects_end_before_start() {
        let err = DateRange::new(date("2024-06-12"), date("2024-06-10")).unwrap_err();
        assert_eq!(
            err,
            RangeError::EndBeforeStart {
                start: date("2024-06-12"),
                end: date("2024-06-10"),
            }
        );
    }

    #[test]
    fn range_basics() {
        let r = range("2024-06-10", "2024-06-12");
        assert_eq!(r.span_days(), 2);
        assert_eq!(r.len_days(), 3);
        assert!(r.contains(date("2024-06-10")));
        assert!(r.contains(date("2024-06-12")));
        assert!(!r.contains(date("2024-06-13"))); // inclusive, not beyond
        let days: Vec<_> = r.days().collect();
        assert_eq!(days, vec![date("2024-06-10"), date("2024-06-11"), date("2024-06-12")]);
    }

    #[test]
    fn single_day_range() {
        let r = DateRange::single(date("2024-02-29"));
        assert_eq!(r.span_days(), 0);
        assert_eq!(r.len_days(), 1);
        assert_eq!(r.days().count(), 1);
    }

    #[test]
    fn overlap_shared_end_day() {
        // Inclusive on both ends: handing over on the same day is a clash
        let a = range("2024-06-10", "2024-06-12");
        let b = range("2024-06-12", "2024-06-15");
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
    }

    #[test]
    fn overlap_adjacent_days_do_not_clash() {
        let a = range("2024-06-10", "2024-06-12");
        let b = range("2024-06-13", "2024-06-15");
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
    }

    #[test]
    fn overlap_is_symmetric_and_reflexive() {
        let ranges = [
            range("2024-05-30", "2024-06-02"),
            range("2024-06-01", "2024-06-01"),
            range("2024-06-02", "2024-06-09"),
            range("2024-06-10", "2024-06-12"),
            range("2024-01-01", "2024-12-31"),
        ];
        for a in &ranges {
            assert!(overlaps(a, a));
            for b in &ranges {
                assert_eq!(overlaps(a, b), overlaps(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn intersection_clamps() {
        let a = range("2024-05-28", "2024-06-03");
        let month = DateRange::month_of(date("2024-06-15"));
        assert_eq!(a.intersection(&month), Some(range("2024-06-01", "2024-06-03")));
        assert_eq!(range("2024-07-01", "2024-07-02").intersection(&month), None);
        assert!(month.contains_range(&range("2024-06-01", "2024-06-30")));
    }

    #[test]
    fn month_of_handles_lengths() {
        assert_eq!(DateRange::month_of(date("2024-02-10")), range("2024-02-01", "2024-02-29"));
        assert_eq!(DateRange::month_of(date("2023-02-28")), range("2023-02-01", "2023-02-28"));
        assert_eq!(DateRange::month_of(date("2024-12-31")), range("2024-12-01", "2024-12-31"));
    }

    #[test]
    fn deserialize_reprices_quote() {
        let q = crate::engine::pricing::quote(&range("2024-06-10", "2024-06-13"), 100, 50, 100)
            .unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(serde_json::from_str::<Quote>(&json).unwrap(), q);
        assert_eq!(q.payment_status(), PaymentStatus::Partial);

        let forged = json.replace("\"Partial\"", "\"Paid\"");
        assert_ne!(forged, json);
        assert!(serde_json::from_str::<Quote>(&forged).is_err());

        let bytes = bincode::serialize(&q).unwrap();
        assert_eq!(bincode::deserialize::<Quote>(&bytes).unwrap(), q);
    }

    #[test]
    fn deserialize_rejects_inverted_range() {
        let ok: DateRange =
            serde_json::from_str(r#"{"start":"2024-06-10","end":"2024-06-12"}"#).unwrap();
        assert_eq!(ok, range("2024-06-10", "2024-06-12"));
        let bad = serde_json::from_str::<DateRange>(r#"{"start":"2024-06-12","end":"2024-06-10"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_become(Confirmed));
        assert!(Pending.can_become(Cancelled));
        assert!(Confirmed.can_become(Ongoing));
        assert!(Confirmed.can_become(Cancelled));
        assert!(Ongoing.can_become(Completed));
        assert!(!Ongoing.can_become(Cancelled));
        assert!(!Pending.can_become(Ongoing));
        for next in BookingStatus::ALL {
            assert!(!Completed.can_become(next));
            assert!(!Cancelled.can_become(next));
        }
    }

    #[test]
    fn only_cancelled_frees_the_vehicle() {
        for status in BookingStatus::ALL {
            assert_eq!(status.blocks_availability(), status != BookingStatus::Cancelled);
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!(" ONGOING ".parse::<BookingStatus>().unwrap(), BookingStatus::Ongoing);
        assert!("archived".parse::<BookingStatus>().is_err());
        assert_eq!("suv".parse::<VehicleType>().unwrap(), VehicleType::Suv);
    }

    #[test]
    fn payment_status_from_amounts() {
        assert_eq!(PaymentStatus::from_amounts(0, 0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(50, 0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(50, 250), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_amounts(0, 300), PaymentStatus::Unpaid);
    }

    #[test]
    fn vehicle_code() {
        let mut v = vehicle(100);
        assert_eq!(v.code(), "1234");
        v.plate = String::new();
        assert_eq!(v.code(), "HiA");
    }

    #[test]
    fn bookings_kept_sorted_by_start() {
        let v = vehicle(100);
        let mut vs = VehicleState::new(v.clone());
        let late = booking(v.id, "2024-06-20", "2024-06-21", BookingStatus::Pending);
        let early = booking(v.id, "2024-06-01", "2024-06-02", BookingStatus::Pending);
        let tie = booking(v.id, "2024-06-20", "2024-06-25", BookingStatus::Pending);
        vs.insert_booking(late.clone());
        vs.insert_booking(early.clone());
        vs.insert_booking(tie.clone());
        let ids: Vec<_> = vs.bookings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![early.id, late.id, tie.id]);

        assert_eq!(vs.remove_booking(late.id), Some(late));
        assert_eq!(vs.bookings.len(), 2);
        assert!(vs.remove_booking(Ulid::new()).is_none());
    }

    #[test]
    fn overlapping_bookings_window() {
        let v = vehicle(100);
        let mut vs = VehicleState::new(v.clone());
        let past = booking(v.id, "2024-05-01", "2024-05-03", BookingStatus::Completed);
        let spanning = booking(v.id, "2024-05-30", "2024-06-02", BookingStatus::Confirmed);
        let future = booking(v.id, "2024-07-01", "2024-07-03", BookingStatus::Pending);
        for b in [&past, &spanning, &future] {
            vs.insert_booking(b.clone());
        }
        let hits: Vec<_> = vs
            .overlapping_bookings(&range("2024-06-01", "2024-06-30"))
            .map(|b| b.id)
            .collect();
        assert_eq!(hits, vec![spanning.id]);

        // Query ending on a booking's start day still hits it
        let edge: Vec<_> = vs
            .overlapping_bookings(&range("2024-06-25", "2024-07-01"))
            .map(|b| b.id)
            .collect();
        assert_eq!(edge, vec![future.id]);
    }

    #[test]
    fn overlapping_blocks_window() {
        let v = vehicle(100);
        let mut vs = VehicleState::new(v.clone());
        let blk = block(v.id, "2024-06-05", "2024-06-06");
        vs.insert_block(blk.clone());
        assert_eq!(vs.overlapping_blocks(&range("2024-06-06", "2024-06-09")).count(), 1);
        assert_eq!(vs.overlapping_blocks(&range("2024-06-07", "2024-06-09")).count(), 0);
        assert_eq!(vs.remove_block(blk.id), Some(blk));
    }

    #[test]
    fn event_vehicle_id() {
        let v = vehicle(100);
        let b = booking(v.id, "2024-06-01", "2024-06-02", BookingStatus::Pending);
        assert_eq!(Event::VehicleAdded { vehicle: v.clone() }.vehicle_id(), v.id);
        assert_eq!(Event::BookingCreated { booking: b.clone() }.vehicle_id(), v.id);
        assert_eq!(
            Event::BookingStatusChanged {
                id: b.id,
                vehicle_id: v.id,
                status: BookingStatus::Confirmed,
            }
            .vehicle_id(),
            v.id
        );
    }
}
