//! Hard caps on tenant-supplied input. Every mutation checks these before
//! touching the WAL.

pub const MAX_TENANT_NAME_LEN: usize = 64;
pub const MAX_TENANTS: usize = 64;

pub const MAX_VEHICLES_PER_TENANT: usize = 10_000;
pub const MAX_BOOKINGS_PER_VEHICLE: usize = 20_000;
pub const MAX_BLOCKS_PER_VEHICLE: usize = 1_000;

/// Longest bookable or blockable range, counting both ends.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Names, phone numbers, plates, locations, block reasons.
pub const MAX_TEXT_LEN: usize = 256;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

pub const MAX_SEATS: u16 = 100;
