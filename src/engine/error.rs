use ulid::Ulid;

use crate::model::{BookingStatus, Money, RangeError};

/// A quote input was negative, or a stored quote failed re-pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteError {
    NegativeRate(Money),
    NegativeDiscount(Money),
    NegativeDeposit(Money),
    /// A stored quote whose amounts do not follow from its days and rate.
    Inconsistent,
}

impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteError::NegativeRate(v) => write!(f, "invalid quote input: daily rate {v} is negative"),
            QuoteError::NegativeDiscount(v) => {
                write!(f, "invalid quote input: discount {v} is negative")
            }
            QuoteError::NegativeDeposit(v) => {
                write!(f, "invalid quote input: deposit {v} is negative")
            }
            QuoteError::Inconsistent => write!(f, "stored quote does not match its inputs"),
        }
    }
}

impl std::error::Error for QuoteError {}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Overlaps a non-cancelled booking.
    Conflict(Ulid),
    /// Overlaps an operator date block.
    Blocked(Ulid),
    InvalidRange(RangeError),
    InvalidQuote(QuoteError),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    InvalidInitialStatus(BookingStatus),
    BookingClosed(Ulid),
    VehicleUnavailable(Ulid),
    HasOpenBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::Blocked(id) => write!(f, "dates blocked by: {id}"),
            EngineError::InvalidRange(e) => write!(f, "{e}"),
            EngineError::InvalidQuote(e) => write!(f, "{e}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot move booking from {from} to {to}")
            }
            EngineError::InvalidInitialStatus(s) => {
                write!(f, "a booking cannot start as {s}")
            }
            EngineError::BookingClosed(id) => write!(f, "booking {id} is closed"),
            EngineError::VehicleUnavailable(id) => {
                write!(f, "vehicle {id} is not accepting bookings")
            }
            EngineError::HasOpenBookings(id) => {
                write!(f, "cannot remove vehicle {id}: has open bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RangeError> for EngineError {
    fn from(e: RangeError) -> Self {
        EngineError::InvalidRange(e)
    }
}

impl From<QuoteError> for EngineError {
    fn from(e: QuoteError) -> Self {
        EngineError::InvalidQuote(e)
    }
}
