//! Value objects for the trip domain.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to a computed fare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FareId(Uuid);

impl FareId {
    /// Creates a new random fare ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a fare ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FareId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a payment held by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random payment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a payment ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of the payment attached to a completed trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Payment is pending settlement.
    Pending,

    /// Payment settled successfully.
    Captured,

    /// Payment was declined or reversed.
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 500 = 5.00 in the tenant currency)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents.abs() % 100)
    }
}

/// Who initiated a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelActor {
    /// The passenger cancelled the trip.
    Passenger,

    /// The assigned (or candidate) driver cancelled.
    Driver,
}

impl std::fmt::Display for CancelActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelActor::Passenger => "Passenger",
            CancelActor::Driver => "Driver",
        };
        write!(f, "{}", s)
    }
}

/// The outcome of the cancellation fee policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationFee {
    /// The fee amount. Zero when `free` is true.
    pub amount: Money,

    /// True when no fee is charged.
    pub free: bool,

    /// Why this fee (or waiver) applies.
    pub reason: String,
}

impl CancellationFee {
    /// A waived fee with the given reason.
    pub fn waived(reason: impl Into<String>) -> Self {
        Self {
            amount: Money::zero(),
            free: true,
            reason: reason.into(),
        }
    }

    /// A charged fee with the given amount and reason.
    pub fn charged(amount: Money, reason: impl Into<String>) -> Self {
        Self {
            amount,
            free: false,
            reason: reason.into(),
        }
    }
}
