use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a trip aggregate.
    TripId
}

uuid_id! {
    /// Unique identifier for a driver.
    DriverId
}

uuid_id! {
    /// Unique identifier for a passenger.
    PassengerId
}

uuid_id! {
    /// Identifier of the tenant a trip belongs to.
    TenantId
}

uuid_id! {
    /// Untyped reference to the aggregate an outbox record concerns.
    ///
    /// Typed ids (`TripId` etc.) convert into this at the persistence
    /// boundary so the outbox table stays aggregate-agnostic.
    AggregateId
}

impl From<TripId> for AggregateId {
    fn from(id: TripId) -> Self {
        Self::from_uuid(id.as_uuid())
    }
}

impl From<DriverId> for AggregateId {
    fn from(id: DriverId) -> Self {
        Self::from_uuid(id.as_uuid())
    }
}

/// Optimistic concurrency token for a mutable aggregate row.
///
/// Starts at 0 for a row that has never been written and increments by 1
/// on every successful write. A writer that loaded version N may only
/// commit if the row is still at N; otherwise the write is a lost update
/// and must fail.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a row that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}
