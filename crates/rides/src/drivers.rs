//! Driver persistence boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::DriverId;
use domain::Driver;
use tokio::sync::RwLock;

use crate::error::{Result, RideError};

/// Synchronous read used as the assignment precondition.
#[async_trait]
pub trait DriverAvailabilityQuery: Send + Sync {
    /// Returns the first reason the driver cannot take rides right now,
    /// or `None` if they qualify for assignment.
    async fn availability_problem(&self, id: DriverId) -> Result<Option<&'static str>>;
}

/// Storage boundary for driver availability state.
///
/// Assignment writes driver state in two places: the driver is reserved
/// (marked busy) before the trip row is raced, and reverted if the race is
/// lost. Implementations only need last-writer-wins semantics; the trip
/// row's concurrency token is what arbitrates the race.
#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Loads a driver by id.
    async fn load(&self, id: DriverId) -> Result<Option<Driver>>;

    /// Saves a driver's current state.
    async fn save(&self, driver: &Driver) -> Result<()>;
}

/// In-memory driver store.
#[derive(Clone, Default)]
pub struct InMemoryDriverStore {
    drivers: Arc<RwLock<HashMap<DriverId, Driver>>>,
}

impl InMemoryDriverStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a driver into the store.
    pub async fn put(&self, driver: Driver) {
        self.drivers.write().await.insert(driver.id(), driver);
    }
}

#[async_trait]
impl DriverAvailabilityQuery for InMemoryDriverStore {
    async fn availability_problem(&self, id: DriverId) -> Result<Option<&'static str>> {
        let driver = self
            .load(id)
            .await?
            .ok_or(RideError::DriverNotFound(id))?;
        Ok(driver.availability_problem())
    }
}

#[async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn load(&self, id: DriverId) -> Result<Option<Driver>> {
        Ok(self.drivers.read().await.get(&id).cloned())
    }

    async fn save(&self, driver: &Driver) -> Result<()> {
        self.drivers.write().await.insert(driver.id(), driver.clone());
        Ok(())
    }
}
