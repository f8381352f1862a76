//! Driver assignment under contention.

use std::sync::Arc;

use chrono::Utc;
use common::{DriverId, TripId};
use domain::{EventContext, Trip};
use outbox::{StoreError, TraceContext, TripStore, drain_to_records};

use crate::drivers::{DriverAvailabilityQuery, DriverStore};
use crate::error::{Result, RideError};

/// Arbitrates the assignment race.
///
/// Several drivers can accept the same `Requested` trip at once. Each
/// acceptance reserves its driver (marks them busy), then races on the
/// trip row's concurrency token. Exactly one save wins; every loser gets
/// its driver reservation reverted and a [`RideError::AlreadyAssigned`].
///
/// The reservation-then-race order leaves a short window in which a losing
/// driver is busy with no trip. The compensating revert closes it; a
/// worker that dies inside the window leaks at most one busy driver, which
/// the next availability sweep reclaims.
pub struct AssignmentCoordinator {
    trips: Arc<dyn TripStore>,
    drivers: Arc<dyn DriverStore>,
    availability: Arc<dyn DriverAvailabilityQuery>,
}

impl AssignmentCoordinator {
    /// Creates a coordinator over the given stores and availability read.
    pub fn new(
        trips: Arc<dyn TripStore>,
        drivers: Arc<dyn DriverStore>,
        availability: Arc<dyn DriverAvailabilityQuery>,
    ) -> Self {
        Self {
            trips,
            drivers,
            availability,
        }
    }

    /// Attempts to assign `driver_id` to `trip_id`.
    ///
    /// Returns the assigned trip on the winning path. Losing the race
    /// yields [`RideError::AlreadyAssigned`]; an ineligible driver yields
    /// [`RideError::DriverUnavailable`] without touching the trip.
    #[tracing::instrument(skip(self, trace), fields(%trip_id, %driver_id))]
    pub async fn assign(
        &self,
        trip_id: TripId,
        driver_id: DriverId,
        trace: Option<&TraceContext>,
    ) -> Result<Trip> {
        let mut trip = self
            .trips
            .load(trip_id)
            .await?
            .ok_or(RideError::TripNotFound(trip_id))?;

        if trip.driver_id().is_some() {
            return Err(RideError::AlreadyAssigned(trip_id));
        }
        if !trip.status().can_assign_driver() {
            return Err(RideError::Trip(domain::TripError::InvalidStateTransition {
                current_status: trip.status(),
                action: "assign driver",
            }));
        }

        if let Some(reason) = self.availability.availability_problem(driver_id).await? {
            return Err(RideError::DriverUnavailable { driver_id, reason });
        }

        // Reserve the driver before racing on the trip row.
        let mut driver = self
            .drivers
            .load(driver_id)
            .await?
            .ok_or(RideError::DriverNotFound(driver_id))?;
        driver.mark_busy();
        self.drivers.save(&driver).await?;

        let mut events = EventContext::new();
        if let Err(e) = trip.assign_driver(driver_id, Utc::now(), &mut events) {
            self.revert_reservation(driver_id).await;
            return Err(e.into());
        }

        let records = match drain_to_records(&mut events, trace) {
            Ok(records) => records,
            Err(e) => {
                self.revert_reservation(driver_id).await;
                return Err(e.into());
            }
        };

        match self.trips.save(&trip, records).await {
            Ok(version) => {
                trip.set_version(version);
                tracing::info!("driver assigned");
                Ok(trip)
            }
            Err(StoreError::ConcurrencyConflict { .. }) => {
                self.revert_reservation(driver_id).await;
                // Look at what actually won before deciding what to tell
                // the caller: a concurrent cancel also moves the token.
                match self.trips.load(trip_id).await? {
                    Some(current) if current.driver_id().is_some() => {
                        tracing::info!("lost assignment race");
                        Err(RideError::AlreadyAssigned(trip_id))
                    }
                    Some(current) => Err(RideError::Trip(
                        domain::TripError::InvalidStateTransition {
                            current_status: current.status(),
                            action: "assign driver",
                        },
                    )),
                    None => Err(RideError::TripNotFound(trip_id)),
                }
            }
            Err(e) => {
                self.revert_reservation(driver_id).await;
                Err(e.into())
            }
        }
    }

    /// Best-effort compensating write: return a reserved driver to the
    /// available pool after a lost or aborted assignment.
    async fn revert_reservation(&self, driver_id: DriverId) {
        let result = async {
            if let Some(mut driver) = self.drivers.load(driver_id).await? {
                driver.mark_available();
                self.drivers.save(&driver).await?;
            }
            Ok::<_, RideError>(())
        }
        .await;

        if let Err(error) = result {
            tracing::error!(%driver_id, %error, "failed to revert driver reservation");
        }
    }
}
