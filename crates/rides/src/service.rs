//! Trip lifecycle operations.

use std::sync::Arc;

use chrono::Utc;
use common::{PassengerId, TenantId, TripId};
use domain::{
    CancelActor, CancellationFee, EventContext, FareId, GeoPoint, PaymentId, PaymentStatus, Trip,
};
use outbox::{TraceContext, TripStore, drain_to_records};

use crate::drivers::DriverStore;
use crate::error::{Result, RideError};

/// Drives the trip lifecycle end to end.
///
/// Each operation is one unit of work: load the trip, run the transition,
/// and persist the new state together with the events the transition
/// recorded. Failed transitions persist nothing.
pub struct TripService {
    trips: Arc<dyn TripStore>,
    drivers: Arc<dyn DriverStore>,
}

impl TripService {
    /// Creates a service over the given stores.
    pub fn new(trips: Arc<dyn TripStore>, drivers: Arc<dyn DriverStore>) -> Self {
        Self { trips, drivers }
    }

    /// Requests a new trip for a passenger.
    #[tracing::instrument(skip(self, trace), fields(%tenant_id, %passenger_id))]
    pub async fn request_trip(
        &self,
        tenant_id: TenantId,
        passenger_id: PassengerId,
        origin: GeoPoint,
        destination: GeoPoint,
        trace: Option<&TraceContext>,
    ) -> Result<Trip> {
        let mut events = EventContext::new();
        let mut trip = Trip::request(
            TripId::new(),
            tenant_id,
            passenger_id,
            origin,
            destination,
            Utc::now(),
            &mut events,
        );

        let records = drain_to_records(&mut events, trace)?;
        let version = self.trips.insert(&trip, records).await?;
        trip.set_version(version);

        tracing::info!(trip_id = %trip.id(), "trip requested");
        Ok(trip)
    }

    /// Starts an assigned trip (passenger on board).
    #[tracing::instrument(skip(self, trace), fields(%trip_id))]
    pub async fn start_trip(
        &self,
        trip_id: TripId,
        trace: Option<&TraceContext>,
    ) -> Result<Trip> {
        let mut trip = self.load(trip_id).await?;

        let mut events = EventContext::new();
        trip.start(Utc::now(), &mut events)?;

        let records = drain_to_records(&mut events, trace)?;
        let version = self.trips.save(&trip, records).await?;
        trip.set_version(version);

        tracing::info!("trip started");
        Ok(trip)
    }

    /// Completes an in-progress trip with its fare and payment references.
    #[tracing::instrument(skip(self, trace), fields(%trip_id))]
    pub async fn complete_trip(
        &self,
        trip_id: TripId,
        fare_id: FareId,
        payment_id: PaymentId,
        payment_status: PaymentStatus,
        trace: Option<&TraceContext>,
    ) -> Result<Trip> {
        let mut trip = self.load(trip_id).await?;

        let mut events = EventContext::new();
        trip.complete(fare_id, payment_id, payment_status, Utc::now(), &mut events)?;

        let records = drain_to_records(&mut events, trace)?;
        let version = self.trips.save(&trip, records).await?;
        trip.set_version(version);

        // The trip is over; the driver goes back into the pool.
        if let Some(driver_id) = trip.driver_id() {
            self.release_driver(driver_id).await;
        }

        tracing::info!("trip completed");
        Ok(trip)
    }

    /// Cancels a trip, returning the fee the policy decided on.
    ///
    /// A driver assigned before the cancellation is released back to the
    /// available pool once the cancellation has been persisted.
    #[tracing::instrument(skip(self, trace), fields(%trip_id, %actor))]
    pub async fn cancel_trip(
        &self,
        trip_id: TripId,
        actor: CancelActor,
        reason: &str,
        trace: Option<&TraceContext>,
    ) -> Result<(Trip, CancellationFee)> {
        let mut trip = self.load(trip_id).await?;
        let assigned_driver = trip.driver_id();

        let mut events = EventContext::new();
        let fee = trip.cancel(actor, reason, Utc::now(), &mut events)?;

        let records = drain_to_records(&mut events, trace)?;
        let version = self.trips.save(&trip, records).await?;
        trip.set_version(version);

        if let Some(driver_id) = assigned_driver {
            self.release_driver(driver_id).await;
        }

        tracing::info!(free = fee.free, fee = %fee.amount, "trip cancelled");
        Ok((trip, fee))
    }

    async fn load(&self, trip_id: TripId) -> Result<Trip> {
        self.trips
            .load(trip_id)
            .await?
            .ok_or(RideError::TripNotFound(trip_id))
    }

    /// Best-effort: the cancellation or completion itself is already
    /// durable, a failed release only delays the driver's return.
    async fn release_driver(&self, driver_id: common::DriverId) {
        let result = async {
            if let Some(mut driver) = self.drivers.load(driver_id).await? {
                driver.mark_available();
                self.drivers.save(&driver).await?;
            }
            Ok::<_, RideError>(())
        }
        .await;

        if let Err(error) = result {
            tracing::error!(%driver_id, %error, "failed to release driver");
        }
    }
}
