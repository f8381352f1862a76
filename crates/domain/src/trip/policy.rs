//! Cancellation fee policy.

use chrono::{DateTime, Duration, Utc};

use super::{CancelActor, CancellationFee, Money, Trip, TripStatus};

/// Free cancellation window after the request, in seconds, while still
/// `Requested`.
pub const REQUESTED_FREE_WINDOW_SECS: i64 = 5 * 60;

/// Fee charged for a late passenger cancellation of a `Requested` trip.
pub const REQUESTED_CANCELLATION_FEE: Money = Money::from_cents(500);

/// Free cancellation window after driver assignment, in seconds.
pub const ASSIGNED_FREE_WINDOW_SECS: i64 = 2 * 60;

/// Fee charged for a late passenger cancellation after assignment.
pub const ASSIGNED_CANCELLATION_FEE: Money = Money::from_cents(800);

/// Computes the cancellation fee for a trip.
///
/// Pure function of trip state and timing; it never mutates the trip and
/// performs no I/O. Driver-initiated cancellations are always free. For
/// passenger cancellations the fee depends on how long after the request
/// (status `Requested`) or the assignment (status `DriverAssigned`) the
/// cancellation arrives. Any other status is not a billable cancellation
/// path.
pub fn calculate_fee(trip: &Trip, actor: CancelActor, cancelled_at: DateTime<Utc>) -> CancellationFee {
    if actor == CancelActor::Driver {
        return CancellationFee::waived("driver cancellation");
    }

    match trip.status() {
        TripStatus::Requested => {
            let elapsed = cancelled_at - trip.requested_at();
            if elapsed < Duration::seconds(REQUESTED_FREE_WINDOW_SECS) {
                CancellationFee::waived("within free window after request")
            } else {
                CancellationFee::charged(
                    REQUESTED_CANCELLATION_FEE,
                    "late cancellation after request",
                )
            }
        }
        TripStatus::DriverAssigned => {
            // Fall back to the request time when the assignment timestamp
            // is missing on an older row.
            let anchor = trip.assigned_at().unwrap_or_else(|| trip.requested_at());
            let elapsed = cancelled_at - anchor;
            if elapsed < Duration::seconds(ASSIGNED_FREE_WINDOW_SECS) {
                CancellationFee::waived("within free window after assignment")
            } else {
                CancellationFee::charged(
                    ASSIGNED_CANCELLATION_FEE,
                    "late cancellation after assignment",
                )
            }
        }
        _ => CancellationFee::waived("not a billable cancellation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContext;
    use common::{DriverId, PassengerId, TenantId, TripId, Version};

    use crate::trip::{GeoPoint, TripRecord};

    fn requested_trip(requested_at: DateTime<Utc>) -> Trip {
        let mut ctx = EventContext::new();
        Trip::request(
            TripId::new(),
            TenantId::new(),
            PassengerId::new(),
            GeoPoint::new(52.5, 13.4),
            GeoPoint::new(52.6, 13.5),
            requested_at,
            &mut ctx,
        )
    }

    fn assigned_trip(requested_at: DateTime<Utc>, assigned_at: DateTime<Utc>) -> Trip {
        let mut ctx = EventContext::new();
        let mut trip = requested_trip(requested_at);
        trip.assign_driver(DriverId::new(), assigned_at, &mut ctx)
            .unwrap();
        trip
    }

    #[test]
    fn requested_cancel_within_five_minutes_is_free() {
        let t0 = Utc::now();
        let trip = requested_trip(t0);

        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(3));
        assert!(fee.free);
        assert!(fee.amount.is_zero());
    }

    #[test]
    fn requested_cancel_after_five_minutes_charges_five() {
        let t0 = Utc::now();
        let trip = requested_trip(t0);

        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(6));
        assert!(!fee.free);
        assert_eq!(fee.amount.cents(), 500);
    }

    #[test]
    fn assigned_cancel_within_two_minutes_is_free() {
        let t0 = Utc::now();
        let trip = assigned_trip(t0, t0 + Duration::minutes(1));

        // 1m30s after assignment
        let fee = calculate_fee(
            &trip,
            CancelActor::Passenger,
            t0 + Duration::minutes(2) + Duration::seconds(30),
        );
        assert!(fee.free);
    }

    #[test]
    fn assigned_cancel_after_two_minutes_charges_eight() {
        let t0 = Utc::now();
        let trip = assigned_trip(t0, t0 + Duration::minutes(1));

        // 3m after assignment
        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(4));
        assert!(!fee.free);
        assert_eq!(fee.amount.cents(), 800);
    }

    #[test]
    fn missing_assignment_timestamp_anchors_window_on_request_time() {
        // Older rows can carry an assigned driver without the timestamp.
        let t0 = Utc::now();
        let trip = Trip::from_record(TripRecord {
            id: TripId::new(),
            tenant_id: TenantId::new(),
            passenger_id: PassengerId::new(),
            driver_id: Some(DriverId::new()),
            origin: GeoPoint::new(52.5, 13.4),
            destination: GeoPoint::new(52.6, 13.5),
            status: TripStatus::DriverAssigned,
            requested_at: t0,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            fare_id: None,
            payment_id: None,
            payment_status: None,
            version: Version::new(1),
        });

        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(1));
        assert!(fee.free);

        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(3));
        assert!(!fee.free);
        assert_eq!(fee.amount.cents(), 800);
    }

    #[test]
    fn driver_cancellation_is_always_free() {
        let t0 = Utc::now();
        let trip = assigned_trip(t0, t0 + Duration::minutes(1));

        let fee = calculate_fee(&trip, CancelActor::Driver, t0 + Duration::hours(2));
        assert!(fee.free);
        assert_eq!(fee.reason, "driver cancellation");
    }

    #[test]
    fn exact_window_boundary_charges() {
        let t0 = Utc::now();
        let trip = requested_trip(t0);

        // The window is strict: exactly five minutes is no longer free.
        let fee = calculate_fee(&trip, CancelActor::Passenger, t0 + Duration::minutes(5));
        assert!(!fee.free);
    }
}
