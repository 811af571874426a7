mod common;

use common::{new_ride, Harness, DISPATCH_TIMEOUT};
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use ride_dispatch::models::{Gender, RidePreferences, RideStatus};
use ride_dispatch::utils::errors::AppError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acceptance_has_single_winner() {
    let harness = Harness::new();
    let ride = harness.booked_ride(Uuid::new_v4()).await;

    let mut drivers = Vec::new();
    for _ in 0..8 {
        drivers.push(harness.add_driver(None).await);
    }

    let attempts = drivers.iter().map(|driver_id| {
        let dispatch = harness.dispatch.clone();
        let (ride_id, driver_id) = (ride.id, *driver_id);
        tokio::spawn(async move { (driver_id, dispatch.accept_ride(ride_id, driver_id).await) })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<Uuid> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(winners.len(), 1);

    let losers = results.iter().filter(|(_, r)| r.is_err());
    for (_, result) in losers {
        assert!(matches!(result, Err(AppError::RideNoLongerAvailable)));
    }

    let stored = harness.ride(ride.id).await;
    assert_eq!(stored.status, RideStatus::Accepted);
    assert_eq!(stored.driver_id, Some(winners[0]));
    assert!(stored.vehicle_id.is_some());
}

#[tokio::test]
async fn test_two_drivers_race_for_one_ride() {
    let harness = Harness::with_signal_listener();
    let rider_id = Uuid::new_v4();
    let d1 = harness.add_driver(None).await;
    let d2 = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;

    let mut d1_client = harness.client(d1).await;
    let mut d2_client = harness.client(d2).await;

    let outcome = harness.dispatch.request_ride(ride.id).await.unwrap();
    assert_eq!(outcome.candidates.len(), 2);
    d1_client.next_event("new-ride-request").await;
    d2_client.next_event("new-ride-request").await;

    let accept = |driver_id: Uuid| json!({
        "event": "accept-a-ride",
        "data": { "rideId": ride.id, "driverId": driver_id }
    });
    let (r1, r2) = tokio::join!(
        harness.send(&d1_client, accept(d1)),
        harness.send(&d2_client, accept(d2)),
    );

    let statuses = [r1.data.status, r2.data.status];
    let accepted = statuses
        .iter()
        .filter(|s| **s == ride_dispatch::dto::events::EnvelopeStatus::Success)
        .count();
    assert_eq!(accepted, 1);

    let (loser_reply, mut loser_client, winner) = if r1.data.code.is_some() {
        (r1, d1_client, d2)
    } else {
        (r2, d2_client, d1)
    };
    assert_eq!(loser_reply.data.object_type, "accept-a-ride");
    assert_eq!(loser_reply.data.code.as_deref(), Some("RIDE_NO_LONGER_AVAILABLE"));

    let notice = loser_client.next_event("ride-superseded").await;
    assert_eq!(notice.data.data["rideId"], json!(ride.id));

    assert_eq!(harness.ride(ride.id).await.driver_id, Some(winner));
    assert!(!harness.dispatch.timers().is_armed(ride.id).await);
}

#[tokio::test]
async fn test_accept_without_vehicle_leaves_ride_untouched() {
    let harness = Harness::new();
    let driver_id = harness.add_driver_without_vehicle(None).await;
    let ride = harness.booked_ride(Uuid::new_v4()).await;

    let result = harness.dispatch.accept_ride(ride.id, driver_id).await;

    assert!(matches!(result, Err(AppError::NoVehicleRegistered)));
    let stored = harness.ride(ride.id).await;
    assert_eq!(stored.status, RideStatus::Booked);
    assert_eq!(stored.driver_id, None);
}

#[tokio::test]
async fn test_driver_with_ride_in_progress_cannot_accept_another() {
    let harness = Harness::new();
    let (_, driver_id) = harness.accepted_ride().await;
    let second = harness.booked_ride(Uuid::new_v4()).await;

    let result = harness.dispatch.accept_ride(second.id, driver_id).await;

    assert!(matches!(result, Err(AppError::RideInProgressConflict)));
    assert_eq!(harness.ride(second.id).await.status, RideStatus::Booked);
}

#[tokio::test]
async fn test_accept_unknown_ride_is_not_found() {
    let harness = Harness::new();
    let driver_id = harness.add_driver(None).await;

    let result = harness.dispatch.accept_ride(Uuid::new_v4(), driver_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_request_without_drivers_reports_no_drivers_available() {
    let harness = Harness::new();
    let rider_id = Uuid::new_v4();
    let ride = harness.booked_ride(rider_id).await;
    let mut rider = harness.client(rider_id).await;

    let outcome = harness.dispatch.request_ride(ride.id).await.unwrap();

    assert!(outcome.candidates.is_empty());
    let types: Vec<String> = rider
        .drain()
        .into_iter()
        .map(|m| m.data.object_type)
        .collect();
    assert_eq!(types, vec!["request-a-ride", "no-drivers-available"]);
    assert!(!harness.dispatch.timers().is_armed(ride.id).await);
}

#[tokio::test]
async fn test_request_requires_booked_ride() {
    let harness = Harness::new();
    let (ride, _) = harness.accepted_ride().await;

    let result = harness.dispatch.request_ride(ride.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_request_broadcasts_and_confirms_to_rider() {
    let harness = Harness::new();
    let rider_id = Uuid::new_v4();
    let driver_id = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;
    let mut rider = harness.client(rider_id).await;
    let mut driver = harness.client(driver_id).await;

    harness.dispatch.request_ride(ride.id).await.unwrap();

    let offer = driver.next_event("new-ride-request").await;
    assert_eq!(offer.data.data["id"], json!(ride.id));
    let types: Vec<String> = rider
        .drain()
        .into_iter()
        .map(|m| m.data.object_type)
        .collect();
    assert_eq!(types, vec!["request-a-ride", "connecting-drivers"]);
    assert!(harness.dispatch.timers().is_armed(ride.id).await);
}

#[tokio::test]
async fn test_gender_preference_limits_candidates() {
    let harness = Harness::new();
    let female = harness.add_driver(Some(Gender::Female)).await;
    let _male = harness.add_driver(Some(Gender::Male)).await;
    let _unknown = harness.add_driver(None).await;

    let mut request = new_ride(Uuid::new_v4());
    request.preferences = RidePreferences {
        driver_gender: Some(Gender::Female),
    };
    let ride = harness.booked_ride_with(request).await;

    let outcome = harness.dispatch.request_ride(ride.id).await.unwrap();
    assert_eq!(outcome.candidates, vec![female]);
}

#[tokio::test(start_paused = true)]
async fn test_expired_dispatch_keeps_ride_booked_and_can_be_retried() {
    let harness = Harness::with_signal_listener();
    let rider_id = Uuid::new_v4();
    let driver_id = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;
    let mut rider = harness.client(rider_id).await;
    let mut driver = harness.client(driver_id).await;

    harness.dispatch.request_ride(ride.id).await.unwrap();
    driver.next_event("new-ride-request").await;

    tokio::time::sleep(DISPATCH_TIMEOUT + Duration::from_secs(1)).await;

    let expired = rider.next_event("ride-expired").await;
    assert_eq!(expired.data.object_type, "ride-expired");
    driver.next_event("ride-expired").await;
    assert_eq!(harness.ride(ride.id).await.status, RideStatus::Booked);
    assert!(!harness.dispatch.timers().is_armed(ride.id).await);

    // Reintento sobre el mismo viaje
    let retry = harness.dispatch.request_ride(ride.id).await.unwrap();
    assert_eq!(retry.candidates, vec![driver_id]);
    driver.next_event("new-ride-request").await;
}

#[tokio::test(start_paused = true)]
async fn test_acceptance_suppresses_expiry() {
    let harness = Harness::with_signal_listener();
    let rider_id = Uuid::new_v4();
    let driver_id = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;
    let mut rider = harness.client(rider_id).await;

    harness.dispatch.request_ride(ride.id).await.unwrap();
    harness.dispatch.accept_ride(ride.id, driver_id).await.unwrap();
    rider.next_event("user-ride-accepted").await;

    tokio::time::sleep(DISPATCH_TIMEOUT * 3).await;

    assert!(!rider.drain_events().contains(&"ride-expired".to_string()));
    assert!(!harness.dispatch.timers().is_armed(ride.id).await);
}

#[tokio::test]
async fn test_acceptance_notifies_both_parties_with_vehicle() {
    let harness = Harness::new();
    let rider_id = Uuid::new_v4();
    let driver_id = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;
    let mut rider = harness.client(rider_id).await;
    let mut driver = harness.client(driver_id).await;

    harness.dispatch.accept_ride(ride.id, driver_id).await.unwrap();

    let to_driver = driver.next_event("driver-ride-accepted").await;
    assert_eq!(to_driver.data.data["driverId"], json!(driver_id));
    let to_rider = rider.next_event("user-ride-accepted").await;
    assert_eq!(to_rider.data.data["vehicle"]["ownerId"], json!(driver_id));
    assert_eq!(to_rider.data.data["ride"]["status"], "accepted");
}

#[tokio::test]
async fn test_cancelling_booked_ride_notifies_candidates() {
    let harness = Harness::with_signal_listener();
    let rider_id = Uuid::new_v4();
    let driver_id = harness.add_driver(None).await;
    let ride = harness.booked_ride(rider_id).await;
    let mut driver = harness.client(driver_id).await;

    harness.dispatch.request_ride(ride.id).await.unwrap();
    driver.next_event("new-ride-request").await;

    harness
        .lifecycle
        .cancel(ride_dispatch::services::lifecycle_service::CancelRequest {
            ride_id: ride.id,
            canceller_id: rider_id,
            reason: Some("Cambio de planes".to_string()),
            description: None,
        })
        .await
        .unwrap();

    let notice = driver.next_event("ride-cancelled-by-passenger").await;
    assert_eq!(notice.data.data["rideId"], json!(ride.id));
}
