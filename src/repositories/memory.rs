//! Implementaciones en memoria
//!
//! Usadas en tests y con `STORE=memory`. Cada escritura condicional se
//! evalúa bajo el mismo lock de escritura, por lo que la guarda y la
//! escritura son atómicas dentro del proceso.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    DriverDirectory, DriverQuery, RideFilter, RideGuard, RideStore, RideUpdate, VehicleDirectory,
};
use crate::models::{Driver, NewRide, Ride, Vehicle};
use crate::utils::errors::{AppError, AppResult};

#[derive(Clone, Default)]
pub struct InMemoryRideStore {
    rides: Arc<RwLock<HashMap<Uuid, Ride>>>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta un documento tal cual (fixtures de tests)
    pub async fn insert(&self, ride: Ride) {
        self.rides.write().await.insert(ride.id, ride);
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Ride>> {
        Ok(self.rides.read().await.get(&id).cloned())
    }

    async fn find_one(&self, filter: &RideFilter) -> AppResult<Option<Ride>> {
        let rides = self.rides.read().await;
        Ok(rides
            .values()
            .filter(|r| filter.matches(r))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_one_and_update(
        &self,
        id: Uuid,
        guard: &RideGuard,
        update: &RideUpdate,
    ) -> AppResult<Option<Ride>> {
        let mut rides = self.rides.write().await;

        match rides.get(&id) {
            Some(ride) if guard.matches(ride) => {}
            _ => return Ok(None),
        }

        if update.assigns_driver() {
            let busy = rides.values().any(|r| {
                r.id != id && r.driver_id == update.driver_id && r.status.is_in_progress()
            });
            if busy {
                return Err(AppError::RideInProgressConflict);
            }
        }

        let ride = rides
            .get_mut(&id)
            .ok_or_else(|| AppError::Internal("ride vanished under write lock".to_string()))?;
        update.apply_to(ride);
        Ok(Some(ride.clone()))
    }

    async fn create(&self, new_ride: NewRide) -> AppResult<Ride> {
        let mut rides = self.rides.write().await;

        let rider_busy = rides
            .values()
            .any(|r| r.rider_id == new_ride.rider_id && r.status.is_active());
        if rider_busy {
            return Err(AppError::Conflict(
                "rider already has an active ride".to_string(),
            ));
        }

        let ride = new_ride.into_booked();
        rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn delete_many(&self, filter: &RideFilter) -> AppResult<u64> {
        let mut rides = self.rides.write().await;
        let before = rides.len();
        rides.retain(|_, r| !filter.matches(r));
        Ok((before - rides.len()) as u64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDriverDirectory {
    drivers: Arc<RwLock<Vec<Driver>>>,
}

impl InMemoryDriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, driver: Driver) {
        self.drivers.write().await.push(driver);
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn find_drivers(&self, query: &DriverQuery) -> AppResult<Vec<Driver>> {
        let drivers = self.drivers.read().await;
        Ok(drivers
            .iter()
            .filter(|d| query.gender.map_or(true, |g| d.gender == Some(g)))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryVehicleDirectory {
    vehicles: Arc<RwLock<HashMap<Uuid, Vehicle>>>,
}

impl InMemoryVehicleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, vehicle: Vehicle) {
        self.vehicles.write().await.insert(vehicle.owner_id, vehicle);
    }
}

#[async_trait]
impl VehicleDirectory for InMemoryVehicleDirectory {
    async fn find_one_by_owner(&self, owner_id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&owner_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Coordinates, FareRequest, Location, RidePreferences, RideStatus,
    };
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn new_ride(rider_id: Uuid) -> NewRide {
        NewRide {
            rider_id,
            pickup: Location {
                address: "Plaza Mayor".to_string(),
                coordinates: Coordinates::new(40.4154, -3.7074),
            },
            dropoff: Location {
                address: "Atocha".to_string(),
                coordinates: Coordinates::new(40.4066, -3.6892),
            },
            stops: vec![],
            total_distance: 2.1,
            fare: FareRequest {
                rider_amount: Decimal::new(900, 2),
                driver_amount: Decimal::new(700, 2),
            },
            preferences: RidePreferences::default(),
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn test_guard_mismatch_is_noop() {
        let store = InMemoryRideStore::new();
        let ride = store.create(new_ride(Uuid::new_v4())).await.unwrap();

        let result = store
            .find_one_and_update(
                ride.id,
                &RideGuard::status(RideStatus::Accepted),
                &RideUpdate::status(RideStatus::Arrived),
            )
            .await
            .unwrap();
        assert!(result.is_none());

        let unchanged = store.find_by_id(ride.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, RideStatus::Booked);
    }

    #[tokio::test]
    async fn test_code_age_guards() {
        let store = InMemoryRideStore::new();
        let mut ride = new_ride(Uuid::new_v4()).into_booked();
        let issued_at = Utc::now() - Duration::minutes(5);
        ride.status = RideStatus::Arrived;
        ride.verification_code = Some("4821".to_string());
        ride.verification_issued_at = Some(issued_at);
        store.insert(ride.clone()).await;

        let noop = RideUpdate::default();
        let fresh = RideGuard::status(RideStatus::Arrived).code_issued_after(issued_at);
        assert!(store
            .find_one_and_update(ride.id, &fresh, &noop)
            .await
            .unwrap()
            .is_none());

        let stale = RideGuard::status(RideStatus::Arrived).code_issued_by(issued_at);
        assert!(store
            .find_one_and_update(ride.id, &stale, &noop)
            .await
            .unwrap()
            .is_some());

        // Sin fecha de emisión cuenta como caducado
        let clear = RideUpdate {
            verification_issued_at: Some(None),
            ..Default::default()
        };
        store.find_one_and_update(ride.id, &stale, &clear).await.unwrap();
        let undated = RideGuard::status(RideStatus::Arrived).code_issued_by(Utc::now());
        assert!(store
            .find_one_and_update(ride.id, &undated, &noop)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_one_and_update(ride.id, &fresh, &noop)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_one_active_ride_per_rider() {
        let store = InMemoryRideStore::new();
        let rider = Uuid::new_v4();
        store.create(new_ride(rider)).await.unwrap();

        let second = store.create(new_ride(rider)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_driver_cannot_hold_two_rides() {
        let store = InMemoryRideStore::new();
        let driver = Uuid::new_v4();
        let vehicle = Uuid::new_v4();
        let first = store.create(new_ride(Uuid::new_v4())).await.unwrap();
        let second = store.create(new_ride(Uuid::new_v4())).await.unwrap();

        let guard = RideGuard::status(RideStatus::Booked);
        let update = RideUpdate::assignment(driver, vehicle);
        assert!(store
            .find_one_and_update(first.id, &guard, &update)
            .await
            .unwrap()
            .is_some());

        let conflict = store.find_one_and_update(second.id, &guard, &update).await;
        assert!(matches!(conflict, Err(AppError::RideInProgressConflict)));
        let still_booked = store.find_by_id(second.id).await.unwrap().unwrap();
        assert_eq!(still_booked.status, RideStatus::Booked);
    }

    #[tokio::test]
    async fn test_delete_many_by_filter() {
        let store = InMemoryRideStore::new();
        let rider = Uuid::new_v4();
        store.create(new_ride(rider)).await.unwrap();
        store.create(new_ride(Uuid::new_v4())).await.unwrap();

        let deleted = store.delete_many(&RideFilter::by_rider(rider)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store
            .find_one(&RideFilter::by_rider(rider))
            .await
            .unwrap()
            .is_none());
    }
}
