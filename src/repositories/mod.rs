//! Repositorios
//!
//! Interfaces de persistencia que consume el núcleo de despacho y sus
//! implementaciones (PostgreSQL y memoria). Toda mutación de `status`
//! pasa por `RideStore::find_one_and_update` con una guarda de estado.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CancellationRecord, Driver, Gender, NewRide, PaymentStatus, Ride, RideStatus, Tracking,
    Vehicle,
};
use crate::utils::errors::AppResult;

pub mod driver_repository;
pub mod memory;
pub mod ride_repository;
pub mod vehicle_repository;

pub use driver_repository::DriverRepository;
pub use memory::{InMemoryDriverDirectory, InMemoryRideStore, InMemoryVehicleDirectory};
pub use ride_repository::RideRepository;
pub use vehicle_repository::VehicleRepository;

/// Filtro de búsqueda de viajes
#[derive(Debug, Clone, Default)]
pub struct RideFilter {
    pub rider_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub statuses: Vec<RideStatus>,
}

impl RideFilter {
    pub fn by_rider(rider_id: Uuid) -> Self {
        Self {
            rider_id: Some(rider_id),
            ..Default::default()
        }
    }

    pub fn by_driver(driver_id: Uuid) -> Self {
        Self {
            driver_id: Some(driver_id),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[RideStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.rider_id.map_or(true, |id| ride.rider_id == id)
            && self.driver_id.map_or(true, |id| ride.driver_id == Some(id))
            && (self.statuses.is_empty() || self.statuses.contains(&ride.status))
    }
}

/// Condición que el documento debe cumplir para que la escritura se aplique
#[derive(Debug, Clone)]
pub struct RideGuard {
    pub statuses: Vec<RideStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub pickup_verified: Option<bool>,
    pub verification_code: Option<String>,
    /// Código emitido después de este instante
    pub code_issued_after: Option<DateTime<Utc>>,
    /// Código emitido en o antes de este instante (o sin fecha)
    pub code_issued_by: Option<DateTime<Utc>>,
}

impl RideGuard {
    pub fn status(expected: RideStatus) -> Self {
        Self::any_of(&[expected])
    }

    pub fn any_of(expected: &[RideStatus]) -> Self {
        Self {
            statuses: expected.to_vec(),
            payment_status: None,
            pickup_verified: None,
            verification_code: None,
            code_issued_after: None,
            code_issued_by: None,
        }
    }

    pub fn paid(mut self) -> Self {
        self.payment_status = Some(PaymentStatus::Paid);
        self
    }

    pub fn verified(mut self) -> Self {
        self.pickup_verified = Some(true);
        self
    }

    pub fn unverified(mut self) -> Self {
        self.pickup_verified = Some(false);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.verification_code = Some(code.into());
        self
    }

    pub fn code_issued_after(mut self, cutoff: DateTime<Utc>) -> Self {
        self.code_issued_after = Some(cutoff);
        self
    }

    pub fn code_issued_by(mut self, cutoff: DateTime<Utc>) -> Self {
        self.code_issued_by = Some(cutoff);
        self
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.statuses.contains(&ride.status)
            && self
                .payment_status
                .map_or(true, |p| ride.fare.payment_status == p)
            && self.pickup_verified.map_or(true, |v| ride.pickup_verified == v)
            && self
                .verification_code
                .as_ref()
                .map_or(true, |code| ride.verification_code.as_ref() == Some(code))
            && self.code_issued_after.map_or(true, |cutoff| {
                ride.verification_issued_at.map_or(false, |at| at > cutoff)
            })
            && self.code_issued_by.map_or(true, |cutoff| {
                ride.verification_issued_at.map_or(true, |at| at <= cutoff)
            })
    }
}

/// Campos a escribir en una actualización condicional
#[derive(Debug, Clone, Default)]
pub struct RideUpdate {
    pub status: Option<RideStatus>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub verification_code: Option<Option<String>>,
    pub verification_issued_at: Option<Option<DateTime<Utc>>>,
    pub pickup_verified: Option<bool>,
    pub payment_status: Option<PaymentStatus>,
    pub cancellation: Option<CancellationRecord>,
    pub tracking: Option<Tracking>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RideUpdate {
    pub fn status(status: RideStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Asignación de conductor: ambos ids se escriben juntos
    pub fn assignment(driver_id: Uuid, vehicle_id: Uuid) -> Self {
        Self {
            status: Some(RideStatus::Accepted),
            driver_id: Some(driver_id),
            vehicle_id: Some(vehicle_id),
            ..Default::default()
        }
    }

    /// Verdadero si la escritura deja a un conductor con un viaje en curso
    pub fn assigns_driver(&self) -> bool {
        self.driver_id.is_some() && self.status.map_or(false, |s| s.is_in_progress())
    }

    pub fn apply_to(&self, ride: &mut Ride) {
        if let Some(status) = self.status {
            ride.status = status;
        }
        if let Some(driver_id) = self.driver_id {
            ride.driver_id = Some(driver_id);
        }
        if let Some(vehicle_id) = self.vehicle_id {
            ride.vehicle_id = Some(vehicle_id);
        }
        if let Some(code) = &self.verification_code {
            ride.verification_code = code.clone();
        }
        if let Some(issued_at) = self.verification_issued_at {
            ride.verification_issued_at = issued_at;
        }
        if let Some(verified) = self.pickup_verified {
            ride.pickup_verified = verified;
        }
        if let Some(payment_status) = self.payment_status {
            ride.fare.payment_status = payment_status;
        }
        if let Some(cancellation) = &self.cancellation {
            ride.cancellation = Some(cancellation.clone());
        }
        if let Some(tracking) = &self.tracking {
            ride.tracking = Some(tracking.clone());
        }
        if let Some(started_at) = self.started_at {
            ride.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            ride.ended_at = Some(ended_at);
        }
    }
}

/// Almacén de viajes con escritura condicional atómica
#[async_trait]
pub trait RideStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Ride>>;

    async fn find_one(&self, filter: &RideFilter) -> AppResult<Option<Ride>>;

    /// Aplica `update` solo si el viaje cumple `guard`; `None` si la guarda falló
    async fn find_one_and_update(
        &self,
        id: Uuid,
        guard: &RideGuard,
        update: &RideUpdate,
    ) -> AppResult<Option<Ride>>;

    async fn create(&self, ride: NewRide) -> AppResult<Ride>;

    async fn delete_many(&self, filter: &RideFilter) -> AppResult<u64>;
}

/// Filtros de preferencia que el directorio sabe resolver
#[derive(Debug, Clone, Default)]
pub struct DriverQuery {
    pub gender: Option<Gender>,
}

#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn find_drivers(&self, query: &DriverQuery) -> AppResult<Vec<Driver>>;
}

#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn find_one_by_owner(&self, owner_id: Uuid) -> AppResult<Option<Vehicle>>;
}
