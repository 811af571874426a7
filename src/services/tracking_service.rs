//! Seguimiento del conductor
//!
//! Posición y ETA durante el viaje activo, republicadas a ambas partes.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::context::DispatchContext;
use super::geo_service::{EtaCalculator, EtaEstimate};
use crate::dto::events::{names, object_types};
use crate::models::{Coordinates, Ride, RideStatus, Tracking};
use crate::repositories::{RideGuard, RideUpdate};
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EtaTarget {
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaUpdate {
    pub ride_id: Uuid,
    pub target: EtaTarget,
    pub driver_coordinates: Coordinates,
    #[serde(flatten)]
    pub estimate: EtaEstimate,
}

pub struct TrackingService {
    ctx: DispatchContext,
    calculator: EtaCalculator,
}

impl TrackingService {
    pub fn new(ctx: DispatchContext, calculator: EtaCalculator) -> Self {
        Self { ctx, calculator }
    }

    /// Persiste posición y ETA; válido en accepted/arrived/started
    pub async fn update_driver_location(
        &self,
        ride_id: Uuid,
        coordinates: Option<Coordinates>,
        eta_minutes: Option<i64>,
    ) -> AppResult<Ride> {
        let coordinates =
            coordinates.ok_or_else(|| AppError::MissingLocation("coordinates".to_string()))?;

        let update = RideUpdate {
            tracking: Some(Tracking {
                coordinates,
                eta_minutes,
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };

        let ride = match self
            .ctx
            .rides
            .find_one_and_update(ride_id, &RideGuard::any_of(&RideStatus::IN_PROGRESS), &update)
            .await?
        {
            Some(ride) => ride,
            None => {
                return Err(self
                    .ctx
                    .transition_failure(ride_id, "track location for")
                    .await)
            }
        };

        debug!("🛰️ Posición actualizada para el viaje {}", ride.id);
        self.ctx
            .emit_to_parties(
                &ride,
                names::LOCATION_UPDATED,
                object_types::UPDATE_LOCATION,
                "Ubicación del conductor actualizada",
            )
            .await;

        Ok(ride)
    }

    pub async fn eta_to_pickup(
        &self,
        ride_id: Uuid,
        driver_coordinates: Option<Coordinates>,
    ) -> AppResult<EtaUpdate> {
        self.eta_to(ride_id, driver_coordinates, EtaTarget::Pickup)
            .await
    }

    pub async fn eta_to_dropoff(
        &self,
        ride_id: Uuid,
        driver_coordinates: Option<Coordinates>,
    ) -> AppResult<EtaUpdate> {
        self.eta_to(ride_id, driver_coordinates, EtaTarget::Dropoff)
            .await
    }

    /// Calcula la ETA, la guarda como última conocida y la envía a ambas partes
    async fn eta_to(
        &self,
        ride_id: Uuid,
        driver_coordinates: Option<Coordinates>,
        target: EtaTarget,
    ) -> AppResult<EtaUpdate> {
        let from = driver_coordinates
            .ok_or_else(|| AppError::MissingLocation("driverCoordinates".to_string()))?;

        let ride = self.ctx.load_ride(ride_id).await?;
        ride.driver_id.ok_or(AppError::NoDriverAssigned)?;

        let to = match target {
            EtaTarget::Pickup => ride.pickup.coordinates,
            EtaTarget::Dropoff => ride.dropoff.coordinates,
        };
        let estimate = self.calculator.estimate(from, to);

        let update = RideUpdate {
            tracking: Some(Tracking {
                coordinates: from,
                eta_minutes: Some(estimate.minutes),
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };
        let ride = match self
            .ctx
            .rides
            .find_one_and_update(ride_id, &RideGuard::any_of(&RideStatus::IN_PROGRESS), &update)
            .await?
        {
            Some(ride) => ride,
            None => {
                return Err(self
                    .ctx
                    .transition_failure(ride_id, "estimate arrival for")
                    .await)
            }
        };
        let driver_id = ride.driver_id.ok_or(AppError::NoDriverAssigned)?;

        let eta = EtaUpdate {
            ride_id,
            target,
            driver_coordinates: from,
            estimate,
        };

        let object_type = match target {
            EtaTarget::Pickup => object_types::ETA_TO_PICKUP,
            EtaTarget::Dropoff => object_types::ETA_TO_DROPOFF,
        };
        for user in [ride.rider_id, driver_id] {
            self.ctx
                .emit_to_user(user, names::ETA_UPDATED, object_type, &eta.estimate.eta, &eta)
                .await;
        }

        Ok(eta)
    }
}
