//! Difusión de solicitudes y resolución de la aceptación
//!
//! Convierte un viaje `booked` en como mucho un viaje `accepted`. La
//! aceptación es una única escritura condicional contra el almacén
//! (`status = booked`), por lo que solo un conductor puede ganar aunque
//! los intentos lleguen desde procesos distintos.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::DispatchContext;
use super::dispatch_timers::{DispatchTimers, ResolvedDispatch};
use super::eligibility::DriverEligibility;
use crate::dto::events::{names, object_types};
use crate::models::{Ride, RideStatus, Vehicle};
use crate::realtime::transport::DispatchSignal;
use crate::repositories::{RideFilter, RideGuard, RideUpdate};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::metrics;

/// Resultado de `request_ride`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub ride_id: Uuid,
    pub candidates: Vec<Uuid>,
    pub timeout_secs: u64,
}

/// Resultado de una aceptación ganada
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRide {
    pub ride: Ride,
    pub vehicle: Vehicle,
}

pub struct DispatchService {
    ctx: DispatchContext,
    eligibility: Arc<dyn DriverEligibility>,
    timers: DispatchTimers,
    timeout: Duration,
}

impl DispatchService {
    pub fn new(
        ctx: DispatchContext,
        eligibility: Arc<dyn DriverEligibility>,
        timeout: Duration,
    ) -> Self {
        Self {
            ctx,
            eligibility,
            timers: DispatchTimers::new(),
            timeout,
        }
    }

    pub fn timers(&self) -> &DispatchTimers {
        &self.timers
    }

    /// Difunde un viaje `booked` a los conductores elegibles y arma la expiración
    pub async fn request_ride(&self, ride_id: Uuid) -> AppResult<DispatchOutcome> {
        let ride = self
            .ctx
            .rides
            .find_by_id(ride_id)
            .await?
            .filter(|r| r.status == RideStatus::Booked)
            .ok_or_else(|| AppError::NotFound(format!("booked ride '{}' not found", ride_id)))?;

        metrics::RIDE_REQUESTS.inc();
        info!("🚕 Solicitud de viaje {} del pasajero {}", ride.id, ride.rider_id);

        self.ctx
            .emit_to_user(
                ride.rider_id,
                names::RESPONSE,
                object_types::REQUEST_RIDE,
                "Solicitud de viaje confirmada",
                &ride,
            )
            .await;

        let candidates = self.find_candidates(&ride).await?;
        if candidates.is_empty() {
            info!("🚫 Sin conductores disponibles para {}", ride.id);
            self.ctx
                .emit_to_user(
                    ride.rider_id,
                    names::RESPONSE,
                    object_types::NO_DRIVERS_AVAILABLE,
                    "No hay conductores disponibles",
                    json!({ "rideId": ride.id }),
                )
                .await;
            return Ok(DispatchOutcome {
                ride_id: ride.id,
                candidates,
                timeout_secs: 0,
            });
        }

        // Armar antes de difundir: una aceptación inmediata encuentra el temporizador
        self.arm_expiry(&ride, candidates.clone()).await;

        for driver_id in &candidates {
            self.ctx
                .emit_to_user(
                    *driver_id,
                    names::NEW_RIDE_REQUEST,
                    object_types::NEW_RIDE_REQUEST,
                    "Nueva solicitud de viaje",
                    &ride,
                )
                .await;
            metrics::RIDE_BROADCASTS.inc();
        }

        self.ctx
            .emit_to_user(
                ride.rider_id,
                names::RESPONSE,
                object_types::CONNECTING_DRIVERS,
                "Conectando con conductores",
                json!({ "rideId": ride.id, "drivers": candidates.len() }),
            )
            .await;

        debug!("📡 Viaje {} difundido a {} conductores", ride.id, candidates.len());
        Ok(DispatchOutcome {
            ride_id: ride.id,
            candidates,
            timeout_secs: self.timeout.as_secs(),
        })
    }

    async fn find_candidates(&self, ride: &Ride) -> AppResult<Vec<Uuid>> {
        let query = self.eligibility.query(ride);
        let drivers = self.ctx.drivers.find_drivers(&query).await?;

        Ok(drivers
            .iter()
            .filter(|d| self.eligibility.is_eligible(ride, d))
            .map(|d| d.id)
            .collect())
    }

    async fn arm_expiry(&self, ride: &Ride, candidates: Vec<Uuid>) {
        let ctx = self.ctx.clone();
        self.timers
            .arm(ride.id, ride.rider_id, candidates, self.timeout, move |expired| {
                expire_dispatch(ctx, expired)
            })
            .await;
    }

    /// Primer conductor en escribir gana; el resto recibe `RideNoLongerAvailable`
    pub async fn accept_ride(&self, ride_id: Uuid, driver_id: Uuid) -> AppResult<AcceptedRide> {
        let vehicle = self
            .ctx
            .vehicles
            .find_one_by_owner(driver_id)
            .await?
            .ok_or(AppError::NoVehicleRegistered)?;

        let busy = self
            .ctx
            .rides
            .find_one(&RideFilter::by_driver(driver_id).with_statuses(&RideStatus::IN_PROGRESS))
            .await?;
        if let Some(current) = busy {
            warn!(
                "⚠️ Conductor {} intentó aceptar {} con el viaje {} en curso",
                driver_id, ride_id, current.id
            );
            return Err(AppError::RideInProgressConflict);
        }

        let accepted = self
            .ctx
            .rides
            .find_one_and_update(
                ride_id,
                &RideGuard::status(RideStatus::Booked),
                &RideUpdate::assignment(driver_id, vehicle.id),
            )
            .await?;

        let ride = match accepted {
            Some(ride) => ride,
            None => {
                if self.ctx.rides.find_by_id(ride_id).await?.is_none() {
                    return Err(AppError::NotFound(format!("ride '{}' not found", ride_id)));
                }
                metrics::ACCEPTANCE_RACES_LOST.inc();
                debug!("🏁 Conductor {} perdió la carrera por {}", driver_id, ride_id);
                return Err(AppError::RideNoLongerAvailable);
            }
        };

        metrics::RIDE_ACCEPTANCES.inc();
        metrics::RIDE_TRANSITIONS
            .with_label_values(&[RideStatus::Accepted.as_str()])
            .inc();
        info!("✅ Viaje {} aceptado por {}", ride.id, driver_id);

        self.ctx
            .publish_signal(DispatchSignal::Accepted { ride_id, driver_id })
            .await;

        self.ctx
            .emit_to_user(
                driver_id,
                names::DRIVER_RIDE_ACCEPTED,
                object_types::DRIVER_RIDE_ACCEPTED,
                "Has aceptado el viaje",
                &ride,
            )
            .await;

        let result = AcceptedRide { ride, vehicle };
        self.ctx
            .emit_to_user(
                result.ride.rider_id,
                names::USER_RIDE_ACCEPTED,
                object_types::USER_RIDE_ACCEPTED,
                "Un conductor ha aceptado tu viaje",
                &result,
            )
            .await;
        self.ctx.notify(
            result.ride.rider_id,
            "Un conductor ha aceptado tu viaje",
            json!({ "rideId": ride_id, "driverId": driver_id }),
        );

        Ok(result)
    }

    /// Consume señales de resolución (locales o de otros procesos)
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut signals = service.ctx.transport.subscribe_signals();

        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => service.on_signal(signal).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ Listener de despacho saltó {} señales", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Desarma la expiración y avisa al resto de candidatos
    pub async fn on_signal(&self, signal: DispatchSignal) {
        let Some(resolved) = self.timers.disarm(signal.ride_id()).await else {
            return;
        };

        match signal {
            DispatchSignal::Accepted { ride_id, driver_id } => {
                for candidate in resolved.candidates.iter().filter(|id| **id != driver_id) {
                    self.ctx
                        .emit_to_user(
                            *candidate,
                            names::RIDE_SUPERSEDED,
                            object_types::RIDE_SUPERSEDED,
                            "Otro conductor aceptó el viaje",
                            json!({ "rideId": ride_id }),
                        )
                        .await;
                }
            }
            DispatchSignal::Cancelled {
                ride_id,
                cancelled_by,
            } => {
                let event = cancelled_by.event_name();
                for candidate in &resolved.candidates {
                    self.ctx
                        .emit_to_user(
                            *candidate,
                            event,
                            event,
                            "El viaje fue cancelado",
                            json!({ "rideId": ride_id }),
                        )
                        .await;
                }
            }
        }
    }
}

/// Expiración: si nadie aceptó, se avisa y el viaje sigue `booked`
async fn expire_dispatch(ctx: DispatchContext, expired: ResolvedDispatch) {
    let ride = match ctx.rides.find_by_id(expired.ride_id).await {
        Ok(Some(ride)) => ride,
        Ok(None) => return,
        Err(e) => {
            warn!("⚠️ No se pudo releer {} al expirar: {}", expired.ride_id, e);
            return;
        }
    };

    if ride.status != RideStatus::Booked {
        return;
    }

    metrics::RIDE_EXPIRATIONS.inc();
    info!("⌛ Nadie aceptó el viaje {}", ride.id);

    ctx.emit_to_user(
        ride.rider_id,
        names::RIDE_EXPIRED,
        object_types::RIDE_EXPIRED,
        "Ningún conductor aceptó el viaje",
        &ride,
    )
    .await;
    for driver_id in &expired.candidates {
        ctx.emit_to_user(
            *driver_id,
            names::RIDE_EXPIRED,
            object_types::RIDE_EXPIRED,
            "La solicitud de viaje ha expirado",
            json!({ "rideId": ride.id }),
        )
        .await;
    }
    ctx.notify(
        ride.rider_id,
        "Ningún conductor aceptó tu viaje",
        json!({ "rideId": ride.id }),
    );
}
