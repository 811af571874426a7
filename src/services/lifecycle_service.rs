//! Máquina de estados del viaje
//!
//! ```text
//! booked -> accepted -> arrived -> started -> ended
//! {booked, accepted} -> cancelled
//! ```
//!
//! Cada transición es una escritura condicional sobre el estado de
//! origen; los eventos se emiten solo después de que la escritura tuvo
//! éxito.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::context::DispatchContext;
use crate::dto::events::{names, object_types};
use crate::models::{CancellationRecord, CancelledBy, PaymentStatus, Ride, RideStatus};
use crate::realtime::transport::DispatchSignal;
use crate::repositories::{RideGuard, RideUpdate};
use crate::utils::errors::{invalid_transition, AppError, AppResult};
use crate::utils::metrics;

/// Vigencia del código de recogida en segundos; pasado este tiempo se renueva
pub const VERIFICATION_CODE_TTL_SECS: i64 = 600;

/// Código numérico de 4 dígitos que el pasajero confirma en persona
pub fn generate_verification_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Datos de una cancelación entrante
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub ride_id: Uuid,
    pub canceller_id: Uuid,
    pub reason: Option<String>,
    pub description: Option<String>,
}

pub struct LifecycleService {
    ctx: DispatchContext,
}

impl LifecycleService {
    pub fn new(ctx: DispatchContext) -> Self {
        Self { ctx }
    }

    fn record_transition(status: RideStatus) {
        metrics::RIDE_TRANSITIONS
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// accepted -> arrived, con código de verificación nuevo
    pub async fn arrive(&self, ride_id: Uuid) -> AppResult<Ride> {
        let update = RideUpdate {
            status: Some(RideStatus::Arrived),
            verification_code: Some(Some(generate_verification_code())),
            verification_issued_at: Some(Some(Utc::now())),
            pickup_verified: Some(false),
            ..Default::default()
        };

        let ride = match self
            .ctx
            .rides
            .find_one_and_update(ride_id, &RideGuard::status(RideStatus::Accepted), &update)
            .await?
        {
            Some(ride) => ride,
            None => return Err(self.ctx.transition_failure(ride_id, "arrive at pickup for").await),
        };

        Self::record_transition(RideStatus::Arrived);
        info!("📍 Conductor llegó a la recogida del viaje {}", ride.id);

        self.ctx
            .emit_to_parties(
                &ride,
                names::DRIVER_ARRIVED,
                object_types::ARRIVED_AT_PICKUP,
                "El conductor ha llegado",
            )
            .await;
        self.ctx.notify(
            ride.rider_id,
            "Tu conductor ha llegado al punto de recogida",
            json!({ "rideId": ride.id }),
        );

        Ok(ride)
    }

    /// Confirmación del pasajero: consume el código y marca la recogida verificada.
    ///
    /// Un código caducado no se acepta: se emite uno nuevo al pasajero y
    /// la llamada falla con `VerificationCodeExpired`.
    pub async fn verify_pickup_code(&self, ride_id: Uuid, code: &str) -> AppResult<Ride> {
        let ride = self.ctx.load_ride(ride_id).await?;
        if ride.status != RideStatus::Arrived {
            return Err(invalid_transition("verify pickup for", ride.status));
        }
        if ride.pickup_verified {
            return Err(AppError::InvalidVerificationCode);
        }

        let cutoff = Utc::now() - Duration::seconds(VERIFICATION_CODE_TTL_SECS);
        if ride.verification_issued_at.map_or(true, |at| at <= cutoff) {
            return Err(self.renew_verification_code(ride_id, cutoff).await);
        }

        let update = RideUpdate {
            verification_code: Some(None),
            verification_issued_at: Some(None),
            pickup_verified: Some(true),
            ..Default::default()
        };
        let guard = RideGuard::status(RideStatus::Arrived)
            .with_code(code.trim())
            .code_issued_after(cutoff);

        let ride = match self.ctx.rides.find_one_and_update(ride_id, &guard, &update).await? {
            Some(ride) => ride,
            None => {
                let current = self.ctx.load_ride(ride_id).await?;
                return Err(if current.status != RideStatus::Arrived {
                    invalid_transition("verify pickup for", current.status)
                } else if current.pickup_verified {
                    AppError::InvalidVerificationCode
                } else if current.verification_issued_at.map_or(true, |at| at <= cutoff) {
                    self.renew_verification_code(ride_id, cutoff).await
                } else {
                    AppError::InvalidVerificationCode
                });
            }
        };

        info!("🔐 Recogida verificada para el viaje {}", ride.id);
        self.ctx
            .emit_to_parties(
                &ride,
                names::PICKUP_VERIFIED,
                object_types::PICKUP_VERIFIED,
                "Recogida verificada",
            )
            .await;

        Ok(ride)
    }

    /// Sustituye un código caducado; solo una llamada concurrente lo consigue
    async fn renew_verification_code(&self, ride_id: Uuid, cutoff: DateTime<Utc>) -> AppError {
        let update = RideUpdate {
            verification_code: Some(Some(generate_verification_code())),
            verification_issued_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        let guard = RideGuard::status(RideStatus::Arrived)
            .unverified()
            .code_issued_by(cutoff);

        match self.ctx.rides.find_one_and_update(ride_id, &guard, &update).await {
            Ok(Some(ride)) => {
                info!("🔁 Código de recogida renovado para el viaje {}", ride.id);
                self.ctx
                    .emit_to_parties(
                        &ride,
                        names::VERIFICATION_CODE_RENEWED,
                        object_types::VERIFY_PICKUP_CODE,
                        "El código de recogida caducó; se generó uno nuevo",
                    )
                    .await;
                AppError::VerificationCodeExpired
            }
            // Otra llamada ya lo renovó
            Ok(None) => AppError::VerificationCodeExpired,
            Err(e) => e,
        }
    }

    /// arrived -> started; exige tarifa pagada y recogida verificada
    pub async fn start(&self, ride_id: Uuid) -> AppResult<Ride> {
        let ride = self.ctx.load_ride(ride_id).await?;
        Self::check_startable(&ride)?;

        let update = RideUpdate {
            status: Some(RideStatus::Started),
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        let guard = RideGuard::status(RideStatus::Arrived).paid().verified();

        let ride = match self.ctx.rides.find_one_and_update(ride_id, &guard, &update).await? {
            Some(ride) => ride,
            None => {
                // El documento cambió entre la lectura y la escritura
                let current = self.ctx.load_ride(ride_id).await?;
                Self::check_startable(&current)?;
                return Err(invalid_transition("start", current.status));
            }
        };

        Self::record_transition(RideStatus::Started);
        info!("🟢 Viaje {} iniciado", ride.id);
        self.ctx
            .emit_to_parties(&ride, names::RIDE_STARTED, object_types::START_RIDE, "Viaje iniciado")
            .await;

        Ok(ride)
    }

    fn check_startable(ride: &Ride) -> AppResult<()> {
        if ride.status != RideStatus::Arrived {
            return Err(invalid_transition("start", ride.status));
        }
        if ride.fare.payment_status != PaymentStatus::Paid {
            return Err(AppError::PaymentRequired);
        }
        if !ride.pickup_verified || ride.verification_code.is_some() {
            return Err(AppError::UnverifiedPickup);
        }
        Ok(())
    }

    /// started -> ended
    pub async fn end(&self, ride_id: Uuid) -> AppResult<Ride> {
        let update = RideUpdate {
            status: Some(RideStatus::Ended),
            ended_at: Some(Utc::now()),
            ..Default::default()
        };

        let ride = match self
            .ctx
            .rides
            .find_one_and_update(ride_id, &RideGuard::status(RideStatus::Started), &update)
            .await?
        {
            Some(ride) => ride,
            None => return Err(self.ctx.transition_failure(ride_id, "end").await),
        };

        Self::record_transition(RideStatus::Ended);
        info!("🏁 Viaje {} finalizado", ride.id);
        self.ctx
            .emit_to_parties(&ride, names::RIDE_ENDED, object_types::END_RIDE, "Viaje finalizado")
            .await;

        Ok(ride)
    }

    /// {booked, accepted} -> cancelled, por el pasajero o el conductor asignado
    pub async fn cancel(&self, request: CancelRequest) -> AppResult<Ride> {
        let ride = self.ctx.load_ride(request.ride_id).await?;

        let cancelled_by = if request.canceller_id == ride.rider_id {
            CancelledBy::Rider
        } else if ride.driver_id == Some(request.canceller_id) {
            CancelledBy::Driver
        } else {
            return Err(AppError::NotRideParticipant);
        };

        if !RideStatus::CANCELLABLE.contains(&ride.status) {
            return Err(invalid_transition("cancel", ride.status));
        }

        let update = RideUpdate {
            status: Some(RideStatus::Cancelled),
            cancellation: Some(CancellationRecord {
                cancelled_by,
                canceller_id: Some(request.canceller_id),
                reason: request.reason,
                description: request.description,
                cancelled_at: Utc::now(),
            }),
            ..Default::default()
        };

        let ride = match self
            .ctx
            .rides
            .find_one_and_update(
                request.ride_id,
                &RideGuard::any_of(&RideStatus::CANCELLABLE),
                &update,
            )
            .await?
        {
            Some(ride) => ride,
            None => return Err(self.ctx.transition_failure(request.ride_id, "cancel").await),
        };

        metrics::RIDE_CANCELLATIONS
            .with_label_values(&[match cancelled_by {
                CancelledBy::Rider => "rider",
                CancelledBy::Driver => "driver",
                CancelledBy::System => "system",
            }])
            .inc();
        Self::record_transition(RideStatus::Cancelled);
        info!("❌ Viaje {} cancelado por {:?}", ride.id, cancelled_by);

        self.ctx
            .publish_signal(DispatchSignal::Cancelled {
                ride_id: ride.id,
                cancelled_by,
            })
            .await;

        // Contraparte según el documento ya escrito, no la lectura previa
        let event = cancelled_by.event_name();
        self.ctx
            .emit_to_user(request.canceller_id, event, event, "Has cancelado el viaje", &ride)
            .await;
        if let Some(Some(counterparty)) = ride.counterparty_of(request.canceller_id) {
            self.ctx
                .emit_to_user(counterparty, event, event, "El viaje fue cancelado", &ride)
                .await;
            self.ctx.notify(
                counterparty,
                "Tu viaje fue cancelado",
                json!({ "rideId": ride.id, "cancelledBy": cancelled_by }),
            );
        }

        Ok(ride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_code_is_four_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
