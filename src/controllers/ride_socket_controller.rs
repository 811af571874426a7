//! Controlador de eventos WebSocket
//!
//! Traduce cada evento entrante a una operación del núcleo y garantiza
//! exactamente un sobre de respuesta al emisor, sea éxito, fallo o error.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};
use validator::Validate;

use crate::dto::events::{object_types, Envelope, InboundEvent, OutboundMessage};
use crate::realtime::channel_registry::{user_channel, Connection};
use crate::realtime::transport::ChannelTransport;
use crate::services::lifecycle_service::CancelRequest;
use crate::services::{DispatchService, LifecycleService, TrackingService};
use crate::utils::errors::{AppError, AppResult};

struct Reply {
    message: &'static str,
    data: Value,
}

impl Reply {
    fn new(message: &'static str, data: impl serde::Serialize) -> Self {
        Self {
            message,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}

pub struct RideSocketController {
    transport: Arc<dyn ChannelTransport>,
    dispatch: Arc<DispatchService>,
    lifecycle: Arc<LifecycleService>,
    tracking: Arc<TrackingService>,
}

impl RideSocketController {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        dispatch: Arc<DispatchService>,
        lifecycle: Arc<LifecycleService>,
        tracking: Arc<TrackingService>,
    ) -> Self {
        Self {
            transport,
            dispatch,
            lifecycle,
            tracking,
        }
    }

    /// Trama de texto cruda; un JSON inválido también recibe respuesta
    pub async fn handle_text(&self, connection: &Connection, text: &str) -> OutboundMessage {
        match serde_json::from_str::<InboundEvent>(text) {
            Ok(event) => self.handle(connection, event).await,
            Err(e) => {
                debug!("⚠️ Trama inválida de {}: {}", connection.id, e);
                let err = AppError::BadRequest(format!("invalid message: {}", e));
                OutboundMessage::response(Envelope::from_error(object_types::INVALID_MESSAGE, &err))
            }
        }
    }

    pub async fn handle(&self, connection: &Connection, event: InboundEvent) -> OutboundMessage {
        let object_type = event.object_type();

        match self.route(connection, event).await {
            Ok(reply) => OutboundMessage::response(Envelope::success(
                object_type,
                reply.message,
                reply.data,
            )),
            Err(e) => {
                if e.is_internal() {
                    error!(
                        "❌ Error interno en '{}' (conexión {}): {:?}",
                        object_type, connection.id, e
                    );
                } else {
                    debug!("↩️ '{}' rechazado: {}", object_type, e);
                }
                OutboundMessage::response(Envelope::from_error(object_type, &e))
            }
        }
    }

    async fn route(&self, connection: &Connection, event: InboundEvent) -> AppResult<Reply> {
        match event {
            InboundEvent::JoinRoom(p) => {
                let channel = user_channel(p.user_id);
                self.transport.join(&channel, connection).await;
                Ok(Reply::new("Unido al canal", json!({ "channel": channel })))
            }
            InboundEvent::LeaveRoom(p) => {
                let channel = user_channel(p.user_id);
                self.transport.leave(&channel, connection.id).await;
                Ok(Reply::new("Canal abandonado", json!({ "channel": channel })))
            }
            InboundEvent::RequestARide(p) => {
                let outcome = self.dispatch.request_ride(p.ride_id).await?;
                let message = if outcome.candidates.is_empty() {
                    "No hay conductores disponibles"
                } else {
                    "Conectando con conductores"
                };
                Ok(Reply::new(message, outcome))
            }
            InboundEvent::AcceptARide(p) => {
                let accepted = self.dispatch.accept_ride(p.ride_id, p.driver_id).await?;
                Ok(Reply::new("Viaje aceptado", accepted))
            }
            InboundEvent::ArrivedAtPickup(p) => {
                let ride = self.lifecycle.arrive(p.ride_id).await?;
                Ok(Reply::new(
                    "Llegada registrada",
                    ride.without_verification_code(),
                ))
            }
            InboundEvent::VerifyPickupCode(p) => {
                let ride = self.lifecycle.verify_pickup_code(p.ride_id, &p.code).await?;
                Ok(Reply::new("Recogida verificada", ride))
            }
            InboundEvent::StartARide(p) => {
                let ride = self.lifecycle.start(p.ride_id).await?;
                Ok(Reply::new("Viaje iniciado", ride))
            }
            InboundEvent::EndARide(p) => {
                let ride = self.lifecycle.end(p.ride_id).await?;
                Ok(Reply::new("Viaje finalizado", ride))
            }
            InboundEvent::CancelARide(p) => {
                p.validate()?;
                let ride = self
                    .lifecycle
                    .cancel(CancelRequest {
                        ride_id: p.ride_id,
                        canceller_id: p.canceller_id,
                        reason: p.reason,
                        description: p.description,
                    })
                    .await?;
                Ok(Reply::new("Viaje cancelado", ride))
            }
            InboundEvent::UpdateCurrentLocation(p) => {
                p.validate()?;
                let ride = self
                    .tracking
                    .update_driver_location(p.ride_id, p.coordinates, p.eta)
                    .await?;
                Ok(Reply::new(
                    "Ubicación actualizada",
                    ride.without_verification_code(),
                ))
            }
            InboundEvent::EtaToPickup(p) => {
                p.validate()?;
                let eta = self
                    .tracking
                    .eta_to_pickup(p.ride_id, p.driver_coordinates)
                    .await?;
                Ok(Reply::new("ETA calculada", eta))
            }
            InboundEvent::EtaToDropoff(p) => {
                p.validate()?;
                let eta = self
                    .tracking
                    .eta_to_dropoff(p.ride_id, p.driver_coordinates)
                    .await?;
                Ok(Reply::new("ETA calculada", eta))
            }
        }
    }
}
