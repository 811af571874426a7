//! Colaboradores compartidos por los servicios del núcleo

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::dto::events::{Envelope, OutboundMessage};
use crate::models::Ride;
use crate::realtime::channel_registry::user_channel;
use crate::realtime::transport::{ChannelTransport, DispatchSignal};
use crate::repositories::{DriverDirectory, RideStore, VehicleDirectory};
use crate::services::notification_service::{notify_in_background, NotificationSink};
use crate::utils::errors::{invalid_transition, not_found_error, AppError};

#[derive(Clone)]
pub struct DispatchContext {
    pub rides: Arc<dyn RideStore>,
    pub drivers: Arc<dyn DriverDirectory>,
    pub vehicles: Arc<dyn VehicleDirectory>,
    pub transport: Arc<dyn ChannelTransport>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl DispatchContext {
    /// Emite a un usuario; la entrega es best-effort y un fallo solo se registra
    pub async fn emit_to_user(
        &self,
        user_id: Uuid,
        event: &str,
        object_type: &str,
        message: &str,
        data: impl Serialize,
    ) {
        let outbound = OutboundMessage::new(event, Envelope::success(object_type, message, data));
        if let Err(e) = self.transport.emit(&user_channel(user_id), outbound).await {
            warn!("⚠️ No se pudo emitir '{}' a {}: {}", event, user_id, e);
        }
    }

    /// Emite el documento a ambas partes; el conductor nunca ve el código
    pub async fn emit_to_parties(&self, ride: &Ride, event: &str, object_type: &str, message: &str) {
        self.emit_to_user(ride.rider_id, event, object_type, message, ride)
            .await;
        if let Some(driver_id) = ride.driver_id {
            self.emit_to_user(
                driver_id,
                event,
                object_type,
                message,
                ride.without_verification_code(),
            )
            .await;
        }
    }

    pub async fn publish_signal(&self, signal: DispatchSignal) {
        if let Err(e) = self.transport.publish_signal(signal.clone()).await {
            warn!("⚠️ No se pudo publicar señal {:?}: {}", signal, e);
        }
    }

    pub fn notify(&self, user_id: Uuid, message: &str, metadata: Value) {
        notify_in_background(&self.notifier, user_id, message, metadata);
    }

    /// Explica por qué falló una escritura condicional
    pub async fn transition_failure(&self, ride_id: Uuid, action: &str) -> AppError {
        match self.rides.find_by_id(ride_id).await {
            Ok(Some(ride)) => invalid_transition(action, ride.status),
            Ok(None) => not_found_error("Ride", &ride_id.to_string()),
            Err(e) => e,
        }
    }

    pub async fn load_ride(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        self.rides
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| not_found_error("Ride", &ride_id.to_string()))
    }
}
