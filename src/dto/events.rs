//! Protocolo de eventos en tiempo real
//!
//! Tramas entrantes `{"event": ..., "data": {...}}` y sobres salientes
//! `{"event": ..., "data": {objectType, status, message, data}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::models::Coordinates;
use crate::utils::errors::AppError;

/// Nombres de eventos salientes
pub mod names {
    pub const RESPONSE: &str = "response";
    pub const NEW_RIDE_REQUEST: &str = "new-ride-request";
    pub const RIDE_EXPIRED: &str = "ride-expired";
    pub const RIDE_SUPERSEDED: &str = "ride-superseded";
    pub const DRIVER_RIDE_ACCEPTED: &str = "driver-ride-accepted";
    pub const USER_RIDE_ACCEPTED: &str = "user-ride-accepted";
    pub const DRIVER_ARRIVED: &str = "driver-arrived";
    pub const RIDE_STARTED: &str = "ride-started";
    pub const RIDE_ENDED: &str = "ride-ended";
    pub const LOCATION_UPDATED: &str = "location-updated";
    pub const ETA_UPDATED: &str = "eta-updated";
    pub const PICKUP_VERIFIED: &str = "pickup-verified";
    pub const VERIFICATION_CODE_RENEWED: &str = "verification-code-renewed";
}

/// Valores de `objectType`, para que un cliente genérico despache por intención
pub mod object_types {
    pub const JOIN_ROOM: &str = "join-room";
    pub const LEAVE_ROOM: &str = "leave-room";
    pub const REQUEST_RIDE: &str = "request-a-ride";
    pub const CONNECTING_DRIVERS: &str = "connecting-drivers";
    pub const NO_DRIVERS_AVAILABLE: &str = "no-drivers-available";
    pub const NEW_RIDE_REQUEST: &str = "new-ride-request";
    pub const RIDE_EXPIRED: &str = "ride-expired";
    pub const RIDE_SUPERSEDED: &str = "ride-superseded";
    pub const ACCEPT_RIDE: &str = "accept-a-ride";
    pub const DRIVER_RIDE_ACCEPTED: &str = "driver-ride-accepted";
    pub const USER_RIDE_ACCEPTED: &str = "user-ride-accepted";
    pub const ARRIVED_AT_PICKUP: &str = "arrived-at-pickup";
    pub const VERIFY_PICKUP_CODE: &str = "verify-pickup-code";
    pub const PICKUP_VERIFIED: &str = "pickup-verified";
    pub const START_RIDE: &str = "start-a-ride";
    pub const END_RIDE: &str = "end-a-ride";
    pub const CANCEL_RIDE: &str = "cancel-a-ride";
    pub const UPDATE_LOCATION: &str = "update-current-location";
    pub const ETA_TO_PICKUP: &str = "eta-to-pickup";
    pub const ETA_TO_DROPOFF: &str = "eta-to-dropoff";
    pub const INVALID_MESSAGE: &str = "invalid-message";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRef {
    pub ride_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRidePayload {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodePayload {
    pub ride_id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelRidePayload {
    pub ride_id: Uuid,
    pub canceller_id: Uuid,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdatePayload {
    pub ride_id: Uuid,
    #[validate]
    pub coordinates: Option<Coordinates>,
    #[validate(range(min = 0))]
    pub eta: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EtaQueryPayload {
    pub ride_id: Uuid,
    #[validate]
    pub driver_coordinates: Option<Coordinates>,
}

/// Evento entrante
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundEvent {
    JoinRoom(RoomPayload),
    LeaveRoom(RoomPayload),
    RequestARide(RideRef),
    AcceptARide(AcceptRidePayload),
    ArrivedAtPickup(RideRef),
    VerifyPickupCode(VerifyCodePayload),
    StartARide(RideRef),
    EndARide(RideRef),
    CancelARide(CancelRidePayload),
    UpdateCurrentLocation(LocationUpdatePayload),
    EtaToPickup(EtaQueryPayload),
    EtaToDropoff(EtaQueryPayload),
}

impl InboundEvent {
    /// `objectType` de la respuesta directa al emisor
    pub fn object_type(&self) -> &'static str {
        match self {
            InboundEvent::JoinRoom(_) => object_types::JOIN_ROOM,
            InboundEvent::LeaveRoom(_) => object_types::LEAVE_ROOM,
            InboundEvent::RequestARide(_) => object_types::REQUEST_RIDE,
            InboundEvent::AcceptARide(_) => object_types::ACCEPT_RIDE,
            InboundEvent::ArrivedAtPickup(_) => object_types::ARRIVED_AT_PICKUP,
            InboundEvent::VerifyPickupCode(_) => object_types::VERIFY_PICKUP_CODE,
            InboundEvent::StartARide(_) => object_types::START_RIDE,
            InboundEvent::EndARide(_) => object_types::END_RIDE,
            InboundEvent::CancelARide(_) => object_types::CANCEL_RIDE,
            InboundEvent::UpdateCurrentLocation(_) => object_types::UPDATE_LOCATION,
            InboundEvent::EtaToPickup(_) => object_types::ETA_TO_PICKUP,
            InboundEvent::EtaToDropoff(_) => object_types::ETA_TO_DROPOFF,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Failure,
    Error,
}

/// Sobre de respuesta común a todos los eventos salientes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub object_type: String,
    pub status: EnvelopeStatus,
    pub message: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Envelope {
    pub fn success(object_type: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            object_type: object_type.to_string(),
            status: EnvelopeStatus::Success,
            message: message.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            code: None,
        }
    }

    pub fn from_error(object_type: &str, error: &AppError) -> Self {
        let status = if error.is_internal() {
            EnvelopeStatus::Error
        } else {
            EnvelopeStatus::Failure
        };

        Self {
            object_type: object_type.to_string(),
            status,
            message: error.public_message(),
            data: Value::Null,
            code: Some(error.code().to_string()),
        }
    }
}

/// Trama saliente
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub event: String,
    pub data: Envelope,
}

impl OutboundMessage {
    pub fn new(event: &str, data: Envelope) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Respuesta directa al emisor de un evento entrante
    pub fn response(data: Envelope) -> Self {
        Self::new(names::RESPONSE, data)
    }
}
