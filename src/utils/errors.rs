//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del despacho de viajes
//! y su conversión a sobres de respuesta (WebSocket) y respuestas HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Ride is no longer available")]
    RideNoLongerAvailable,

    #[error("Driver has no registered vehicle")]
    NoVehicleRegistered,

    #[error("Driver already has a ride in progress")]
    RideInProgressConflict,

    #[error("Fare must be paid before the ride can start")]
    PaymentRequired,

    #[error("Pickup has not been verified by the rider")]
    UnverifiedPickup,

    #[error("Ride has no driver assigned")]
    NoDriverAssigned,

    #[error("Missing location: {0}")]
    MissingLocation(String),

    #[error("User is not a participant of this ride")]
    NotRideParticipant,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Verification code expired; a new one was sent to the rider")]
    VerificationCodeExpired,

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Código estable que viaja en los sobres de fallo
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::RideNoLongerAvailable => "RIDE_NO_LONGER_AVAILABLE",
            AppError::NoVehicleRegistered => "NO_VEHICLE_REGISTERED",
            AppError::RideInProgressConflict => "RIDE_IN_PROGRESS_CONFLICT",
            AppError::PaymentRequired => "PAYMENT_REQUIRED",
            AppError::UnverifiedPickup => "UNVERIFIED_PICKUP",
            AppError::NoDriverAssigned => "NO_DRIVER_ASSIGNED",
            AppError::MissingLocation(_) => "MISSING_LOCATION",
            AppError::NotRideParticipant => "NOT_RIDE_PARTICIPANT",
            AppError::InvalidVerificationCode => "INVALID_VERIFICATION_CODE",
            AppError::VerificationCodeExpired => "VERIFICATION_CODE_EXPIRED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errores de infraestructura: se registran completos y se ocultan al cliente
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    /// Mensaje seguro para enviar al cliente
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "An unexpected error occurred".to_string()
        } else {
            self.to_string()
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::MissingLocation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotRideParticipant => StatusCode::FORBIDDEN,
            AppError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::CONFLICT,
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Internal(format!("redis: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization: {}", e))
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!("❌ Error interno en petición HTTP: {}", self);
        }

        let details = match &self {
            AppError::Validation(e) => Some(json!(e)),
            _ => None,
        };

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.public_message(),
            details,
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de transición inválida
pub fn invalid_transition(action: &str, current: impl std::fmt::Display) -> AppError {
    AppError::InvalidTransition(format!("cannot {} a ride in status '{}'", action, current))
}
