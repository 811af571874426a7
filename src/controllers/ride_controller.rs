use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::ApiResponse;
use crate::models::{NewRide, Ride};
use crate::repositories::RideStore;
use crate::utils::errors::{not_found_error, AppError};

pub struct RideController {
    rides: Arc<dyn RideStore>,
}

impl RideController {
    pub fn new(rides: Arc<dyn RideStore>) -> Self {
        Self { rides }
    }

    pub async fn create(&self, request: NewRide) -> Result<ApiResponse<Ride>, AppError> {
        request.validate()?;

        if request.pickup.address.trim().is_empty() || request.dropoff.address.trim().is_empty() {
            return Err(AppError::BadRequest(
                "La dirección de recogida y destino son requeridas".to_string(),
            ));
        }

        // El almacén rechaza un segundo viaje activo del mismo pasajero
        let ride = self.rides.create(request).await?;
        info!("📝 Viaje {} reservado para {}", ride.id, ride.rider_id);

        Ok(ApiResponse::success_with_message(
            ride,
            "Viaje reservado exitosamente".to_string(),
        ))
    }

    /// El código de verificación nunca sale por REST
    pub async fn get_by_id(&self, id: Uuid) -> Result<Ride, AppError> {
        let ride = self
            .rides
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Ride", &id.to_string()))?;

        Ok(ride.without_verification_code())
    }
}
