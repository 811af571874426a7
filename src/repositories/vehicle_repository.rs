use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::VehicleDirectory;
use crate::models::Vehicle;
use crate::utils::errors::AppResult;

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleDirectory for VehicleRepository {
    async fn find_one_by_owner(&self, owner_id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT id, owner_id, license_plate, brand, model, color, created_at \
             FROM vehicles WHERE owner_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }
}
