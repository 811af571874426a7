use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{DriverDirectory, DriverQuery};
use crate::models::driver::{Driver, DriverRecord};
use crate::utils::errors::AppResult;

/// Directorio de conductores sobre la tabla users
pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverDirectory for DriverRepository {
    async fn find_drivers(&self, query: &DriverQuery) -> AppResult<Vec<Driver>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, full_name, gender, last_latitude AS latitude, last_longitude AS longitude \
             FROM users WHERE role = 'driver'",
        );
        if let Some(gender) = query.gender {
            qb.push(" AND gender = ").push_bind(gender);
        }

        let drivers = qb
            .build_query_as::<DriverRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(drivers.into_iter().map(Driver::from).collect())
    }
}
