use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{RideFilter, RideGuard, RideStore, RideUpdate};
use crate::models::{
    CancellationRecord, Fare, Location, NewRide, PaymentStatus, Ride, RidePreferences,
    RideStatus, Stop, Tracking,
};
use crate::utils::errors::{AppError, AppResult};

/// Índice parcial: un solo viaje activo por pasajero
const RIDER_ACTIVE_INDEX: &str = "one_active_ride_per_rider";
/// Índice parcial: un solo viaje en curso por conductor
const DRIVER_IN_PROGRESS_INDEX: &str = "one_in_progress_ride_per_driver";

/// Fila de la tabla rides
#[derive(Debug, sqlx::FromRow)]
pub struct RideRecord {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub pickup: Json<Location>,
    pub dropoff: Json<Location>,
    pub stops: Json<Vec<Stop>>,
    pub total_distance: f64,
    pub rider_fare: Decimal,
    pub driver_fare: Decimal,
    pub payment_status: PaymentStatus,
    pub preferences: Json<RidePreferences>,
    pub status: RideStatus,
    pub verification_code: Option<String>,
    pub verification_issued_at: Option<DateTime<Utc>>,
    pub pickup_verified: bool,
    pub cancellation: Option<Json<CancellationRecord>>,
    pub tracking: Option<Json<Tracking>>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<RideRecord> for Ride {
    fn from(r: RideRecord) -> Self {
        Self {
            id: r.id,
            rider_id: r.rider_id,
            driver_id: r.driver_id,
            vehicle_id: r.vehicle_id,
            pickup: r.pickup.0,
            dropoff: r.dropoff.0,
            stops: r.stops.0,
            total_distance: r.total_distance,
            fare: Fare {
                rider_amount: r.rider_fare,
                driver_amount: r.driver_fare,
                payment_status: r.payment_status,
            },
            preferences: r.preferences.0,
            status: r.status,
            verification_code: r.verification_code,
            verification_issued_at: r.verification_issued_at,
            pickup_verified: r.pickup_verified,
            cancellation: r.cancellation.map(|c| c.0),
            tracking: r.tracking.map(|t| t.0),
            created_at: r.created_at,
            scheduled_at: r.scheduled_at,
            started_at: r.started_at,
            ended_at: r.ended_at,
        }
    }
}

pub struct RideRepository {
    pool: PgPool,
}

impl RideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &RideFilter) {
        if let Some(rider_id) = filter.rider_id {
            qb.push(" AND rider_id = ").push_bind(rider_id);
        }
        if let Some(driver_id) = filter.driver_id {
            qb.push(" AND driver_id = ").push_bind(driver_id);
        }
        if !filter.statuses.is_empty() {
            qb.push(" AND status::text = ANY(")
                .push_bind(status_names(&filter.statuses))
                .push(")");
        }
    }
}

fn status_names(statuses: &[RideStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Traduce violaciones de los índices parciales a errores de dominio
fn map_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some(DRIVER_IN_PROGRESS_INDEX) => return AppError::RideInProgressConflict,
            Some(RIDER_ACTIVE_INDEX) => {
                return AppError::Conflict("rider already has an active ride".to_string())
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl RideStore for RideRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Ride>> {
        let record = sqlx::query_as::<_, RideRecord>("SELECT * FROM rides WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Ride::from))
    }

    async fn find_one(&self, filter: &RideFilter) -> AppResult<Option<Ride>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM rides WHERE TRUE");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT 1");

        let record = qb
            .build_query_as::<RideRecord>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Ride::from))
    }

    async fn find_one_and_update(
        &self,
        id: Uuid,
        guard: &RideGuard,
        update: &RideUpdate,
    ) -> AppResult<Option<Ride>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE rides SET ");
        {
            let mut set = qb.separated(", ");
            set.push("updated_at = NOW()");
            if let Some(status) = update.status {
                set.push("status = ").push_bind_unseparated(status);
            }
            if let Some(driver_id) = update.driver_id {
                set.push("driver_id = ").push_bind_unseparated(driver_id);
            }
            if let Some(vehicle_id) = update.vehicle_id {
                set.push("vehicle_id = ").push_bind_unseparated(vehicle_id);
            }
            if let Some(code) = &update.verification_code {
                set.push("verification_code = ")
                    .push_bind_unseparated(code.clone());
            }
            if let Some(issued_at) = update.verification_issued_at {
                set.push("verification_issued_at = ")
                    .push_bind_unseparated(issued_at);
            }
            if let Some(verified) = update.pickup_verified {
                set.push("pickup_verified = ").push_bind_unseparated(verified);
            }
            if let Some(payment_status) = update.payment_status {
                set.push("payment_status = ")
                    .push_bind_unseparated(payment_status);
            }
            if let Some(cancellation) = &update.cancellation {
                set.push("cancellation = ")
                    .push_bind_unseparated(Json(cancellation.clone()));
            }
            if let Some(tracking) = &update.tracking {
                set.push("tracking = ")
                    .push_bind_unseparated(Json(tracking.clone()));
            }
            if let Some(started_at) = update.started_at {
                set.push("started_at = ").push_bind_unseparated(started_at);
            }
            if let Some(ended_at) = update.ended_at {
                set.push("ended_at = ").push_bind_unseparated(ended_at);
            }
        }

        // La guarda va en el mismo UPDATE: cero filas = guarda fallida
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status::text = ANY(")
            .push_bind(status_names(&guard.statuses))
            .push(")");
        if let Some(payment_status) = guard.payment_status {
            qb.push(" AND payment_status = ").push_bind(payment_status);
        }
        if let Some(verified) = guard.pickup_verified {
            qb.push(" AND pickup_verified = ").push_bind(verified);
        }
        if let Some(code) = &guard.verification_code {
            qb.push(" AND verification_code = ").push_bind(code.clone());
        }
        if let Some(cutoff) = guard.code_issued_after {
            qb.push(" AND verification_issued_at > ").push_bind(cutoff);
        }
        if let Some(cutoff) = guard.code_issued_by {
            qb.push(" AND (verification_issued_at IS NULL OR verification_issued_at <= ")
                .push_bind(cutoff)
                .push(")");
        }
        qb.push(" RETURNING *");

        let record = qb
            .build_query_as::<RideRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(record.map(Ride::from))
    }

    async fn create(&self, new_ride: NewRide) -> AppResult<Ride> {
        let ride = new_ride.into_booked();

        let record = sqlx::query_as::<_, RideRecord>(
            r#"
            INSERT INTO rides (
                id, rider_id, pickup, dropoff, stops, total_distance,
                rider_fare, driver_fare, payment_status, preferences, status,
                pickup_verified, created_at, scheduled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12, $13)
            RETURNING *
            "#,
        )
        .bind(ride.id)
        .bind(ride.rider_id)
        .bind(Json(&ride.pickup))
        .bind(Json(&ride.dropoff))
        .bind(Json(&ride.stops))
        .bind(ride.total_distance)
        .bind(ride.fare.rider_amount)
        .bind(ride.fare.driver_amount)
        .bind(ride.fare.payment_status)
        .bind(Json(&ride.preferences))
        .bind(ride.status)
        .bind(ride.created_at)
        .bind(ride.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(record.into())
    }

    async fn delete_many(&self, filter: &RideFilter) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM rides WHERE TRUE");
        Self::push_filter(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
