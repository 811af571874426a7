use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::dto::ApiResponse;
use crate::models::{NewRide, Ride};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_ride_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_ride))
        .route("/:id", get(get_ride))
}

async fn create_ride(
    State(state): State<AppState>,
    Json(request): Json<NewRide>,
) -> Result<Json<ApiResponse<Ride>>, AppError> {
    let response = state.rides.create(request).await?;
    Ok(Json(response))
}

async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state.rides.get_by_id(id).await?;
    Ok(Json(ride))
}
