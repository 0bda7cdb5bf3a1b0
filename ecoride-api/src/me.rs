use axum::{extract::State, routing::get, Extension, Json, Router};
use ecoride_core::{Actor, Booking};
use ecoride_trip::UserTrips;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me/trips", get(my_trips))
        .route("/v1/me/bookings", get(my_bookings))
}

/// GET /v1/me/trips
/// Trips the caller drives or rides in, split into ongoing, upcoming and past.
pub async fn my_trips(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UserTrips>, AppError> {
    Ok(Json(state.trips.user_trips(actor.user_id).await?))
}

/// GET /v1/me/bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.bookings_for_passenger(actor.user_id).await?))
}
