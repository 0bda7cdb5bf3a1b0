use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use ecoride_core::{Actor, Booking};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/redeem", post(redeem_code))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/review", post(review_booking))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel_booking(booking_id, &actor).await?))
}

/// POST /v1/bookings/redeem
/// The driver checks a passenger in with the code they were given at booking.
pub async fn redeem_code(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::BadRequest("code is required".into()));
    }
    Ok(Json(state.bookings.redeem_code_for_driver(&req.code, &actor).await?))
}

/// POST /v1/bookings/{id}/review
pub async fn review_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.review(booking_id, &actor, req.rating, req.comment).await?;
    Ok(Json(booking))
}
