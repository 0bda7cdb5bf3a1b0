use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use ecoride_booking::{BookingReceipt, PassengerSeat};
use ecoride_catalog::{PriceBreakdown, TripEstimate};
use ecoride_core::{Actor, Booking, BookingStatus, Location, NewTrip, Review, Trip};
use ecoride_trip::{CompleteOutcome, Earnings, OpenOutcome, TripSearch, TripUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub start_address: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_address: String,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub departure_at: DateTime<Utc>,
    pub distance_km: Option<f64>,
    pub price_per_seat_cents: i64,
    pub total_seats: u32,
}

impl From<CreateTripRequest> for NewTrip {
    fn from(req: CreateTripRequest) -> Self {
        NewTrip {
            start: Location {
                address: req.start_address,
                latitude: req.start_latitude,
                longitude: req.start_longitude,
            },
            end: Location {
                address: req.end_address,
                latitude: req.end_latitude,
                longitude: req.end_longitude,
            },
            departure_at: req.departure_at,
            distance_km: req.distance_km,
            price_per_seat_cents: req.price_per_seat_cents,
            total_seats: req.total_seats,
        }
    }
}

/// Driver position reported when opening or completing a trip.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct EstimateQuery {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct SeatsQuery {
    pub seats: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BookSeatsRequest {
    pub seats: u32,
}

/// Booking as the driver sees it: everything but the validation code.
#[derive(Debug, Serialize)]
pub struct TripBookingResponse {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub seats_booked: u32,
    pub status: BookingStatus,
    pub code_used: bool,
    pub booking_date: DateTime<Utc>,
    pub total_price_cents: i64,
    pub review: Option<Review>,
}

impl From<Booking> for TripBookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            passenger_id: b.passenger_id,
            seats_booked: b.seats_booked,
            status: b.status,
            code_used: b.code_used,
            booking_date: b.booking_date,
            total_price_cents: b.total_price_cents,
            review: b.review,
        }
    }
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/search", get(search_trips))
        .route("/v1/trips/estimate", get(estimate_trip))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}", get(get_trip).patch(update_trip).delete(delete_trip))
        .route("/v1/trips/{id}/open", post(open_trip))
        .route("/v1/trips/{id}/start", post(start_trip))
        .route("/v1/trips/{id}/complete", post(complete_trip))
        .route("/v1/trips/{id}/earnings", get(trip_earnings))
        .route("/v1/trips/{id}/passengers", get(trip_passengers))
        .route("/v1/trips/{id}/bookings", get(trip_bookings).post(book_trip))
        .route("/v1/trips/{id}/quote", get(quote_trip))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/trips/search
pub async fn search_trips(
    State(state): State<AppState>,
    Query(query): Query<TripSearch>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.search(&query).await?))
}

/// GET /v1/trips/estimate
/// Distance and suggested seat price before a trip is published
pub async fn estimate_trip(Query(q): Query<EstimateQuery>) -> Result<Json<TripEstimate>, AppError> {
    let estimate = ecoride_catalog::estimate(q.start_latitude, q.start_longitude, q.end_latitude, q.end_longitude)?;
    Ok(Json(estimate))
}

/// POST /v1/trips
pub async fn create_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.trips.create_trip(actor.user_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /v1/trips/{id}
pub async fn get_trip(State(state): State<AppState>, Path(trip_id): Path<Uuid>) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.get_trip(trip_id).await?))
}

/// PATCH /v1/trips/{id}
pub async fn update_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(update): Json<TripUpdate>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.update(trip_id, &actor, update).await?))
}

/// DELETE /v1/trips/{id}
pub async fn delete_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.trips.delete(trip_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/trips/{id}/open
/// An empty trip is cancelled instead; the outcome says which happened.
pub async fn open_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(pos): Json<PositionRequest>,
) -> Result<Json<OpenOutcome>, AppError> {
    let outcome = state.trips.open(trip_id, actor.user_id, pos.latitude, pos.longitude).await?;
    Ok(Json(outcome))
}

/// POST /v1/trips/{id}/start
pub async fn start_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.start(trip_id, actor.user_id).await?))
}

/// POST /v1/trips/{id}/complete
pub async fn complete_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(pos): Json<PositionRequest>,
) -> Result<Json<CompleteOutcome>, AppError> {
    let outcome = state.trips.complete(trip_id, actor.user_id, pos.latitude, pos.longitude).await?;
    Ok(Json(outcome))
}

/// GET /v1/trips/{id}/earnings
pub async fn trip_earnings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Earnings>, AppError> {
    Ok(Json(state.trips.earnings(trip_id, &actor).await?))
}

/// GET /v1/trips/{id}/passengers
pub async fn trip_passengers(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<PassengerSeat>>, AppError> {
    Ok(Json(state.bookings.passengers_for_trip(trip_id, &actor).await?))
}

/// GET /v1/trips/{id}/bookings
pub async fn trip_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<TripBookingResponse>>, AppError> {
    let bookings = state.bookings.bookings_for_trip(trip_id, &actor).await?;
    Ok(Json(bookings.into_iter().map(TripBookingResponse::from).collect()))
}

/// POST /v1/trips/{id}/bookings
/// The validation code is only ever returned here and in the passenger's own bookings.
pub async fn book_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<BookSeatsRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let receipt = state.bookings.create_booking(trip_id, actor.user_id, req.seats).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/trips/{id}/quote?seats=N
pub async fn quote_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Query(q): Query<SeatsQuery>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let trip = state.trips.get_trip(trip_id).await?;
    let price = state.bookings.quoter().quote(&trip, actor.user_id, q.seats.unwrap_or(1)).await?;
    Ok(Json(price))
}
