use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/trips/{id}/events", get(stream_trip_events))
}

/// GET /v1/trips/{id}/events
/// Live lifecycle and booking events of one trip.
pub async fn stream_trip_events(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // 404 before subscribing
    state.trips.get_trip(trip_id).await?;
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.trip_id() == trip_id => match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::warn!("Could not encode {} for trip {}: {}", event.name(), trip_id, e);
                    None
                }
            },
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!("SSE client of trip {} lagged, {} event(s) skipped", trip_id, skipped);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")))
}
