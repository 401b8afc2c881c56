use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events — SSE stream carrying every broadcast event, with the SSE
/// `event:` field set to the event name and `data:` to its JSON payload.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.bus.subscribe();
    tracing::debug!(subscribers = app.bus.subscriber_count(), "SSE subscriber connected");
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => event
            .data_json()
            .ok()
            .map(|data| Ok::<Event, Infallible>(Event::default().event(event.name()).data(data))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "SSE subscriber lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
