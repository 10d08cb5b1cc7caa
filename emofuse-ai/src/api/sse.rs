//! Server-Sent Events stream of analysis lifecycle events

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Heartbeat interval for idle connections
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events
///
/// Streams every `EmofuseEvent` as JSON with the event name in the SSE
/// `event:` field. Lagging clients skip the events they missed.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!(event_type, analysis_id = %event.analysis_id(), "SSE: forwarding event");
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => warn!(event_type, error = %e, "SSE: failed to serialize event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: client lagging, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: event bus closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}
