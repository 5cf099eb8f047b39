//! Server-sent event framing for progress streams.

use std::convert::Infallible;

use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use futures::{Stream, StreamExt};

use ivy_core::progress::ProgressEvent;

/// One `data: <json>` frame per progress event.
pub fn progress_sse(
    events: impl Stream<Item = ProgressEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
        });
        Ok(Event::default().data(json))
    });

    Sse::new(frames).keep_alive(KeepAlive::default())
}
