//! Job-progress SSE stream: bridges `thema_core::events::JobEvent`
//! broadcast notifications to a single job's `/progress` connection.
//! Grounded on `matric-api::main`'s `bridge_worker_events` (subscribe to
//! a broadcast channel, filter, forward as axum SSE `Event`s), adapted
//! from `WorkerEvent`/`ServerEvent` to `JobEvent`.

use axum::response::sse::Event;
use futures::stream::{Stream, StreamExt as _};
use tokio::sync::broadcast;
use uuid::Uuid;

use thema_core::events::JobEvent;

/// Yields one SSE event per `JobEvent` for `job_id`, stopping after the
/// job reaches a terminal status. Lagged/closed broadcast errors are
/// skipped rather than surfaced, same as `matric-api::main`'s `sse_events`.
pub fn job_progress_stream(
    rx: broadcast::Receiver<JobEvent>,
    job_id: Uuid,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(move |result: Result<JobEvent, _>| match result {
            Ok(event) if event.job_id() == job_id => Some(event),
            _ => None,
        })
        // `scan` stops the stream the item *after* it returns `None`, so the
        // terminal event itself is still emitted before the stream closes.
        .scan(false, |already_terminal, event| {
            if *already_terminal {
                return None;
            }
            *already_terminal = event.is_terminal();
            Some(event)
        })
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(Event::default().event(event.event_type()).data(data))
        })
}
