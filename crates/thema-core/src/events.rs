//! Job-progress event bus feeding the ETL status SSE stream (§6).
//!
//! `tokio::sync::broadcast` based, same shape as a typical job-worker event
//! bus: the orchestrator emits one event per status change, the HTTP layer
//! subscribes per SSE connection. Slow receivers fall behind and miss
//! events (`Lagged`) — acceptable for a progress stream where freshness
//! matters more than completeness.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::JobStatus;

/// One ETL job-progress notification, serialized as the SSE `data:` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A job moved to a new status.
    StatusChanged {
        job_id: Uuid,
        status: JobStatus,
        progress_pct: i16,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A job reached a terminal status (success/failure/partial).
    Completed {
        job_id: Uuid,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::StatusChanged { job_id, .. } => *job_id,
            JobEvent::Completed { job_id, .. } => *job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::StatusChanged { .. } => "StatusChanged",
            JobEvent::Completed { .. } => "Completed",
        }
    }
}

/// Broadcast-based bus distributing [`JobEvent`]s to every open SSE
/// connection. One instance shared process-wide via `Arc`.
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber lag buffer; 256 is a reasonable
    /// production default, smaller is fine for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Silently dropped if nobody is
    /// listening (no subscriber for that job's progress endpoint).
    pub fn emit(&self, event: JobEvent) {
        let event_type = event.event_type();
        let job_id = event.job_id();
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(job_id = %job_id, event_type, subscriber_count, "job event emitted");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_and_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        let job_id = Uuid::new_v4();
        bus.emit(JobEvent::StatusChanged {
            job_id,
            status: JobStatus::ProcessingQueries,
            progress_pct: 20,
            message: None,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), job_id);
        assert!(!event.is_terminal());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(JobEvent::Completed {
            job_id: Uuid::nil(),
            status: JobStatus::Success,
            error_message: None,
        });

        assert!(rx1.recv().await.unwrap().is_terminal());
        assert!(rx2.recv().await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(32);
        bus.emit(JobEvent::StatusChanged {
            job_id: Uuid::nil(),
            status: JobStatus::Started,
            progress_pct: 5,
            message: None,
        });
    }

    #[test]
    fn status_changed_json_omits_none_message() {
        let event = JobEvent::StatusChanged {
            job_id: Uuid::nil(),
            status: JobStatus::StoringDocuments,
            progress_pct: 90,
            message: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"StatusChanged"#));
        assert!(!json.contains("message"));
    }

    #[tokio::test]
    async fn subscriber_count_tracks_drops() {
        let bus = EventBus::new(32);
        assert_eq!(bus.subscriber_count(), 0);
        let rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
