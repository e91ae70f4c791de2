//! Admin notification (§4.L failure handling): a trait-seamed side effect
//! fired for critical-severity stage failures, grounded on the teacher's
//! general pattern of keeping side effects behind a trait
//! ([`thema_core::events::EventBus`] for in-process pub/sub) rather than a
//! bespoke notification framework.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

/// One critical-failure notification, as it would be sent to an
/// administrator (log line, or eventually email/Slack).
#[derive(Debug, Clone)]
pub struct CriticalFailureNotification {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub anp_seq: i64,
    pub stage: String,
    pub error_message: String,
    pub retry_count: u32,
}

/// Fires on a critical-severity stage failure. Implementations must not
/// fail the ETL run — a notification delivery problem is logged and
/// swallowed by the caller, never propagated.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify_critical_failure(&self, notification: CriticalFailureNotification);
}

/// Default notifier: a structured `tracing::error!` line. Stands in for
/// the email/Slack integrations a production deployment would wire up.
pub struct TracingAdminNotifier;

#[async_trait]
impl AdminNotifier for TracingAdminNotifier {
    async fn notify_critical_failure(&self, notification: CriticalFailureNotification) {
        error!(
            job_id = %notification.job_id,
            user_id = %notification.user_id,
            anp_seq = notification.anp_seq,
            stage = %notification.stage,
            retry_count = notification.retry_count,
            error = %notification.error_message,
            "critical ETL failure — admin notification"
        );
    }
}

/// Test fixture: records every notification it receives instead of sending
/// anything, so tests can assert on what would have gone out.
#[derive(Default)]
pub struct RecordingAdminNotifier {
    notifications: Mutex<Vec<CriticalFailureNotification>>,
}

impl RecordingAdminNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<CriticalFailureNotification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdminNotifier for RecordingAdminNotifier {
    async fn notify_critical_failure(&self, notification: CriticalFailureNotification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_keeps_every_notification() {
        let notifier = RecordingAdminNotifier::new();
        notifier
            .notify_critical_failure(CriticalFailureNotification {
                job_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                anp_seq: 123,
                stage: "document_storage".to_string(),
                error_message: "database deadlock".to_string(),
                retry_count: 0,
            })
            .await;
        assert_eq!(notifier.notifications().len(), 1);
    }
}
