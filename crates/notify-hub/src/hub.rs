use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use renew_core_types::StatusLevel;
use tracing::{error, info, warn};

use crate::errors::NotifyError;
use crate::notification::{Notification, NotificationSink};

/// Fans a notification out to every registered sink.
///
/// Delivery failures are logged and swallowed: notifying must never change
/// the outcome of a run.
#[derive(Default)]
pub struct NotifierHub {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl NotifierHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Deliver to all sinks; returns how many accepted the notification.
    pub async fn notify(&self, notification: &Notification) -> usize {
        let sinks: Vec<Arc<dyn NotificationSink>> = self.sinks.read().iter().cloned().collect();
        let mut delivered = 0;
        for sink in sinks {
            match sink.deliver(notification).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    sink = sink.name(),
                    headline = notification.headline(),
                    retryable = err.is_retryable(),
                    %err,
                    "notification delivery failed"
                ),
            }
        }
        delivered
    }
}

/// Writes notifications to the process log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Text(text) => info!(target: "notify", "{}", text),
            Notification::Event(event) => {
                let reason = event.reason.map(|reason| reason.code());
                let amount = event.amount.as_ref().map(|amount| amount.to_string());
                match event.level {
                    StatusLevel::Failure => error!(
                        target: "notify",
                        title = %event.title,
                        reason = ?reason,
                        amount = ?amount,
                        attachments = event.attachments.len(),
                        "{}",
                        event.description
                    ),
                    StatusLevel::Warning => warn!(
                        target: "notify",
                        title = %event.title,
                        reason = ?reason,
                        amount = ?amount,
                        attachments = event.attachments.len(),
                        "{}",
                        event.description
                    ),
                    StatusLevel::Success | StatusLevel::Info => info!(
                        target: "notify",
                        title = %event.title,
                        reason = ?reason,
                        amount = ?amount,
                        attachments = event.attachments.len(),
                        "{}",
                        event.description
                    ),
                }
            }
        }
        Ok(())
    }
}
