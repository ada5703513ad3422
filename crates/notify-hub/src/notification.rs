use async_trait::async_trait;
use renew_core_types::{NotificationEvent, StatusLevel};

use crate::errors::NotifyError;

/// What a sink is asked to deliver.
///
/// Plain text and structured events are distinct variants; sinks never guess
/// the shape from the content.
#[derive(Debug, Clone)]
pub enum Notification {
    Text(String),
    Event(NotificationEvent),
}

impl Notification {
    pub fn level(&self) -> StatusLevel {
        match self {
            Notification::Text(_) => StatusLevel::Info,
            Notification::Event(event) => event.level,
        }
    }

    pub fn headline(&self) -> &str {
        match self {
            Notification::Text(text) => text,
            Notification::Event(event) => &event.title,
        }
    }
}

impl From<NotificationEvent> for Notification {
    fn from(event: NotificationEvent) -> Self {
        Notification::Event(event)
    }
}

impl From<String> for Notification {
    fn from(text: String) -> Self {
        Notification::Text(text)
    }
}

/// An operator channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}
