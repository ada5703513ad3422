//! Operator notifications.
//!
//! Sinks implement [`NotificationSink`]; [`NotifierHub`] fans out to all of
//! them and only ever logs delivery failures.

pub mod cache;
pub mod discord;
pub mod errors;
pub mod hub;
pub mod notification;

pub use cache::{ArtifactCache, DEFAULT_ARTIFACT_TTL};
pub use discord::DiscordWebhookSink;
pub use errors::NotifyError;
pub use hub::{LogSink, NotifierHub};
pub use notification::{Notification, NotificationSink};
