//! Operator-facing notification events.

use std::path::PathBuf;

use crate::{MonetaryAmount, RunReason};

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatusLevel {
    Success,
    Failure,
    Warning,
    Info,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Success => "success",
            StatusLevel::Failure => "failure",
            StatusLevel::Warning => "warning",
            StatusLevel::Info => "info",
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventField {
    pub name: String,
    pub value: String,
}

/// Structured event delivered to the operator channel.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize))]
#[derive(Clone, Debug)]
pub struct NotificationEvent {
    pub title: String,
    pub description: String,
    pub level: StatusLevel,
    pub url: Option<String>,
    pub amount: Option<MonetaryAmount>,
    pub reason: Option<RunReason>,
    pub fields: Vec<EventField>,
    /// Paths of artifacts to attach; never read back by the engine.
    pub attachments: Vec<PathBuf>,
    /// Set on the single end-of-run summary.
    pub summary: bool,
    pub run_id: Option<String>,
}

impl NotificationEvent {
    pub fn new(title: impl Into<String>, description: impl Into<String>, level: StatusLevel) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level,
            url: None,
            amount: None,
            reason: None,
            fields: Vec::new(),
            attachments: Vec::new(),
            summary: false,
            run_id: None,
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, StatusLevel::Info)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, StatusLevel::Warning)
    }

    pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, StatusLevel::Failure)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_amount(mut self, amount: Option<MonetaryAmount>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_reason(mut self, reason: RunReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EventField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_attachment(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.attachments.push(path);
        }
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn as_summary(mut self) -> Self {
        self.summary = true;
        self
    }
}
