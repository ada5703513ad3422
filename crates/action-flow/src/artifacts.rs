//! Screenshot artifacts.

use std::path::{Path, PathBuf};

use cdp_adapter::PageController;
use chrono::Local;
use tracing::{debug, warn};

use crate::errors::FlowError;

/// Writes full-page screenshots as `<dir>/<YYYYmmdd-HHMMSS>-<label>.png`.
///
/// Files are referenced by path only and never read back.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRecorder {
    dir: Option<PathBuf>,
}

impl ArtifactRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn path_for(dir: &Path, label: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        dir.join(format!("{}-{}.png", stamp, sanitize(label)))
    }

    pub async fn try_capture(
        &self,
        page: &dyn PageController,
        label: &str,
    ) -> Result<Option<PathBuf>, FlowError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| FlowError::Artifact {
                label: label.to_string(),
                reason: err.to_string(),
            })?;
        let path = Self::path_for(dir, label);
        page.screenshot(&path, true)
            .await
            .map_err(|err| FlowError::Artifact {
                label: label.to_string(),
                reason: err.to_string(),
            })?;
        debug!(path = %path.display(), "screenshot saved");
        Ok(Some(path))
    }

    /// Best effort: a failed screenshot is logged and yields `None`.
    pub async fn capture(&self, page: &dyn PageController, label: &str) -> Option<PathBuf> {
        match self.try_capture(page, label).await {
            Ok(path) => path,
            Err(err) => {
                warn!(label, %err, "screenshot failed");
                None
            }
        }
    }
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "step".to_string()
    } else {
        trimmed.to_string()
    }
}
