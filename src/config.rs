//! Configuration model
//!
//! Loaded from JSON or YAML; every key is optional at parse time and checked
//! when a run needs it.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use cdp_adapter::CookieParam;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that replaces `discord_webhook`.
pub const WEBHOOK_ENV: &str = "RENEW_PILOT_DISCORD_WEBHOOK";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A key every run needs is absent or blank
    #[error("missing required configuration key '{0}'")]
    Missing(&'static str),

    #[error("failed to parse {format} config: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("invalid cookie configuration: {0}")]
    Cookie(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Manage page of the service to renew.
    pub service_manage_url: Option<String>,
    /// Site root; cookie domain comes from its host.
    pub base_url: Option<String>,
    pub cookies: BTreeMap<String, String>,
    /// Step key (`renew`, `create_invoice`, `pay`) to selector override.
    pub selectors: BTreeMap<String, String>,
    pub http: HttpConfig,
    pub paths: PathsConfig,
    pub discord_webhook: Option<String>,
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub log_file: Option<PathBuf>,
    pub screenshot_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

/// Millisecond timeouts for element probes and post-click settling.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub element_ms: u64,
    pub settle_ms: u64,
    pub fallback_delay_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            element_ms: 5_000,
            settle_ms: 8_000,
            fallback_delay_ms: 1_200,
        }
    }
}

impl Config {
    /// Parse `content`, choosing JSON or YAML from the file extension.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(content).map_err(|err| ConfigError::Parse {
                format: "json",
                reason: err.to_string(),
            })
        } else if content.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(content).map_err(|err| ConfigError::Parse {
                format: "yaml",
                reason: err.to_string(),
            })
        }
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(webhook) = env::var(WEBHOOK_ENV) {
            if !webhook.trim().is_empty() {
                self.discord_webhook = Some(webhook.trim().to_string());
            }
        }
    }

    pub fn manage_url(&self) -> Result<&str, ConfigError> {
        non_blank(self.service_manage_url.as_deref()).ok_or(ConfigError::Missing("service_manage_url"))
    }

    pub fn webhook(&self) -> Option<&str> {
        non_blank(self.discord_webhook.as_deref())
    }

    /// Configured cookies scoped to the site; blank values are skipped.
    ///
    /// The domain comes from `base_url`, or from the manage URL when no base
    /// URL is configured.
    pub fn site_cookies(&self) -> Result<Vec<CookieParam>, ConfigError> {
        let site = non_blank(self.base_url.as_deref())
            .or_else(|| non_blank(self.service_manage_url.as_deref()))
            .ok_or(ConfigError::Missing("base_url"))?;
        self.cookies
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(name, value)| {
                CookieParam::for_site(name.as_str(), value.as_str(), site)
                    .map_err(|err| ConfigError::Cookie(err.to_string()))
            })
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_yaml_share_the_model() {
        let json = r#"{
            "service_manage_url": "https://portal.example/manage/7",
            "base_url": "https://portal.example",
            "cookies": {"session": "abc", "empty": ""},
            "selectors": {"pay": "text=/Régler|Pay/i"},
            "timeouts": {"element_ms": 2500}
        }"#;
        let from_json = Config::parse(json, Path::new("config.json")).unwrap();
        assert_eq!(from_json.manage_url().unwrap(), "https://portal.example/manage/7");
        assert_eq!(from_json.timeouts.element_ms, 2_500);
        assert_eq!(from_json.timeouts.settle_ms, 8_000);
        assert_eq!(from_json.paths.screenshot_dir, PathBuf::from("screenshots"));

        let yaml = "service_manage_url: https://portal.example/manage/7\nhttp:\n  user_agent: Mozilla/5.0\npaths:\n  log_file: logs/renew.log\n";
        let from_yaml = Config::parse(yaml, Path::new("config/config.yaml")).unwrap();
        assert_eq!(from_yaml.http.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(from_yaml.paths.log_file, Some(PathBuf::from("logs/renew.log")));
    }

    #[test]
    fn blank_manage_url_is_missing() {
        let config = Config::parse("service_manage_url: '  '", Path::new("c.yaml")).unwrap();
        assert!(matches!(
            config.manage_url(),
            Err(ConfigError::Missing("service_manage_url"))
        ));
        assert!(Config::default().manage_url().is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = Config::parse("{ not json", Path::new("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "json", .. }));
    }

    #[test]
    fn cookies_are_scoped_to_the_base_host() {
        let mut config = Config {
            base_url: Some("https://portal.example/clientarea".to_string()),
            ..Config::default()
        };
        config.cookies.insert("session".to_string(), "abc".to_string());
        config.cookies.insert("blank".to_string(), " ".to_string());

        let cookies = config.site_cookies().unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "session");
        assert_eq!(cookies[0].domain.as_deref(), Some("portal.example"));
        assert_eq!(cookies[0].path.as_deref(), Some("/"));
    }

    #[test]
    fn cookies_fall_back_to_the_manage_url() {
        let mut config = Config {
            service_manage_url: Some("https://manage.example/service/1".to_string()),
            ..Config::default()
        };
        config.cookies.insert("sid".to_string(), "1".to_string());
        let cookies = config.site_cookies().unwrap();
        assert_eq!(cookies[0].domain.as_deref(), Some("manage.example"));
    }
}
