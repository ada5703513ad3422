use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to an element inside one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time view of an element returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub handle: ElementHandle,
    /// Lowercase tag name.
    pub tag: String,
    /// Normalized visible text.
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Texts of direct children (table cells, definition pairs, flex rows).
    #[serde(default)]
    pub cells: Vec<String>,
    pub visible: bool,
    pub enabled: bool,
}

const CLICKABLE_TAGS: &[&str] = &["button", "a", "input", "summary", "label"];
const CLICKABLE_ROLES: &[&str] = &["button", "link", "menuitem", "tab"];

impl ElementSnapshot {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or_default()
            .split_whitespace()
    }

    /// Visible, enabled and something a user could click.
    pub fn is_actionable(&self) -> bool {
        if !self.visible || !self.enabled {
            return false;
        }
        if CLICKABLE_TAGS.contains(&self.tag.as_str()) {
            return true;
        }
        if let Some(role) = self.attribute("role") {
            if CLICKABLE_ROLES.contains(&role.to_ascii_lowercase().as_str()) {
                return true;
            }
        }
        self.attributes.contains_key("onclick")
            || self.attribute("type") == Some("submit")
            || self.classes().any(|class| {
                let class = class.to_ascii_lowercase();
                class == "btn" || class.starts_with("btn-") || class.contains("button")
            })
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        let mut text: String = self.text.chars().take(40).collect();
        if self.text.chars().count() > 40 {
            text.push('…');
        }
        format!("<{}> \"{}\" ({})", self.tag, text, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: &str, attrs: &[(&str, &str)]) -> ElementSnapshot {
        ElementSnapshot {
            handle: ElementHandle("h1".to_string()),
            tag: tag.to_string(),
            text: "Renew".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cells: Vec::new(),
            visible: true,
            enabled: true,
        }
    }

    #[test]
    fn buttons_and_roles_are_actionable() {
        assert!(snapshot("button", &[]).is_actionable());
        assert!(snapshot("div", &[("role", "Button")]).is_actionable());
        assert!(snapshot("span", &[("class", "btn btn-primary")]).is_actionable());
        assert!(!snapshot("h2", &[]).is_actionable());
    }

    #[test]
    fn hidden_or_disabled_is_not_actionable() {
        let mut hidden = snapshot("button", &[]);
        hidden.visible = false;
        assert!(!hidden.is_actionable());

        let mut disabled = snapshot("button", &[]);
        disabled.enabled = false;
        assert!(!disabled.is_actionable());
    }
}
