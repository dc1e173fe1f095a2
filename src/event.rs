//! Event configuration: the operator-authored description of one session.
//!
//! Loaded once per run from TOML or JSON and validated before rendering.
//! Optional fields that are unset are absent from the placeholder tree, so a
//! template referencing them fails to render instead of printing nothing.

use crate::error::{SceneError, SceneResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
    pub event: EventInfo,
    pub presenter: Presenter,
    #[serde(default)]
    pub branding: Branding,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub messages: Messages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// e.g. "Live Session", "Workshop"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Presenter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Branding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
    #[serde(default)]
    pub social_links: Vec<SocialLink>,
}

fn default_primary_color() -> String {
    "#1e3a8a".to_string()
}

fn default_accent_color() -> String {
    "#f59e0b".to_string()
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            company_name: None,
            tagline: None,
            website: None,
            primary_color: default_primary_color(),
            accent_color: default_accent_color(),
            social_links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialLink {
    pub icon: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<TechItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TechItem {
    pub icon: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Messages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thanks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thanks_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_we_covered: Option<String>,
}

impl EventConfig {
    /// Load from a `.toml` or `.json` file and validate.
    pub fn load(path: &Path) -> SceneResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let display = path.display().to_string();

        let config: EventConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| SceneError::invalid_config(&display, e))?,
            Some("toml") | None => {
                toml::from_str(&contents).map_err(|e| SceneError::invalid_config(&display, e))?
            }
            Some(other) => {
                return Err(SceneError::invalid_config(
                    display,
                    format!("unsupported file extension '.{other}' (expected .toml or .json)"),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> SceneResult<Self> {
        let config: EventConfig =
            toml::from_str(contents).map_err(|e| SceneError::invalid_config("<inline>", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required values and shapes that serde cannot express.
    pub fn validate(&self) -> SceneResult<()> {
        require_text("event.title", &self.event.title)?;
        require_text("presenter.name", &self.presenter.name)?;
        require_color("branding.primary_color", &self.branding.primary_color)?;
        require_color("branding.accent_color", &self.branding.accent_color)?;

        for (i, topic) in self.session.topics.iter().enumerate() {
            require_text(&format!("session.topics[{i}]"), topic)?;
        }
        for (i, item) in self.session.tech_stack.iter().enumerate() {
            require_text(&format!("session.tech_stack[{i}].label"), &item.label)?;
        }
        for (i, link) in self.branding.social_links.iter().enumerate() {
            require_text(&format!("branding.social_links[{i}].url"), &link.url)?;
        }
        Ok(())
    }

    /// Placeholder lookup tree. Unset optional fields are absent.
    pub fn placeholder_tree(&self) -> SceneResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn require_text(path: &str, value: &str) -> SceneResult<()> {
    if value.trim().is_empty() {
        return Err(SceneError::invalid_config(path, "must not be empty"));
    }
    Ok(())
}

fn require_color(path: &str, value: &str) -> SceneResult<()> {
    let hex = value.strip_prefix('#').unwrap_or("");
    let valid = matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(SceneError::invalid_config(
            path,
            format!("expected #rgb or #rrggbb, got '{value}'"),
        ));
    }
    Ok(())
}
