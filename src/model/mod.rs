//! In-memory scene collection.
//!
//! Topology: every physical device lives in exactly one Source Scene.
//! Session Scenes only reference Source Scenes, carry their own overlay, and
//! never declare a device themselves. [`SceneCollection::validate`] enforces
//! this before anything reaches OBS.

mod builder;
mod export;
mod inventory;
mod layout;

pub use builder::{build, disambiguate, generate_name, slugify, split_generation, BuildInput};
pub use export::{to_obs_json, write_obs_json};
pub use inventory::{DeviceFamily, DeviceSpec, InventorySettings, Platform, SourceInventory};
pub use layout::{Crop, LayoutVariant, Transform, CANVAS_HEIGHT, CANVAS_WIDTH};

use crate::error::{SceneError, SceneResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the scene between the Source and Session groups
pub const SEPARATOR_SCENE: &str = "━━━━━━━━ SESSION SCENES ━━━━━━━━";

/// Browser source dimensions and frame rate for overlays
pub const OVERLAY_WIDTH: u32 = 1920;
pub const OVERLAY_HEIGHT: u32 = 1080;
pub const OVERLAY_FPS: u32 = 30;

// ────────────────────────────────────────────────────────────────────
// Roles
// ────────────────────────────────────────────────────────────────────

/// Session Scene role. Variant order is scene order; custom roles sort last,
/// alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SceneRole {
    Intro,
    TalkingHead,
    CodeDemo,
    ScreenOnly,
    DualCam,
    Brb,
    Outro,
    Custom(String),
}

impl SceneRole {
    pub const STANDARD: [SceneRole; 7] = [
        Self::Intro,
        Self::TalkingHead,
        Self::CodeDemo,
        Self::ScreenOnly,
        Self::DualCam,
        Self::Brb,
        Self::Outro,
    ];

    pub fn from_id(id: &str) -> Self {
        match id {
            "intro" => Self::Intro,
            "talking-head" => Self::TalkingHead,
            "code-demo" => Self::CodeDemo,
            "screen-only" => Self::ScreenOnly,
            "dual-cam" => Self::DualCam,
            "brb" => Self::Brb,
            "outro" => Self::Outro,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Template file stem.
    pub fn id(&self) -> &str {
        match self {
            Self::Intro => "intro",
            Self::TalkingHead => "talking-head",
            Self::CodeDemo => "code-demo",
            Self::ScreenOnly => "screen-only",
            Self::DualCam => "dual-cam",
            Self::Brb => "brb",
            Self::Outro => "outro",
            Self::Custom(id) => id,
        }
    }

    pub fn scene_name(&self) -> String {
        match self {
            Self::Intro => "🎬 Intro Scene".to_string(),
            Self::TalkingHead => "👤 Talking Head".to_string(),
            Self::CodeDemo => "💻 Code Demo".to_string(),
            Self::ScreenOnly => "🖥️ Screen Only".to_string(),
            Self::DualCam => "👥 Dual Camera".to_string(),
            Self::Brb => "📺 BRB / Technical".to_string(),
            Self::Outro => "🎯 Outro Scene".to_string(),
            Self::Custom(id) => format!("🎨 {}", title_case(id)),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Intro => "Opening title card",
            Self::TalkingHead => "Full camera with lower third",
            Self::CodeDemo => "Screen with camera inset",
            Self::ScreenOnly => "Full screen capture",
            Self::DualCam => "Two sources side by side",
            Self::Brb => "Break screen, microphone hidden",
            Self::Outro => "Closing card",
            Self::Custom(_) => "Centered camera",
        }
    }
}

impl fmt::Display for SceneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

fn title_case(id: &str) -> String {
    id.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ────────────────────────────────────────────────────────────────────
// Items and scenes
// ────────────────────────────────────────────────────────────────────

/// One filter in a source's chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub name: String,
    pub kind: String,
    pub settings: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Physical capture device; Source Scenes only
    Device {
        family: DeviceFamily,
        device: DeviceSpec,
    },
    Browser {
        url: String,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// Nested reference to a Source Scene
    SceneRef { scene: String },
    /// Stands in for a missing device
    Placeholder {
        family: DeviceFamily,
        input_kind: String,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceItem {
    /// OBS source name: input name, or the referenced scene's name
    pub name: String,
    pub kind: SourceKind,
    pub transform: Transform,
    pub visible: bool,
    pub filters: Vec<Filter>,
}

impl SourceItem {
    pub fn scene_ref(scene: &str, transform: Transform) -> Self {
        Self {
            name: scene.to_string(),
            kind: SourceKind::SceneRef {
                scene: scene.to_string(),
            },
            transform,
            visible: true,
            filters: Vec::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// OBS input kind and settings when this item creates an input.
    pub fn input(&self) -> Option<(&str, Value)> {
        match &self.kind {
            SourceKind::Device { device, .. } => Some((
                device.input_kind.as_str(),
                Value::Object(device.settings.clone()),
            )),
            SourceKind::Browser {
                url,
                width,
                height,
                fps,
            } => Some((
                "browser_source",
                serde_json::json!({
                    "url": url,
                    "width": width,
                    "height": height,
                    "fps": fps,
                    "shutdown_source_when_not_visible": true,
                    "restart_when_active": true,
                }),
            )),
            SourceKind::Placeholder {
                input_kind, text, ..
            } => Some((input_kind.as_str(), serde_json::json!({ "text": text }))),
            SourceKind::SceneRef { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SceneKind {
    Source(DeviceFamily),
    Session(String),
    Separator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneTemplate {
    pub name: String,
    pub kind: SceneKind,
    /// Bottom to top
    pub items: Vec<SourceItem>,
    pub hotkey: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub name: String,
    pub kind: String,
    pub duration_ms: Option<u32>,
}

impl Transition {
    pub fn fade(duration_ms: u32) -> Self {
        Self {
            name: "Fade".to_string(),
            kind: "fade_transition".to_string(),
            duration_ms: Some(duration_ms),
        }
    }

    pub fn cut() -> Self {
        Self {
            name: "Cut".to_string(),
            kind: "cut_transition".to_string(),
            duration_ms: None,
        }
    }
}

/// Everything one session needs, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneCollection {
    pub label: String,
    /// `<slug>-<hex8>`
    pub name: String,
    /// Token shared by every resource created for this collection
    pub generation: String,
    pub scenes: Vec<SceneTemplate>,
    /// First entry is the default
    pub transitions: Vec<Transition>,
    /// Families that fell back to a placeholder
    pub degraded: Vec<DeviceFamily>,
}

impl SceneCollection {
    pub fn scene(&self, name: &str) -> Option<&SceneTemplate> {
        self.scenes.iter().find(|s| s.name == name)
    }

    pub fn default_transition(&self) -> Option<&Transition> {
        self.transitions.first()
    }

    /// Check names and the nested topology.
    pub fn validate(&self) -> SceneResult<()> {
        let mut names = BTreeSet::new();
        let mut sources_seen = BTreeSet::new();
        let mut device_owner: BTreeMap<&str, &str> = BTreeMap::new();
        let mut input_owner: BTreeMap<&str, &str> = BTreeMap::new();

        for scene in &self.scenes {
            if !names.insert(scene.name.as_str()) {
                return Err(topology(&scene.name, "duplicate scene name"));
            }

            for item in &scene.items {
                // OBS input names are unique per collection
                if item.input().is_some() {
                    if let Some(owner) = input_owner.insert(&item.name, &scene.name) {
                        return Err(topology(
                            &scene.name,
                            format!("input name '{}' already used in '{owner}'", item.name),
                        ));
                    }
                }
                match (&scene.kind, &item.kind) {
                    (SceneKind::Source(_), SourceKind::Device { device, .. }) => {
                        if let Some(owner) = device_owner.insert(&device.id, &scene.name) {
                            return Err(topology(
                                &scene.name,
                                format!("device '{}' already owned by '{owner}'", device.id),
                            ));
                        }
                    }
                    (_, SourceKind::Device { device, .. }) => {
                        return Err(topology(
                            &scene.name,
                            format!("device '{}' declared outside a Source Scene", device.id),
                        ));
                    }
                    (_, SourceKind::SceneRef { scene: target }) => {
                        if !sources_seen.contains(target.as_str()) {
                            return Err(topology(
                                &scene.name,
                                format!("reference to unknown Source Scene '{target}'"),
                            ));
                        }
                    }
                    _ => {}
                }
            }

            if matches!(scene.kind, SceneKind::Source(_)) {
                sources_seen.insert(scene.name.as_str());
            }
        }
        Ok(())
    }
}

fn topology(scene: &str, reason: impl fmt::Display) -> SceneError {
    SceneError::invalid_config(format!("scene '{scene}'"), reason)
}
