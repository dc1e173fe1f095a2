//! Builds a [`SceneCollection`] from rendered roles and the device inventory.

use super::inventory::{DeviceFamily, DeviceSpec, SourceInventory};
use super::layout::{LayoutVariant, Transform};
use super::{
    Filter, SceneCollection, SceneKind, SceneRole, SceneTemplate, SourceItem, SourceKind,
    Transition, OVERLAY_FPS, OVERLAY_HEIGHT, OVERLAY_WIDTH, SEPARATOR_SCENE,
};
use crate::error::{SceneError, SceneResult};
use serde_json::json;
use std::collections::BTreeSet;

/// Re-suffix attempts before a collision is reported
const MAX_NAME_ATTEMPTS: usize = 8;

/// Default fade between scenes
const FADE_MS: u32 = 300;

/// Highest function key bound to a scene
const MAX_HOTKEY: usize = 12;

pub struct BuildInput<'a> {
    pub label: &'a str,
    /// Disambiguated collection name (see [`generate_name`])
    pub name: &'a str,
    /// Role ids from the rendered manifest
    pub roles: &'a [String],
    /// URL prefix the overlay pages are served from, no trailing slash required
    pub asset_base: &'a str,
    pub variant: LayoutVariant,
}

/// Kebab-case slug of a label; never empty.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "session".to_string()
    } else {
        slug.to_string()
    }
}

fn random_suffix() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// `<slug>-<hex8>`
pub fn generate_name(label: &str) -> String {
    format!("{}-{}", slugify(label), random_suffix())
}

/// Split `<stem>-<hex8>` into stem and generation token.
pub fn split_generation(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('-') {
        Some((stem, suffix)) if suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit()) => {
            (stem, Some(suffix))
        }
        _ => (name, None),
    }
}

/// Return `name`, or a re-suffixed variant of it that is not in `taken`.
pub fn disambiguate(name: &str, taken: &BTreeSet<String>) -> SceneResult<String> {
    if !taken.contains(name) {
        return Ok(name.to_string());
    }
    tracing::warn!("{}", SceneError::CollectionNameCollision { name: name.to_string() });

    let (stem, _) = split_generation(name);
    for _ in 0..MAX_NAME_ATTEMPTS {
        let candidate = format!("{stem}-{}", random_suffix());
        if !taken.contains(&candidate) {
            tracing::info!("Using collection name {candidate}");
            return Ok(candidate);
        }
    }
    Err(SceneError::CollectionNameCollision {
        name: name.to_string(),
    })
}

/// Standard microphone chain: noise suppression, compressor, limiter.
fn microphone_filters() -> Vec<Filter> {
    vec![
        Filter {
            name: "Noise Suppression".to_string(),
            kind: "noise_suppress_filter_v2".to_string(),
            settings: json!({ "method": "rnnoise" }),
        },
        Filter {
            name: "Compressor".to_string(),
            kind: "compressor_filter".to_string(),
            settings: json!({
                "ratio": 10.0,
                "threshold": -18.0,
                "attack_time": 6,
                "release_time": 60,
            }),
        },
        Filter {
            name: "Limiter".to_string(),
            kind: "limiter_filter".to_string(),
            settings: json!({ "threshold": -6.0, "release_time": 60 }),
        },
    ]
}

/// Build the collection. Missing devices degrade to placeholders; the only
/// errors come from a collection that breaks the nested topology.
pub fn build(input: &BuildInput<'_>, inventory: &SourceInventory) -> SceneResult<SceneCollection> {
    let mut scenes = Vec::new();
    let mut degraded = Vec::new();

    for family in DeviceFamily::ALL {
        let devices = inventory.devices(family);
        if devices.is_empty() {
            tracing::warn!(
                "{}; using a placeholder",
                SceneError::DeviceNotFound {
                    family: family.to_string()
                }
            );
            degraded.push(family);
            scenes.push(placeholder_scene(family, inventory));
            continue;
        }
        for (i, device) in devices.iter().enumerate() {
            scenes.push(source_scene(family, i, device));
        }
    }

    scenes.push(SceneTemplate {
        name: SEPARATOR_SCENE.to_string(),
        kind: SceneKind::Separator,
        items: Vec::new(),
        hotkey: None,
        description: Some("Divider between source and session scenes".to_string()),
    });

    let roles: BTreeSet<SceneRole> = input.roles.iter().map(|r| SceneRole::from_id(r)).collect();
    let second_camera = (inventory.devices(DeviceFamily::Camera).len() > 1)
        .then(|| source_scene_name(DeviceFamily::Camera, 1));
    let base = input.asset_base.trim_end_matches('/');

    for (i, role) in roles.iter().enumerate() {
        let mut items = role_sources(role, input.variant, second_camera.as_deref());
        items.push(SourceItem {
            name: format!("Overlay: {}", role.id()),
            kind: SourceKind::Browser {
                url: format!("{base}/{}.html", role.id()),
                width: OVERLAY_WIDTH,
                height: OVERLAY_HEIGHT,
                fps: OVERLAY_FPS,
            },
            transform: Transform::full_canvas(),
            visible: true,
            filters: Vec::new(),
        });

        let audio = SourceItem::scene_ref(DeviceFamily::Audio.scene_name(), Transform::full_canvas());
        items.push(if *role == SceneRole::Brb { audio.hidden() } else { audio });

        scenes.push(SceneTemplate {
            name: role.scene_name(),
            kind: SceneKind::Session(role.id().to_string()),
            items,
            hotkey: (i < MAX_HOTKEY).then(|| format!("F{}", i + 1)),
            description: Some(role.description().to_string()),
        });
    }

    let generation = split_generation(input.name).1.unwrap_or(input.name).to_string();

    let collection = SceneCollection {
        label: input.label.to_string(),
        name: input.name.to_string(),
        generation,
        scenes,
        transitions: vec![Transition::fade(FADE_MS), Transition::cut()],
        degraded,
    };
    collection.validate()?;

    tracing::debug!(
        "Built collection {} with {} scenes",
        collection.name,
        collection.scenes.len()
    );
    Ok(collection)
}

fn source_scene_name(family: DeviceFamily, index: usize) -> String {
    if index == 0 {
        family.scene_name().to_string()
    } else {
        format!("{} {}", family.scene_name(), index + 1)
    }
}

fn source_scene(family: DeviceFamily, index: usize, device: &DeviceSpec) -> SceneTemplate {
    let (transform, filters) = match family {
        DeviceFamily::Audio => (Transform::full_canvas(), microphone_filters()),
        DeviceFamily::Camera | DeviceFamily::Screen => (Transform::fit_canvas(), Vec::new()),
    };
    SceneTemplate {
        name: source_scene_name(family, index),
        kind: SceneKind::Source(family),
        items: vec![SourceItem {
            name: device.name.clone(),
            kind: SourceKind::Device {
                family,
                device: device.clone(),
            },
            transform,
            visible: true,
            filters,
        }],
        hotkey: None,
        description: Some(format!("Configure the {family} device here; used by every session scene")),
    }
}

fn placeholder_scene(family: DeviceFamily, inventory: &SourceInventory) -> SceneTemplate {
    let text = format!("No {family} device");
    SceneTemplate {
        name: family.scene_name().to_string(),
        kind: SceneKind::Source(family),
        items: vec![SourceItem {
            name: format!("{} (no source)", family.scene_name()),
            kind: SourceKind::Placeholder {
                family,
                input_kind: inventory.platform.text_kind().to_string(),
                text,
            },
            transform: Transform::centered_half(),
            visible: true,
            filters: Vec::new(),
        }],
        hotkey: None,
        description: Some(format!("Placeholder: add a {family} device and re-run")),
    }
}

/// Source Scene references for a role, bottom to top, before the overlay.
fn role_sources(role: &SceneRole, variant: LayoutVariant, second_camera: Option<&str>) -> Vec<SourceItem> {
    let camera = DeviceFamily::Camera.scene_name();
    let screen = DeviceFamily::Screen.scene_name();

    match role {
        SceneRole::Intro | SceneRole::Brb | SceneRole::Outro => Vec::new(),
        SceneRole::TalkingHead => vec![SourceItem::scene_ref(camera, Transform::full_canvas())],
        SceneRole::CodeDemo => vec![
            SourceItem::scene_ref(screen, Transform::full_canvas()),
            SourceItem::scene_ref(camera, Transform::picture_in_picture(variant)),
        ],
        SceneRole::ScreenOnly => vec![SourceItem::scene_ref(screen, Transform::full_canvas())],
        SceneRole::DualCam => vec![
            SourceItem::scene_ref(camera, Transform::split(0)),
            SourceItem::scene_ref(second_camera.unwrap_or(screen), Transform::split(1)),
        ],
        SceneRole::Custom(_) => vec![SourceItem::scene_ref(camera, Transform::centered_half())],
    }
}
