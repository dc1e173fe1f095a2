//! Scene collection file in the format OBS reads with Scene Collection > Import.
//!
//! Sources are linked by name; OBS assigns uuids on import. Unlike a
//! reconcile run, the file can carry the Session Scene hotkeys.

use super::layout::Transform;
use super::{SceneCollection, SceneKind, SceneTemplate, SourceItem};
use crate::error::SceneResult;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// `OBS_ALIGN_LEFT | OBS_ALIGN_TOP`
const ALIGN_TOP_LEFT: u32 = 5;
/// `OBS_BOUNDS_SCALE_INNER`
const BOUNDS_SCALE_INNER: u32 = 2;
const DEFAULT_TRANSITION_MS: u32 = 300;

fn scene_item(id: usize, item: &SourceItem) -> Value {
    let Transform {
        x,
        y,
        scale_x,
        scale_y,
        bounds,
        crop,
    } = item.transform;
    let (bounds_type, (bounds_w, bounds_h)) = match bounds {
        Some(b) => (BOUNDS_SCALE_INNER, b),
        None => (0, (0.0, 0.0)),
    };
    json!({
        "name": item.name,
        "id": id,
        "visible": item.visible,
        "locked": false,
        "rot": 0.0,
        "pos": { "x": x, "y": y },
        "scale": { "x": scale_x, "y": scale_y },
        "align": ALIGN_TOP_LEFT,
        "bounds_type": bounds_type,
        "bounds_align": 0,
        "bounds": { "x": bounds_w, "y": bounds_h },
        "crop_left": crop.left,
        "crop_top": crop.top,
        "crop_right": crop.right,
        "crop_bottom": crop.bottom,
        "private_settings": {},
    })
}

fn scene_source(scene: &SceneTemplate) -> Value {
    let items: Vec<Value> = scene
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| scene_item(i + 1, item))
        .collect();
    let hotkeys = match &scene.hotkey {
        Some(key) => json!({ "OBSBasic.SelectScene": [{ "key": format!("OBS_KEY_{key}") }] }),
        None => json!({}),
    };
    json!({
        "name": scene.name,
        "id": "scene",
        "versioned_id": "scene",
        "settings": {
            "id_counter": items.len(),
            "custom_size": false,
            "items": items,
        },
        "enabled": true,
        "muted": false,
        "volume": 1.0,
        "filters": [],
        "hotkeys": hotkeys,
    })
}

fn input_source(item: &SourceItem) -> Option<Value> {
    let (kind, settings) = item.input()?;
    let filters: Vec<Value> = item
        .filters
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "id": f.kind,
                "versioned_id": f.kind,
                "settings": f.settings,
                "enabled": true,
            })
        })
        .collect();
    Some(json!({
        "name": item.name,
        "id": kind,
        "versioned_id": kind,
        "settings": settings,
        "enabled": true,
        "muted": false,
        "volume": 1.0,
        "filters": filters,
        "hotkeys": {},
    }))
}

/// The collection as an OBS scene collection document.
pub fn to_obs_json(collection: &SceneCollection) -> Value {
    let mut sources: Vec<Value> = collection.scenes.iter().map(scene_source).collect();
    sources.extend(
        collection
            .scenes
            .iter()
            .flat_map(|s| &s.items)
            .filter_map(input_source),
    );

    let scene_order: Vec<Value> = collection
        .scenes
        .iter()
        .map(|s| json!({ "name": s.name }))
        .collect();

    // OBS opens on the first Session Scene
    let current = collection
        .scenes
        .iter()
        .find(|s| matches!(s.kind, SceneKind::Session(_)))
        .or_else(|| collection.scenes.first())
        .map(|s| s.name.as_str())
        .unwrap_or_default();

    let (transition, duration) = match collection.default_transition() {
        Some(t) => (t.name.as_str(), t.duration_ms.unwrap_or(DEFAULT_TRANSITION_MS)),
        None => ("Fade", DEFAULT_TRANSITION_MS),
    };

    json!({
        "name": collection.name,
        "current_scene": current,
        "current_program_scene": current,
        "current_transition": transition,
        "transition_duration": duration,
        "scene_order": scene_order,
        "sources": sources,
        "groups": [],
        "transitions": [],
        "quick_transitions": [],
    })
}

/// Write `<dir>/<name>.json`, replacing an earlier export of the same name.
pub fn write_obs_json(collection: &SceneCollection, dir: &Path) -> SceneResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", collection.name));
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(&to_obs_json(collection))?)?;
    fs::rename(&tmp, &path)?;
    tracing::info!("Exported {} to {}", collection.name, path.display());
    Ok(path)
}
