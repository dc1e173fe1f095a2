//! Reconcile a [`SceneCollection`] against a live OBS instance.
//!
//! Live state is queried at the start of every run and never cached.
//! Absent resources are created, present ones are skipped, and resources of
//! other collections are never touched. A failure inside a scene is
//! attributed to that scene and the run moves on to the next one; a broken
//! connection ends the run.

mod devices;
mod discovery;
#[cfg(test)]
pub(crate) mod fake;
mod report;

pub use devices::{detect_inventory, DETECTION_SCENE};
pub use discovery::discover_roles;
pub use report::{Action, CleanupReport, Outcome, ReconciliationReport, ResourceKind};

use crate::config::LiveCollisionPolicy;
use crate::error::{SceneError, SceneResult};
use crate::model::{disambiguate, split_generation, SceneCollection, SceneTemplate, SourceItem};
use crate::obs::{ObsRequests, Transport};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation, checked between scenes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub on_live_collision: LiveCollisionPolicy,
    pub cancel: CancelFlag,
}

/// Live state of the current collection.
struct LiveState {
    scenes: BTreeSet<String>,
    inputs: BTreeSet<String>,
}

impl LiveState {
    fn query<T: Transport + ?Sized>(obs: &mut T) -> SceneResult<Self> {
        let scenes = obs.get_scene_list()?.into_iter().map(|s| s.scene_name).collect();
        let inputs = obs.get_input_list()?.into_iter().map(|i| i.input_name).collect();
        Ok(Self { scenes, inputs })
    }
}

/// Create whatever part of `collection` is missing from OBS.
pub fn reconcile<T: Transport + ?Sized>(
    obs: &mut T,
    collection: &SceneCollection,
    options: &ReconcileOptions,
) -> SceneResult<ReconciliationReport> {
    reconcile_with(obs, &collection.name, options, |_, _| Ok(collection.clone()))
}

/// [`reconcile`] for a collection that depends on the live OBS, such as one
/// built from detected devices. `build` runs inside the entered collection
/// and receives its name.
pub fn reconcile_with<T, F>(
    obs: &mut T,
    name: &str,
    options: &ReconcileOptions,
    build: F,
) -> SceneResult<ReconciliationReport>
where
    T: Transport + ?Sized,
    F: FnOnce(&mut T, &str) -> SceneResult<SceneCollection>,
{
    let version = obs.get_version()?;
    tracing::info!(
        "OBS {} (obs-websocket {})",
        version.obs_version,
        version.obs_web_socket_version
    );

    let (entered, action) = enter_collection(obs, name, options.on_live_collision)?;
    if entered != name {
        tracing::info!("Collection {} reconciled as {}", name, entered);
    }
    let mut report = ReconciliationReport::new(&entered);
    report.record(&entered, &entered, ResourceKind::Collection, action);

    let collection = build(obs, &entered)?;

    let mut live = LiveState::query(obs)?;

    for scene in &collection.scenes {
        if options.cancel.is_cancelled() {
            tracing::warn!("Cancelled; {} left as is", report.collection_name);
            report.cancelled = true;
            return Ok(report);
        }

        match reconcile_scene(obs, scene, &mut live, &mut report) {
            Ok(()) => {}
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => {
                tracing::error!("{}", e);
                report.failures.push(e);
            }
        }

        if let Some(key) = &scene.hotkey {
            report
                .unsupported
                .push(format!("hotkey {key} for '{}' (bind it in OBS settings)", scene.name));
        }
    }

    if let Some(transition) = collection.default_transition() {
        let applied = obs.set_current_scene_transition(&transition.name).and_then(|()| {
            match transition.duration_ms {
                Some(ms) => obs.set_current_scene_transition_duration(ms),
                None => Ok(()),
            }
        });
        match applied {
            Ok(()) => report.record("", &transition.name, ResourceKind::Transition, Action::Updated),
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => report
                .failures
                .push(SceneError::resource_failed("(transitions)", &transition.name, e)),
        }
    }

    tracing::info!(
        "Reconciled {}: {} created, {} skipped, {} failed",
        report.collection_name,
        report.count(Action::Created),
        report.count(Action::Skipped),
        report.failures.len()
    );
    Ok(report)
}

/// Switch to the collection named `name`, creating it when absent.
///
/// A live collection with exactly this name carries the same generation token
/// and is always entered, whatever the policy. With
/// [`LiveCollisionPolicy::Reuse`] a live collection of an earlier generation
/// sharing the stem is entered instead of creating a new one; with
/// [`LiveCollisionPolicy::Suffix`] earlier generations are left alone.
/// Returns the collection actually used.
pub fn enter_collection<T: Transport + ?Sized>(
    obs: &mut T,
    name: &str,
    policy: LiveCollisionPolicy,
) -> SceneResult<(String, Action)> {
    let list = obs.get_scene_collection_list()?;
    let current = list.current_scene_collection_name;
    let taken: BTreeSet<String> = list.scene_collections.into_iter().collect();

    let existing = if taken.contains(name) {
        Some(name.to_string())
    } else if policy == LiveCollisionPolicy::Reuse {
        earlier_generation(name, &current, &taken)
    } else {
        None
    };

    if let Some(existing) = existing {
        if current != existing {
            obs.set_current_scene_collection(&existing)?;
        }
        tracing::info!("Reusing scene collection {}", existing);
        return Ok((existing, Action::Skipped));
    }

    let name = disambiguate(name, &taken)?;
    obs.create_scene_collection(&name)?;
    tracing::info!("Created scene collection {}", name);
    Ok((name, Action::Created))
}

/// Live collection of another generation with the same stem; the current
/// collection wins, then the last by name.
fn earlier_generation(name: &str, current: &str, taken: &BTreeSet<String>) -> Option<String> {
    let (stem, generation) = split_generation(name);
    if generation.is_none() {
        return None;
    }
    let mut siblings = taken.iter().filter(|live| {
        let (live_stem, live_generation) = split_generation(live);
        live_stem == stem && live_generation.is_some()
    });
    if siblings.clone().any(|live| live == current) {
        return Some(current.to_string());
    }
    siblings.next_back().cloned()
}

fn reconcile_scene<T: Transport + ?Sized>(
    obs: &mut T,
    scene: &SceneTemplate,
    live: &mut LiveState,
    report: &mut ReconciliationReport,
) -> SceneResult<()> {
    let fail = |resource: &str, e: SceneError| {
        if e.is_transport_failure() {
            e
        } else {
            SceneError::resource_failed(&scene.name, resource, e)
        }
    };

    // source names already in the scene; empty for a new scene
    let present: BTreeSet<String> = if live.scenes.contains(&scene.name) {
        report.record(&scene.name, &scene.name, ResourceKind::Scene, Action::Skipped);
        obs.get_scene_item_list(&scene.name)
            .map_err(|e| fail(&scene.name, e))?
            .into_iter()
            .map(|item| item.source_name)
            .collect()
    } else {
        obs.create_scene(&scene.name).map_err(|e| fail(&scene.name, e))?;
        live.scenes.insert(scene.name.clone());
        report.record(&scene.name, &scene.name, ResourceKind::Scene, Action::Created);
        BTreeSet::new()
    };

    for item in &scene.items {
        if present.contains(&item.name) {
            report.record(&scene.name, &item.name, ResourceKind::SceneItem, Action::Skipped);
        } else {
            let id = place_item(obs, &scene.name, item, live, report).map_err(|e| fail(&item.name, e))?;
            obs.set_scene_item_transform(&scene.name, id, item.transform.to_obs())
                .and_then(|()| obs.set_scene_item_enabled(&scene.name, id, item.visible))
                .map_err(|e| fail(&item.name, e))?;
        }

        if !item.filters.is_empty() {
            apply_filters(obs, &scene.name, item, report).map_err(|e| fail(&item.name, e))?;
        }
    }
    Ok(())
}

/// Add `item` to the scene, creating its input the first time it is seen.
fn place_item<T: Transport + ?Sized>(
    obs: &mut T,
    scene: &str,
    item: &SourceItem,
    live: &mut LiveState,
    report: &mut ReconciliationReport,
) -> SceneResult<i64> {
    let Some((kind, settings)) = item.input() else {
        let id = obs.create_scene_item(scene, &item.name, item.visible)?;
        report.record(scene, &item.name, ResourceKind::SceneItem, Action::Created);
        return Ok(id);
    };

    if live.inputs.contains(&item.name) {
        // inputs are shared across scenes; refresh settings such as overlay URLs
        obs.set_input_settings(&item.name, &settings)?;
        report.record(scene, &item.name, ResourceKind::Input, Action::Updated);
        let id = obs.create_scene_item(scene, &item.name, item.visible)?;
        report.record(scene, &item.name, ResourceKind::SceneItem, Action::Created);
        return Ok(id);
    }

    let id = obs.create_input(scene, &item.name, kind, &settings, item.visible)?;
    live.inputs.insert(item.name.clone());
    report.record(scene, &item.name, ResourceKind::Input, Action::Created);
    Ok(id)
}

fn apply_filters<T: Transport + ?Sized>(
    obs: &mut T,
    scene: &str,
    item: &SourceItem,
    report: &mut ReconciliationReport,
) -> SceneResult<()> {
    let existing: BTreeSet<String> = obs
        .get_source_filter_list(&item.name)?
        .into_iter()
        .map(|f| f.filter_name)
        .collect();

    for filter in &item.filters {
        if existing.contains(&filter.name) {
            report.record(scene, &filter.name, ResourceKind::Filter, Action::Skipped);
            continue;
        }
        obs.create_source_filter(&item.name, &filter.name, &filter.kind, &filter.settings)?;
        report.record(scene, &filter.name, ResourceKind::Filter, Action::Created);
    }
    Ok(())
}

/// Remove every scene of `collection_name` except `protected_scene`.
///
/// OBS refuses to remove the last scene of a collection, so the protected
/// scene is created first when it does not exist.
pub fn cleanup<T: Transport + ?Sized>(
    obs: &mut T,
    collection_name: &str,
    protected_scene: &str,
) -> SceneResult<CleanupReport> {
    let list = obs.get_scene_collection_list()?;
    if !list.scene_collections.iter().any(|c| c == collection_name) {
        return Err(SceneError::invalid_config(
            "collection",
            format!("'{collection_name}' does not exist in OBS"),
        ));
    }
    if list.current_scene_collection_name != collection_name {
        obs.set_current_scene_collection(collection_name)?;
    }

    let scenes: Vec<String> = obs.get_scene_list()?.into_iter().map(|s| s.scene_name).collect();
    if !scenes.iter().any(|s| s == protected_scene) {
        obs.create_scene(protected_scene)?;
    }

    let mut report = CleanupReport {
        kept: protected_scene.to_string(),
        ..Default::default()
    };
    for scene in scenes.into_iter().filter(|s| s != protected_scene) {
        match obs.remove_scene(&scene) {
            Ok(()) => {
                tracing::info!("Removed scene {}", scene);
                report.removed.push(scene);
            }
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => report.failures.push(SceneError::resource_failed(&scene, &scene, e)),
        }
    }
    Ok(report)
}
