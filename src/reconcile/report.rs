//! What a reconciliation run did.

use crate::error::SceneError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Collection,
    Scene,
    Input,
    SceneItem,
    Filter,
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    /// Already present in OBS
    Skipped,
    /// Existing resource updated in place
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub scene: String,
    pub resource: String,
    pub kind: ResourceKind,
    pub action: Action,
}

#[derive(Debug, Default)]
pub struct ReconciliationReport {
    /// Collection actually used in OBS (may differ after re-suffixing)
    pub collection_name: String,
    pub outcomes: Vec<Outcome>,
    /// Per-scene failures; each aborted the rest of its scene
    pub failures: Vec<SceneError>,
    /// Steps obs-websocket cannot perform, e.g. hotkey bindings
    pub unsupported: Vec<String>,
    /// Stopped early by the cancel flag
    pub cancelled: bool,
}

impl ReconciliationReport {
    pub fn new(collection_name: &str) -> Self {
        Self {
            collection_name: collection_name.to_string(),
            ..Default::default()
        }
    }

    pub(super) fn record(&mut self, scene: &str, resource: &str, kind: ResourceKind, action: Action) {
        tracing::debug!("{:?} {:?} '{}' in '{}'", action, kind, resource, scene);
        self.outcomes.push(Outcome {
            scene: scene.to_string(),
            resource: resource.to_string(),
            kind,
            action,
        });
    }

    pub fn count(&self, action: Action) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn created(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.action == Action::Created)
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collection: {}", self.collection_name)?;
        writeln!(
            f,
            "  created {}, updated {}, skipped {}",
            self.count(Action::Created),
            self.count(Action::Updated),
            self.count(Action::Skipped)
        )?;
        for failure in &self.failures {
            writeln!(f, "  failed: {failure}")?;
        }
        for step in &self.unsupported {
            writeln!(f, "  unsupported: {step}")?;
        }
        if self.cancelled {
            writeln!(f, "  cancelled before completion")?;
        }
        Ok(())
    }
}

/// Result of [`cleanup`](super::cleanup).
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub kept: String,
    pub failures: Vec<SceneError>,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Removed {} scenes, kept '{}'", self.removed.len(), self.kept)?;
        for failure in &self.failures {
            writeln!(f, "  failed: {failure}")?;
        }
        Ok(())
    }
}
