//! Error types shared across the pipeline.
//!
//! Render and build errors are raised before any network call. Reconcile
//! errors are attributed to the scene or source that failed.

use std::fmt;

/// Top-level error type for scene generation and injection.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("unresolved placeholders: {}", .paths.join(", "))]
    UnresolvedPlaceholder { paths: Vec<String> },

    #[error("no {family} device in the source inventory")]
    DeviceNotFound { family: String },

    #[error("network discovery ambiguous: {reason}")]
    NetworkDiscoveryAmbiguous { reason: String },

    #[error("could not connect to OBS at {host}:{port}: {reason}")]
    ControlConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("failed to create '{resource}' in scene '{scene}': {reason}")]
    ResourceCreateFailed {
        scene: String,
        resource: String,
        reason: String,
    },

    #[error("template '{template}' is malformed: {reason}")]
    TemplateSyntax { template: String, reason: String },

    #[error("collection name '{name}' already taken")]
    CollectionNameCollision { name: String },

    #[error("invalid configuration at '{path}': {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("OBS request {request_type} failed: {}", .comment.as_deref().unwrap_or("no comment"))]
    Request {
        request_type: String,
        code: u32,
        comment: Option<String>,
    },

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SceneError.
pub type SceneResult<T> = Result<T, SceneError>;

impl SceneError {
    pub fn invalid_config(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn resource_failed(
        scene: impl Into<String>,
        resource: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::ResourceCreateFailed {
            scene: scene.into(),
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors after which no further request on the same connection can succeed.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::Io(_) | Self::ControlConnectionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_lists_every_path() {
        let err = SceneError::UnresolvedPlaceholder {
            paths: vec!["event.title".into(), "presenter.name".into()],
        };
        assert_eq!(
            err.to_string(),
            "unresolved placeholders: event.title, presenter.name"
        );
    }

    #[test]
    fn connection_error_names_endpoint() {
        let err = SceneError::ControlConnectionFailed {
            host: "172.29.128.1".into(),
            port: 4455,
            reason: "refused".into(),
        };
        assert!(err.to_string().contains("172.29.128.1:4455"));
        assert!(err.is_transport_failure());
    }

    #[test]
    fn request_failures_keep_the_connection() {
        let rejected = SceneError::Request {
            request_type: "CreateScene".into(),
            code: 601,
            comment: None,
        };
        assert!(!rejected.is_transport_failure());
        assert!(!SceneError::resource_failed("Intro", "Overlay", "boom").is_transport_failure());
        assert!(SceneError::protocol("socket closed").is_transport_failure());
    }
}
