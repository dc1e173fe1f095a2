use crate::model::{InventorySettings, LayoutVariant};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current settings schema version for future migration support
const SETTINGS_VERSION: u32 = 1;

/// Default obs-websocket port (OBS 28+)
pub const DEFAULT_OBS_PORT: u16 = 4455;

/// Default port for the local content server
pub const DEFAULT_SERVER_PORT: u16 = 8080;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub obs: ObsSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub inventory: InventorySettings,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsSettings {
    /// Control endpoint host; loopback means "detect"
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Bounded wait for each request/response pair
    pub request_timeout_ms: u64,
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_OBS_PORT,
            password: None,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Forced bind address; unset lets the network resolver decide
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Grace period before in-flight requests are dropped on stop
    pub shutdown_grace_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            bind: None,
            shutdown_grace_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Published overlay location used when not running offline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_base_url: Option<String>,
    /// Parent directory for rendered asset sets
    pub output_root: PathBuf,
    /// Template directory; unset uses the bundled theme
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_dir: Option<PathBuf>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            remote_base_url: None,
            output_root: PathBuf::from("target").join("generated-scenes"),
            theme_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (e.g., "info", "debug", "obs_scenes_lib=debug,warn").
    pub level: String,
    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// What to do about live collections of earlier generations with the same
/// stem. A live collection with exactly the generated name is always entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveCollisionPolicy {
    /// Leave earlier generations alone and create the new collection
    #[default]
    Suffix,
    /// Reconcile into an earlier generation, skipping present scenes
    Reuse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Scene kept by cleanup (OBS needs at least one scene)
    pub protected_scene: String,
    pub on_live_collision: LiveCollisionPolicy,
    pub variant: LayoutVariant,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            protected_scene: "Scene".to_string(),
            on_live_collision: LiveCollisionPolicy::default(),
            variant: LayoutVariant::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            obs: ObsSettings::default(),
            server: ServerSettings::default(),
            assets: AssetSettings::default(),
            logging: LoggingSettings::default(),
            collection: CollectionSettings::default(),
            inventory: InventorySettings::default(),
        }
    }
}

/// Returns the path to the settings file: ~/.config/{app_name}/settings.toml
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(crate::app_constants::APP_NAME).join("settings.toml"))
}

/// Save settings to the given path.
/// Uses atomic writes (write to temp, then rename) to prevent corruption.
/// Keeps a .bak backup of the previous settings.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let contents =
        toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;

    let tmp_path = path.with_extension("toml.tmp");
    let bak_path = path.with_extension("toml.bak");

    fs::write(&tmp_path, &contents)
        .with_context(|| format!("Failed to write temp settings file: {}", tmp_path.display()))?;

    if path.exists() {
        let _ = fs::remove_file(&bak_path);
        fs::rename(path, &bak_path)
            .with_context(|| format!("Failed to backup settings file: {}", path.display()))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to finalize settings file: {}", path.display()))?;

    Ok(())
}

/// Load settings from `path` (or the default location), falling back to the
/// backup copy and then to defaults when nothing exists.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => p,
            None => return Ok(Settings::default()),
        },
    };

    let bak_path = path.with_extension("toml.bak");

    if !path.exists() {
        if bak_path.exists() {
            tracing::warn!("Settings missing, loading from backup: {}", bak_path.display());
            return load_from_path(&bak_path);
        }
        return Ok(Settings::default());
    }

    match load_from_path(&path) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            if bak_path.exists() {
                tracing::warn!("Settings corrupted ({:#}), loading from backup", e);
                return load_from_path(&bak_path);
            }
            Err(e)
        }
    }
}

fn load_from_path(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    let settings: Settings = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

    if settings.version > SETTINGS_VERSION {
        tracing::warn!(
            "Settings version {} is newer than supported version {}",
            settings.version,
            SETTINGS_VERSION
        );
    }

    Ok(settings)
}
