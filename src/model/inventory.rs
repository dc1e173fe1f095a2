//! Capture devices available to the collection, grouped by family.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Camera,
    Screen,
    Audio,
}

impl DeviceFamily {
    pub const ALL: [DeviceFamily; 3] = [Self::Camera, Self::Screen, Self::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Screen => "screen",
            Self::Audio => "audio",
        }
    }

    /// Name of the Source Scene owning this family's primary device.
    pub fn scene_name(&self) -> &'static str {
        match self {
            Self::Camera => "📹 Camera",
            Self::Screen => "🖥️ Screen",
            Self::Audio => "🎤 Audio",
        }
    }

    fn default_device_name(&self) -> &'static str {
        match self {
            Self::Camera => "Camera Device",
            Self::Screen => "Screen Capture",
            Self::Audio => "Microphone",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capture device as OBS knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Stable identifier; unique across the inventory
    pub id: String,
    /// OBS input name
    pub name: String,
    /// OBS input kind, e.g. `v4l2_source`
    pub input_kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
}

/// `[inventory]` of the settings file. A `[[inventory.<family>]]` table
/// overrides whatever OBS reports for that family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Ask OBS for its capture devices before building
    pub detect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<Vec<DeviceSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<Vec<DeviceSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<DeviceSpec>>,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            detect: true,
            camera: None,
            screen: None,
            audio: None,
        }
    }
}

impl InventorySettings {
    pub fn configured(&self, family: DeviceFamily) -> Option<&[DeviceSpec]> {
        match family {
            DeviceFamily::Camera => self.camera.as_deref(),
            DeviceFamily::Screen => self.screen.as_deref(),
            DeviceFamily::Audio => self.audio.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn input_kind(&self, family: DeviceFamily) -> &'static str {
        match (self, family) {
            (Self::Linux, DeviceFamily::Camera) => "v4l2_source",
            (Self::Windows, DeviceFamily::Camera) => "dshow_input",
            (Self::MacOs, DeviceFamily::Camera) => "av_capture_input_v2",
            (Self::Linux, DeviceFamily::Screen) => "xshm_input",
            (Self::Windows, DeviceFamily::Screen) => "monitor_capture",
            (Self::MacOs, DeviceFamily::Screen) => "screen_capture",
            (Self::Linux, DeviceFamily::Audio) => "pulse_input_capture",
            (Self::Windows, DeviceFamily::Audio) => "wasapi_input_capture",
            (Self::MacOs, DeviceFamily::Audio) => "coreaudio_input_capture",
        }
    }

    /// List property naming the device of an input, when OBS exposes one.
    pub fn device_property(&self, family: DeviceFamily) -> Option<&'static str> {
        match (self, family) {
            (_, DeviceFamily::Screen) => None,
            (Self::Windows, DeviceFamily::Camera) => Some("video_device_id"),
            (Self::MacOs, DeviceFamily::Camera) => Some("device"),
            (Self::Linux, DeviceFamily::Camera) | (_, DeviceFamily::Audio) => Some("device_id"),
        }
    }

    /// Input kind used for "no source" placeholders.
    pub fn text_kind(&self) -> &'static str {
        match self {
            Self::Windows => "text_gdiplus_v2",
            Self::Linux | Self::MacOs => "text_ft2_source_v2",
        }
    }
}

/// Resolved devices per family.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInventory {
    pub platform: Platform,
    camera: Vec<DeviceSpec>,
    screen: Vec<DeviceSpec>,
    audio: Vec<DeviceSpec>,
}

impl SourceInventory {
    pub fn empty(platform: Platform) -> Self {
        Self {
            platform,
            camera: Vec::new(),
            screen: Vec::new(),
            audio: Vec::new(),
        }
    }

    /// Configured devices; a family without a table gets one platform default.
    pub fn from_settings(settings: &InventorySettings, platform: Platform) -> Self {
        let pick = |family: DeviceFamily| match settings.configured(family) {
            Some(devices) => devices.to_vec(),
            None => vec![Self::default_device(platform, family)],
        };
        Self {
            platform,
            camera: pick(DeviceFamily::Camera),
            screen: pick(DeviceFamily::Screen),
            audio: pick(DeviceFamily::Audio),
        }
    }

    pub fn default_device(platform: Platform, family: DeviceFamily) -> DeviceSpec {
        DeviceSpec {
            id: format!("{family}-0"),
            name: family.default_device_name().to_string(),
            input_kind: platform.input_kind(family).to_string(),
            settings: Map::new(),
        }
    }

    pub fn with_device(mut self, family: DeviceFamily, device: DeviceSpec) -> Self {
        self.family_mut(family).push(device);
        self
    }

    pub fn replace(mut self, family: DeviceFamily, devices: Vec<DeviceSpec>) -> Self {
        *self.family_mut(family) = devices;
        self
    }

    pub fn without(mut self, family: DeviceFamily) -> Self {
        self.family_mut(family).clear();
        self
    }

    pub fn devices(&self, family: DeviceFamily) -> &[DeviceSpec] {
        match family {
            DeviceFamily::Camera => &self.camera,
            DeviceFamily::Screen => &self.screen,
            DeviceFamily::Audio => &self.audio,
        }
    }

    fn family_mut(&mut self, family: DeviceFamily) -> &mut Vec<DeviceSpec> {
        match family {
            DeviceFamily::Camera => &mut self.camera,
            DeviceFamily::Screen => &mut self.screen,
            DeviceFamily::Audio => &mut self.audio,
        }
    }
}
