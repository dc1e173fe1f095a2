//! Capture devices as the connected OBS lists them.
//!
//! For each family with a device list property, a disabled input of the
//! platform kind is created in a temporary scene, its list items are read,
//! and the input and scene are removed again. Families configured in the
//! settings file are taken as configured and never queried.

use crate::error::SceneResult;
use crate::model::{DeviceFamily, DeviceSpec, InventorySettings, Platform, SourceInventory};
use crate::obs::{ObsRequests, PropertyItem, Transport};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

pub const DETECTION_SCENE: &str = "obs-scenes device detection";

/// Only the first microphone feeds the audio Source Scene.
fn limit(family: DeviceFamily) -> usize {
    match family {
        DeviceFamily::Audio => 1,
        DeviceFamily::Camera | DeviceFamily::Screen => usize::MAX,
    }
}

/// Resolve the inventory against the current collection.
///
/// A family whose detection request fails keeps the platform default device;
/// a family OBS reports no devices for ends up empty and degrades to a
/// placeholder when built.
pub fn detect_inventory<T: Transport + ?Sized>(
    obs: &mut T,
    settings: &InventorySettings,
    platform: Platform,
) -> SceneResult<SourceInventory> {
    let mut inventory = SourceInventory::from_settings(settings, platform);
    if !settings.detect {
        return Ok(inventory);
    }

    let pending: Vec<(DeviceFamily, &str)> = DeviceFamily::ALL
        .into_iter()
        .filter(|family| settings.configured(*family).is_none())
        .filter_map(|family| platform.device_property(family).map(|p| (family, p)))
        .collect();
    if pending.is_empty() {
        return Ok(inventory);
    }

    if let Err(e) = obs.create_scene(DETECTION_SCENE) {
        if e.is_transport_failure() {
            return Err(e);
        }
        // Left over from an interrupted run, or refused outright
        tracing::debug!("{}", e);
    }

    for (family, property) in pending {
        match detect_family(obs, platform, family, property) {
            Ok(devices) => {
                tracing::info!("OBS lists {} {} device(s)", devices.len(), family);
                inventory = inventory.replace(family, devices);
            }
            Err(e) if e.is_transport_failure() => return Err(e),
            Err(e) => tracing::warn!("{} detection failed, using the default device: {}", family, e),
        }
    }

    match obs.remove_scene(DETECTION_SCENE) {
        Ok(()) => {}
        Err(e) if e.is_transport_failure() => return Err(e),
        Err(e) => tracing::warn!("Could not remove {}: {}", DETECTION_SCENE, e),
    }
    Ok(inventory)
}

fn detect_family<T: Transport + ?Sized>(
    obs: &mut T,
    platform: Platform,
    family: DeviceFamily,
    property: &str,
) -> SceneResult<Vec<DeviceSpec>> {
    let kind = platform.input_kind(family);
    let input = format!("{DETECTION_SCENE} ({family})");
    obs.create_input(DETECTION_SCENE, &input, kind, &json!({}), false)?;

    let items = obs.get_input_properties_list_property_items(&input, property);
    obs.remove_input(&input)?;
    Ok(devices_from(family, kind, property, &items?))
}

fn usable(item: &PropertyItem) -> bool {
    if item.item_enabled == Some(false) {
        return false;
    }
    match &item.item_value {
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "None",
        _ => true,
    }
}

/// Turn list items into devices with unique input names.
fn devices_from(family: DeviceFamily, kind: &str, property: &str, items: &[PropertyItem]) -> Vec<DeviceSpec> {
    let mut names = BTreeSet::new();
    items
        .iter()
        .filter(|item| usable(item))
        .take(limit(family))
        .enumerate()
        .map(|(i, item)| {
            let base = match item.item_name.trim() {
                "" => item.item_value.as_str().unwrap_or("Device").to_string(),
                name => name.to_string(),
            };
            let mut name = base.clone();
            let mut n = 2;
            while !names.insert(name.clone()) {
                name = format!("{base} {n}");
                n += 1;
            }

            let mut settings = Map::new();
            settings.insert(property.to_string(), item.item_value.clone());
            DeviceSpec {
                id: format!("{family}-{i}"),
                name,
                input_kind: kind.to_string(),
                settings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::fake::FakeObs;
    use super::*;
    use crate::error::SceneError;
    use crate::model::{build, BuildInput, LayoutVariant, SceneKind, SceneRole, SourceKind};

    fn detect(obs: &mut FakeObs, settings: &InventorySettings) -> SourceInventory {
        detect_inventory(obs, settings, Platform::Linux).unwrap()
    }

    #[test]
    fn listed_cameras_become_devices() {
        let mut obs = FakeObs::new();
        obs.set_devices("v4l2_source", &[("Cam Link 4K", "/dev/video0"), ("Cam Link 4K", "/dev/video2")]);
        obs.set_devices("pulse_input_capture", &[("Default", "default"), ("USB Mic", "alsa_input.usb")]);

        let inventory = detect(&mut obs, &InventorySettings::default());
        let cameras = inventory.devices(DeviceFamily::Camera);
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].name, "Cam Link 4K");
        assert_eq!(cameras[1].name, "Cam Link 4K 2");
        assert_eq!(cameras[1].settings["device_id"], "/dev/video2");
        assert_eq!(cameras[1].id, "camera-1");

        let audio = inventory.devices(DeviceFamily::Audio);
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].settings["device_id"], "default");

        // Screens have no device list and keep the default capture
        assert_eq!(inventory.devices(DeviceFamily::Screen)[0].input_kind, "xshm_input");
    }

    #[test]
    fn no_listed_camera_degrades_to_placeholder() {
        let mut obs = FakeObs::new();
        obs.set_devices("v4l2_source", &[]);
        obs.set_devices("pulse_input_capture", &[("Default", "default")]);

        let inventory = detect(&mut obs, &InventorySettings::default());
        assert!(inventory.devices(DeviceFamily::Camera).is_empty());

        let roles: Vec<String> = SceneRole::STANDARD.iter().map(|r| r.id().to_string()).collect();
        let collection = build(
            &BuildInput {
                label: "Security Workshop",
                name: "security-workshop-0a1b2c3d",
                roles: &roles,
                asset_base: "http://172.29.140.7:8080",
                variant: LayoutVariant::Standard,
            },
            &inventory,
        )
        .unwrap();
        assert_eq!(collection.degraded, vec![DeviceFamily::Camera]);
        let camera = collection.scene("📹 Camera").unwrap();
        assert_eq!(camera.kind, SceneKind::Source(DeviceFamily::Camera));
        assert!(matches!(camera.items[0].kind, SourceKind::Placeholder { .. }));
    }

    #[test]
    fn missing_device_is_reported_as_not_found() {
        let err = SceneError::DeviceNotFound {
            family: DeviceFamily::Camera.to_string(),
        };
        assert!(!err.is_transport_failure());
        assert!(err.to_string().contains("camera"), "{err}");
    }

    #[test]
    fn unusable_items_are_skipped() {
        let mut obs = FakeObs::new();
        obs.set_devices("v4l2_source", &[("", ""), ("None", "None"), ("Webcam", "/dev/video4")]);
        let inventory = detect(&mut obs, &InventorySettings::default());
        let cameras = inventory.devices(DeviceFamily::Camera);
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "Webcam");
    }

    #[test]
    fn configured_family_is_not_queried() {
        let mut obs = FakeObs::new();
        let settings = InventorySettings {
            camera: Some(vec![SourceInventory::default_device(Platform::Linux, DeviceFamily::Camera)]),
            audio: Some(Vec::new()),
            ..Default::default()
        };
        let inventory = detect(&mut obs, &settings);
        assert_eq!(inventory.devices(DeviceFamily::Camera)[0].name, "Camera Device");
        assert!(inventory.devices(DeviceFamily::Audio).is_empty());
        assert_eq!(obs.count_requests("GetInputPropertiesListPropertyItems", ""), 0);
        assert_eq!(obs.count_requests("CreateScene", ""), 0);
    }

    #[test]
    fn disabled_detection_sends_nothing() {
        let mut obs = FakeObs::new();
        let settings = InventorySettings {
            detect: false,
            ..Default::default()
        };
        let inventory = detect(&mut obs, &settings);
        assert_eq!(inventory.devices(DeviceFamily::Camera).len(), 1);
        assert!(obs.requests().is_empty());
    }

    #[test]
    fn failed_query_keeps_default_device() {
        let mut obs = FakeObs::new();
        obs.fail_when("GetInputPropertiesListPropertyItems", "(camera)");
        obs.set_devices("pulse_input_capture", &[("Default", "default")]);

        let inventory = detect(&mut obs, &InventorySettings::default());
        assert_eq!(inventory.devices(DeviceFamily::Camera)[0].name, "Camera Device");
        assert_eq!(inventory.devices(DeviceFamily::Audio)[0].name, "Default");
        // The temporary input is removed even though its query failed
        assert!(obs.input_names().is_empty(), "{:?}", obs.input_names());
    }

    #[test]
    fn temporary_scene_and_inputs_are_removed() {
        let mut obs = FakeObs::new();
        obs.set_devices("v4l2_source", &[("Webcam", "/dev/video0")]);
        detect(&mut obs, &InventorySettings::default());
        assert_eq!(obs.scene_names(), vec!["Scene"]);
        assert!(obs.input_names().is_empty());
    }

    #[test]
    fn broken_connection_ends_detection() {
        let mut obs = FakeObs::new();
        obs.disconnect_on("GetInputPropertiesListPropertyItems", "");
        let err = detect_inventory(&mut obs, &InventorySettings::default(), Platform::Linux).unwrap_err();
        assert!(err.is_transport_failure());
    }
}
