//! Typed obs-websocket requests on top of any [`Transport`].

use super::Transport;
use crate::error::{SceneError, SceneResult};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub obs_version: String,
    pub obs_web_socket_version: String,
    #[serde(default)]
    pub rpc_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneCollectionList {
    pub current_scene_collection_name: String,
    pub scene_collections: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    pub scene_name: String,
    #[serde(default)]
    pub scene_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEntry {
    pub input_name: String,
    #[serde(default)]
    pub input_kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemEntry {
    pub source_name: String,
    pub scene_item_id: i64,
    #[serde(default)]
    pub scene_item_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEntry {
    pub filter_name: String,
    #[serde(default)]
    pub filter_kind: String,
}

/// One entry of a list property, e.g. a capture device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyItem {
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_value: Value,
    #[serde(default)]
    pub item_enabled: Option<bool>,
}

fn field<T: for<'de> Deserialize<'de>>(data: &Value, key: &str, request_type: &str) -> SceneResult<T> {
    let value = data
        .get(key)
        .ok_or_else(|| SceneError::protocol(format!("{request_type}: responseData has no '{key}'")))?;
    Ok(serde_json::from_value(value.clone())?)
}

/// Request wrappers; implemented for every [`Transport`].
pub trait ObsRequests: Transport {
    fn get_version(&mut self) -> SceneResult<VersionInfo> {
        let data = self.request("GetVersion", None)?;
        Ok(serde_json::from_value(data)?)
    }

    fn get_scene_collection_list(&mut self) -> SceneResult<SceneCollectionList> {
        let data = self.request("GetSceneCollectionList", None)?;
        Ok(serde_json::from_value(data)?)
    }

    /// Creates the collection and switches to it.
    fn create_scene_collection(&mut self, name: &str) -> SceneResult<()> {
        self.request(
            "CreateSceneCollection",
            Some(json!({ "sceneCollectionName": name })),
        )?;
        Ok(())
    }

    fn set_current_scene_collection(&mut self, name: &str) -> SceneResult<()> {
        self.request(
            "SetCurrentSceneCollection",
            Some(json!({ "sceneCollectionName": name })),
        )?;
        Ok(())
    }

    fn get_scene_list(&mut self) -> SceneResult<Vec<SceneEntry>> {
        let data = self.request("GetSceneList", None)?;
        field(&data, "scenes", "GetSceneList")
    }

    fn create_scene(&mut self, scene: &str) -> SceneResult<()> {
        self.request("CreateScene", Some(json!({ "sceneName": scene })))?;
        Ok(())
    }

    fn remove_scene(&mut self, scene: &str) -> SceneResult<()> {
        self.request("RemoveScene", Some(json!({ "sceneName": scene })))?;
        Ok(())
    }

    fn get_input_list(&mut self) -> SceneResult<Vec<InputEntry>> {
        let data = self.request("GetInputList", None)?;
        field(&data, "inputs", "GetInputList")
    }

    fn remove_input(&mut self, input: &str) -> SceneResult<()> {
        self.request("RemoveInput", Some(json!({ "inputName": input })))?;
        Ok(())
    }

    /// Choices OBS offers for a list property of an existing input.
    fn get_input_properties_list_property_items(
        &mut self,
        input: &str,
        property: &str,
    ) -> SceneResult<Vec<PropertyItem>> {
        let data = self.request(
            "GetInputPropertiesListPropertyItems",
            Some(json!({ "inputName": input, "propertyName": property })),
        )?;
        field(&data, "propertyItems", "GetInputPropertiesListPropertyItems")
    }

    /// Create an input and its first scene item; returns the item id.
    fn create_input(
        &mut self,
        scene: &str,
        input: &str,
        kind: &str,
        settings: &Value,
        enabled: bool,
    ) -> SceneResult<i64> {
        let data = self.request(
            "CreateInput",
            Some(json!({
                "sceneName": scene,
                "inputName": input,
                "inputKind": kind,
                "inputSettings": settings,
                "sceneItemEnabled": enabled,
            })),
        )?;
        field(&data, "sceneItemId", "CreateInput")
    }

    /// Add an existing source (input or scene) to a scene; returns the item id.
    fn create_scene_item(&mut self, scene: &str, source: &str, enabled: bool) -> SceneResult<i64> {
        let data = self.request(
            "CreateSceneItem",
            Some(json!({
                "sceneName": scene,
                "sourceName": source,
                "sceneItemEnabled": enabled,
            })),
        )?;
        field(&data, "sceneItemId", "CreateSceneItem")
    }

    fn get_scene_item_list(&mut self, scene: &str) -> SceneResult<Vec<SceneItemEntry>> {
        let data = self.request("GetSceneItemList", Some(json!({ "sceneName": scene })))?;
        field(&data, "sceneItems", "GetSceneItemList")
    }

    fn set_scene_item_transform(&mut self, scene: &str, item_id: i64, transform: Value) -> SceneResult<()> {
        self.request(
            "SetSceneItemTransform",
            Some(json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemTransform": transform,
            })),
        )?;
        Ok(())
    }

    fn set_scene_item_enabled(&mut self, scene: &str, item_id: i64, enabled: bool) -> SceneResult<()> {
        self.request(
            "SetSceneItemEnabled",
            Some(json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": enabled,
            })),
        )?;
        Ok(())
    }

    /// Merge `settings` into the input's current settings.
    fn set_input_settings(&mut self, input: &str, settings: &Value) -> SceneResult<()> {
        self.request(
            "SetInputSettings",
            Some(json!({
                "inputName": input,
                "inputSettings": settings,
                "overlay": true,
            })),
        )?;
        Ok(())
    }

    fn get_source_filter_list(&mut self, source: &str) -> SceneResult<Vec<FilterEntry>> {
        let data = self.request("GetSourceFilterList", Some(json!({ "sourceName": source })))?;
        field(&data, "filters", "GetSourceFilterList")
    }

    fn create_source_filter(
        &mut self,
        source: &str,
        name: &str,
        kind: &str,
        settings: &Value,
    ) -> SceneResult<()> {
        self.request(
            "CreateSourceFilter",
            Some(json!({
                "sourceName": source,
                "filterName": name,
                "filterKind": kind,
                "filterSettings": settings,
            })),
        )?;
        Ok(())
    }

    fn set_current_scene_transition(&mut self, name: &str) -> SceneResult<()> {
        self.request(
            "SetCurrentSceneTransition",
            Some(json!({ "transitionName": name })),
        )?;
        Ok(())
    }

    fn set_current_scene_transition_duration(&mut self, duration_ms: u32) -> SceneResult<()> {
        self.request(
            "SetCurrentSceneTransitionDuration",
            Some(json!({ "transitionDuration": duration_ms })),
        )?;
        Ok(())
    }
}

impl<T: Transport + ?Sized> ObsRequests for T {}
