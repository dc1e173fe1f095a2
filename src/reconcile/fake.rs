//! In-memory OBS speaking the request subset used by the orchestrator.

use super::CancelFlag;
use crate::error::{SceneError, SceneResult};
use crate::obs::protocol::{RESOURCE_ALREADY_EXISTS, RESOURCE_NOT_FOUND};
use crate::obs::Transport;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Default)]
struct Collection {
    /// Creation order
    scenes: Vec<Scene>,
    inputs: BTreeMap<String, Input>,
}

struct Scene {
    name: String,
    items: Vec<Item>,
}

struct Item {
    id: i64,
    source: String,
    enabled: bool,
}

struct Input {
    kind: String,
    settings: Value,
    filters: Vec<String>,
}

struct Trigger {
    request_type: String,
    needle: String,
}

impl Trigger {
    fn matches(&self, request_type: &str, data: &str) -> bool {
        self.request_type == request_type && data.contains(&self.needle)
    }
}

pub struct FakeObs {
    collections: BTreeMap<String, Collection>,
    current: String,
    transition: Option<(String, u32)>,
    next_item_id: i64,
    log: Vec<String>,
    /// `propertyItems` per input kind
    devices: BTreeMap<String, Vec<Value>>,
    failures: Vec<Trigger>,
    disconnect: Option<Trigger>,
    cancel_after: Option<(String, CancelFlag)>,
}

fn not_found(request_type: &str, what: &str) -> SceneError {
    SceneError::Request {
        request_type: request_type.to_string(),
        code: RESOURCE_NOT_FOUND,
        comment: Some(format!("{what} not found")),
    }
}

fn exists(request_type: &str, what: &str) -> SceneError {
    SceneError::Request {
        request_type: request_type.to_string(),
        code: RESOURCE_ALREADY_EXISTS,
        comment: Some(format!("{what} already exists")),
    }
}

fn str_field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl FakeObs {
    /// A fresh OBS: one collection "Untitled" holding the default "Scene".
    pub fn new() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert("Untitled".to_string(), Self::new_collection());
        Self {
            collections,
            current: "Untitled".to_string(),
            transition: None,
            next_item_id: 1,
            log: Vec::new(),
            devices: BTreeMap::new(),
            failures: Vec::new(),
            disconnect: None,
            cancel_after: None,
        }
    }

    fn new_collection() -> Collection {
        Collection {
            scenes: vec![Scene {
                name: "Scene".to_string(),
                items: Vec::new(),
            }],
            inputs: BTreeMap::new(),
        }
    }

    // ── test controls ──

    pub fn fail_when(&mut self, request_type: &str, needle: &str) {
        self.failures.push(Trigger {
            request_type: request_type.to_string(),
            needle: needle.to_string(),
        });
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn disconnect_on(&mut self, request_type: &str, needle: &str) {
        self.disconnect = Some(Trigger {
            request_type: request_type.to_string(),
            needle: needle.to_string(),
        });
    }

    pub fn cancel_after_scene(&mut self, scene: &str, flag: CancelFlag) {
        self.cancel_after = Some((scene.to_string(), flag));
    }

    /// Devices listed for inputs of `kind`, as `(itemName, itemValue)`.
    pub fn set_devices(&mut self, kind: &str, items: &[(&str, &str)]) {
        let items = items
            .iter()
            .map(|(name, value)| json!({ "itemName": name, "itemValue": value, "itemEnabled": true }))
            .collect();
        self.devices.insert(kind.to_string(), items);
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn remove_scene_directly(&mut self, scene: &str) {
        self.collection_mut().scenes.retain(|s| s.name != scene);
    }

    // ── inspection ──

    pub fn requests(&self) -> &[String] {
        &self.log
    }

    /// Requests of `request_type` whose payload mentions `needle`.
    pub fn count_requests(&self, request_type: &str, needle: &str) -> usize {
        self.log
            .iter()
            .filter(|entry| entry.starts_with(&format!("{request_type} ")) && entry.contains(needle))
            .count()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn current_collection(&self) -> &str {
        &self.current
    }

    pub fn current_transition(&self) -> Option<(String, u32)> {
        self.transition.clone()
    }

    pub fn scene_names(&self) -> Vec<String> {
        self.collection().scenes.iter().map(|s| s.name.clone()).collect()
    }

    pub fn items_of(&self, scene: &str) -> Vec<String> {
        self.collection()
            .scenes
            .iter()
            .find(|s| s.name == scene)
            .map(|s| s.items.iter().map(|i| i.source.clone()).collect())
            .unwrap_or_default()
    }

    pub fn filters_of(&self, input: &str) -> Vec<String> {
        self.collection()
            .inputs
            .get(input)
            .map(|i| i.filters.clone())
            .unwrap_or_default()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.collection().inputs.keys().cloned().collect()
    }

    pub fn input_kind(&self, input: &str) -> Option<String> {
        self.collection().inputs.get(input).map(|i| i.kind.clone())
    }

    pub fn input_setting(&self, input: &str, key: &str) -> Option<String> {
        self.collection()
            .inputs
            .get(input)
            .and_then(|i| i.settings.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn collection(&self) -> &Collection {
        &self.collections[&self.current]
    }

    fn collection_mut(&mut self) -> &mut Collection {
        self.collections.entry(self.current.clone()).or_default()
    }

    fn scene_mut(&mut self, request_type: &str, scene: &str) -> SceneResult<&mut Scene> {
        self.collection_mut()
            .scenes
            .iter_mut()
            .find(|s| s.name == scene)
            .ok_or_else(|| not_found(request_type, scene))
    }

    fn add_item(&mut self, request_type: &str, scene: &str, source: &str, enabled: bool) -> SceneResult<i64> {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.scene_mut(request_type, scene)?.items.push(Item {
            id,
            source: source.to_string(),
            enabled,
        });
        Ok(id)
    }

    fn dispatch(&mut self, request_type: &str, data: &Value) -> SceneResult<Value> {
        match request_type {
            "GetVersion" => Ok(json!({
                "obsVersion": "30.1.2",
                "obsWebSocketVersion": "5.4.2",
                "rpcVersion": 1,
            })),
            "GetSceneCollectionList" => Ok(json!({
                "currentSceneCollectionName": self.current,
                "sceneCollections": self.collections.keys().collect::<Vec<_>>(),
            })),
            "CreateSceneCollection" => {
                let name = str_field(data, "sceneCollectionName").to_string();
                if self.collections.contains_key(&name) {
                    return Err(exists(request_type, &name));
                }
                self.collections.insert(name.clone(), Self::new_collection());
                self.current = name;
                Ok(Value::Null)
            }
            "SetCurrentSceneCollection" => {
                let name = str_field(data, "sceneCollectionName");
                if !self.collections.contains_key(name) {
                    return Err(not_found(request_type, name));
                }
                self.current = name.to_string();
                Ok(Value::Null)
            }
            "GetSceneList" => {
                let scenes: Vec<Value> = self
                    .collection()
                    .scenes
                    .iter()
                    .enumerate()
                    .map(|(i, s)| json!({ "sceneName": s.name, "sceneIndex": i }))
                    .collect();
                Ok(json!({ "scenes": scenes }))
            }
            "CreateScene" => {
                let name = str_field(data, "sceneName").to_string();
                if self.collection().scenes.iter().any(|s| s.name == name) {
                    return Err(exists(request_type, &name));
                }
                self.collection_mut().scenes.push(Scene {
                    name: name.clone(),
                    items: Vec::new(),
                });
                Ok(Value::Null)
            }
            "RemoveScene" => {
                let name = str_field(data, "sceneName");
                let collection = self.collection_mut();
                let before = collection.scenes.len();
                if before == 1 {
                    return Err(SceneError::Request {
                        request_type: request_type.to_string(),
                        code: 703,
                        comment: Some("cannot remove the last scene".to_string()),
                    });
                }
                collection.scenes.retain(|s| s.name != name);
                if collection.scenes.len() == before {
                    return Err(not_found(request_type, name));
                }
                Ok(Value::Null)
            }
            "GetInputList" => {
                let inputs: Vec<Value> = self
                    .collection()
                    .inputs
                    .iter()
                    .map(|(name, input)| json!({ "inputName": name, "inputKind": input.kind }))
                    .collect();
                Ok(json!({ "inputs": inputs }))
            }
            "CreateInput" => {
                let scene = str_field(data, "sceneName").to_string();
                let name = str_field(data, "inputName").to_string();
                if self.collection().inputs.contains_key(&name) {
                    return Err(exists(request_type, &name));
                }
                self.scene_mut(request_type, &scene)?;
                self.collection_mut().inputs.insert(
                    name.clone(),
                    Input {
                        kind: str_field(data, "inputKind").to_string(),
                        settings: data.get("inputSettings").cloned().unwrap_or(json!({})),
                        filters: Vec::new(),
                    },
                );
                let enabled = data["sceneItemEnabled"].as_bool().unwrap_or(true);
                let id = self.add_item(request_type, &scene, &name, enabled)?;
                Ok(json!({ "inputUuid": format!("uuid-{name}"), "sceneItemId": id }))
            }
            "RemoveInput" => {
                let name = str_field(data, "inputName").to_string();
                let collection = self.collection_mut();
                if collection.inputs.remove(&name).is_none() {
                    return Err(not_found(request_type, &name));
                }
                for scene in &mut collection.scenes {
                    scene.items.retain(|i| i.source != name);
                }
                Ok(Value::Null)
            }
            "GetInputPropertiesListPropertyItems" => {
                let name = str_field(data, "inputName");
                let kind = self
                    .collection()
                    .inputs
                    .get(name)
                    .map(|i| i.kind.clone())
                    .ok_or_else(|| not_found(request_type, name))?;
                let items = self.devices.get(&kind).cloned().unwrap_or_default();
                Ok(json!({ "propertyItems": items }))
            }
            "CreateSceneItem" => {
                let scene = str_field(data, "sceneName").to_string();
                let source = str_field(data, "sourceName").to_string();
                let known = self.collection().inputs.contains_key(&source)
                    || self.collection().scenes.iter().any(|s| s.name == source);
                if !known {
                    return Err(not_found(request_type, &source));
                }
                let enabled = data["sceneItemEnabled"].as_bool().unwrap_or(true);
                let id = self.add_item(request_type, &scene, &source, enabled)?;
                Ok(json!({ "sceneItemId": id }))
            }
            "GetSceneItemList" => {
                let scene = str_field(data, "sceneName").to_string();
                let items: Vec<Value> = self
                    .scene_mut(request_type, &scene)?
                    .items
                    .iter()
                    .map(|i| {
                        json!({
                            "sourceName": i.source,
                            "sceneItemId": i.id,
                            "sceneItemEnabled": i.enabled,
                        })
                    })
                    .collect();
                Ok(json!({ "sceneItems": items }))
            }
            "SetSceneItemTransform" | "SetSceneItemEnabled" => {
                let scene = str_field(data, "sceneName").to_string();
                let id = data["sceneItemId"].as_i64().unwrap_or_default();
                let item = self
                    .scene_mut(request_type, &scene)?
                    .items
                    .iter_mut()
                    .find(|i| i.id == id)
                    .ok_or_else(|| not_found(request_type, "scene item"))?;
                if let Some(enabled) = data.get("sceneItemEnabled").and_then(Value::as_bool) {
                    item.enabled = enabled;
                }
                Ok(Value::Null)
            }
            "SetInputSettings" => {
                let name = str_field(data, "inputName").to_string();
                let input = self
                    .collection_mut()
                    .inputs
                    .get_mut(&name)
                    .ok_or_else(|| not_found(request_type, &name))?;
                if let (Some(current), Some(update)) = (
                    input.settings.as_object_mut(),
                    data.get("inputSettings").and_then(Value::as_object),
                ) {
                    for (k, v) in update {
                        current.insert(k.clone(), v.clone());
                    }
                }
                Ok(Value::Null)
            }
            "GetSourceFilterList" => {
                let name = str_field(data, "sourceName").to_string();
                let filters: Vec<Value> = self
                    .collection()
                    .inputs
                    .get(&name)
                    .ok_or_else(|| not_found(request_type, &name))?
                    .filters
                    .iter()
                    .map(|f| json!({ "filterName": f }))
                    .collect();
                Ok(json!({ "filters": filters }))
            }
            "CreateSourceFilter" => {
                let source = str_field(data, "sourceName").to_string();
                let filter = str_field(data, "filterName").to_string();
                let input = self
                    .collection_mut()
                    .inputs
                    .get_mut(&source)
                    .ok_or_else(|| not_found(request_type, &source))?;
                if input.filters.contains(&filter) {
                    return Err(exists(request_type, &filter));
                }
                input.filters.push(filter);
                Ok(Value::Null)
            }
            "SetCurrentSceneTransition" => {
                let name = str_field(data, "transitionName").to_string();
                let duration = self.transition.as_ref().map(|t| t.1).unwrap_or(300);
                self.transition = Some((name, duration));
                Ok(Value::Null)
            }
            "SetCurrentSceneTransitionDuration" => {
                let duration = data["transitionDuration"].as_u64().unwrap_or_default() as u32;
                let name = self.transition.take().map(|t| t.0).unwrap_or_default();
                self.transition = Some((name, duration));
                Ok(Value::Null)
            }
            other => Err(SceneError::Request {
                request_type: other.to_string(),
                code: 204,
                comment: Some("unknown request type".to_string()),
            }),
        }
    }
}

impl Transport for FakeObs {
    fn request(&mut self, request_type: &str, data: Option<Value>) -> SceneResult<Value> {
        let data = data.unwrap_or(Value::Null);
        let text = data.to_string();
        self.log.push(format!("{request_type} {text}"));

        if self
            .disconnect
            .as_ref()
            .is_some_and(|t| t.matches(request_type, &text))
        {
            return Err(SceneError::protocol("OBS closed the connection"));
        }
        if self.failures.iter().any(|t| t.matches(request_type, &text)) {
            return Err(SceneError::Request {
                request_type: request_type.to_string(),
                code: 500,
                comment: Some("injected failure".to_string()),
            });
        }

        let response = self.dispatch(request_type, &data)?;

        if request_type == "CreateScene" {
            if let Some((scene, flag)) = &self.cancel_after {
                if str_field(&data, "sceneName") == scene {
                    flag.cancel();
                }
            }
        }
        Ok(response)
    }
}
