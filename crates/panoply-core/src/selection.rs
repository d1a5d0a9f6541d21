// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The active selection state of a configurator session.

use crate::project::{Item, Project, SceneConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// A mapping from layer id to the chosen item id.
///
/// Insertion order is irrelevant; build-code derivation always walks the
/// scene's layers in `build_order`. Snapshots handed to the render queue are
/// deep copies, so later mutations of the live selection never leak into a
/// job already in flight.
pub type Selection = HashMap<String, String>;

/// Tracks the user's current scene and per-layer choices.
///
/// The model is deliberately passive: it validates and records choices but
/// performs no I/O and triggers no scene work. The session layer reads it,
/// derives build codes, and drives the queue and director.
#[derive(Debug, Clone)]
pub struct SelectionModel {
    project: Arc<Project>,
    scene_id: String,
    selection: Selection,
}

impl SelectionModel {
    /// Creates a model positioned on `scene_id` with every layer at its
    /// base item.
    ///
    /// Returns `None` when the project has no such scene.
    pub fn new(project: Arc<Project>, scene_id: &str) -> Option<Self> {
        project.scene(scene_id)?;
        let mut model = Self {
            project,
            scene_id: scene_id.to_string(),
            selection: Selection::new(),
        };
        model.initialize(None);
        Some(model)
    }

    /// Resets the selection, preferring `preset` entries that resolve to a
    /// known item and falling back to each layer's base item otherwise.
    pub fn initialize(&mut self, preset: Option<&Selection>) {
        let scene = self.scene().clone();
        self.selection.clear();

        for layer in &scene.layers {
            let preset_item = preset
                .and_then(|p| p.get(&layer.id))
                .and_then(|item_id| layer.item(item_id));

            let chosen = preset_item.or_else(|| layer.base_item());
            if let Some(item) = chosen {
                self.selection.insert(layer.id.clone(), item.id.clone());
            }
        }

        log::debug!(
            "Selection initialized for scene '{}': {} layer(s)",
            self.scene_id,
            self.selection.len()
        );
    }

    /// Records a choice for one layer.
    ///
    /// Unknown layers or items are rejected with a warning and leave the
    /// selection untouched; the UI may race a stale menu against a scene
    /// switch, which must never corrupt state.
    pub fn select(&mut self, layer_id: &str, item_id: &str) -> bool {
        let scene = self.scene();
        let Some(layer) = scene.layers.iter().find(|l| l.id == layer_id) else {
            log::warn!("Selection rejected: unknown layer '{layer_id}'");
            return false;
        };
        if layer.item(item_id).is_none() {
            log::warn!("Selection rejected: unknown item '{item_id}' in layer '{layer_id}'");
            return false;
        }

        self.selection
            .insert(layer_id.to_string(), item_id.to_string());
        true
    }

    /// Moves the model to another scene and re-initializes the selection.
    pub fn switch_scene(&mut self, scene_id: &str) -> bool {
        if self.project.scene(scene_id).is_none() {
            log::warn!("Scene switch rejected: unknown scene '{scene_id}'");
            return false;
        }
        self.scene_id = scene_id.to_string();
        self.initialize(None);
        true
    }

    /// The item currently chosen for `layer_id`, if any.
    pub fn selected_item(&self, layer_id: &str) -> Option<&Item> {
        let scene = self.scene();
        let layer = scene.layers.iter().find(|l| l.id == layer_id)?;
        let item_id = self.selection.get(layer_id)?;
        layer.item(item_id)
    }

    /// The active scene configuration.
    pub fn scene(&self) -> &SceneConfig {
        self.project
            .scene(&self.scene_id)
            .expect("active scene id always resolves; checked on construction and switch")
    }

    /// The active scene id.
    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    /// The live selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// A deep copy of the live selection, for handing to the render queue.
    pub fn snapshot(&self) -> Selection {
        self.selection.clone()
    }

    /// The owning project.
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_scene_project() -> Arc<Project> {
        let json = r#"{
            "client": "atelier",
            "scenes": [
                {
                    "id": "front",
                    "scene_index": 0,
                    "layers": [
                        {
                            "id": "roof",
                            "build_order": 0,
                            "items": [
                                { "id": "roof-base", "index": 0 },
                                { "id": "roof-slate", "index": 5 }
                            ]
                        }
                    ]
                },
                {
                    "id": "back",
                    "scene_index": 1,
                    "layers": [
                        {
                            "id": "door",
                            "build_order": 0,
                            "items": [
                                { "id": "door-base", "index": 0 },
                                { "id": "door-oak", "index": 2 }
                            ]
                        }
                    ]
                }
            ]
        }"#;
        Arc::new(Project::from_json(json).unwrap())
    }

    #[test]
    fn initializes_to_base_items() {
        let model = SelectionModel::new(two_scene_project(), "front").unwrap();
        assert_eq!(model.selection().get("roof").unwrap(), "roof-base");
    }

    #[test]
    fn preset_overrides_base_when_resolvable() {
        let mut model = SelectionModel::new(two_scene_project(), "front").unwrap();
        let mut preset = Selection::new();
        preset.insert("roof".to_string(), "roof-slate".to_string());
        preset.insert("ghost-layer".to_string(), "nothing".to_string());

        model.initialize(Some(&preset));
        assert_eq!(model.selection().get("roof").unwrap(), "roof-slate");
        assert!(!model.selection().contains_key("ghost-layer"));
    }

    #[test]
    fn select_rejects_unknown_targets() {
        let mut model = SelectionModel::new(two_scene_project(), "front").unwrap();
        assert!(!model.select("roof", "no-such-item"));
        assert!(!model.select("no-such-layer", "roof-slate"));
        assert_eq!(model.selection().get("roof").unwrap(), "roof-base");

        assert!(model.select("roof", "roof-slate"));
        assert_eq!(model.selected_item("roof").unwrap().id, "roof-slate");
    }

    #[test]
    fn switch_scene_reinitializes() {
        let mut model = SelectionModel::new(two_scene_project(), "front").unwrap();
        model.select("roof", "roof-slate");

        assert!(model.switch_scene("back"));
        assert_eq!(model.scene_id(), "back");
        assert_eq!(model.selection().get("door").unwrap(), "door-base");
        assert!(!model.selection().contains_key("roof"));

        assert!(!model.switch_scene("no-such-scene"));
        assert_eq!(model.scene_id(), "back");
    }

    #[test]
    fn snapshot_is_decoupled_from_live_selection() {
        let mut model = SelectionModel::new(two_scene_project(), "front").unwrap();
        let snapshot = model.snapshot();
        model.select("roof", "roof-slate");
        assert_eq!(snapshot.get("roof").unwrap(), "roof-base");
    }

    #[test]
    fn unknown_scene_yields_no_model() {
        assert!(SelectionModel::new(two_scene_project(), "garden").is_none());
    }
}
