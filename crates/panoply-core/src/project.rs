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

//! Product-configuration model.
//!
//! A [`Project`] describes everything the configurator needs to know about a
//! client's product: the scenes that can be displayed, the interchangeable
//! visual layers of each scene, the candidate items per layer, and the codec
//! parameters (radix and block width) that both this crate and the remote
//! render worker use to derive build codes. The project is the source of
//! truth loaded once at startup from the client's JSON configuration.

use serde::Deserialize;
use std::fmt;

/// The radix used to encode item indices inside a build code.
///
/// Both ends of the pipeline (this codec and the remote render worker) must
/// agree on the radix, since the build code doubles as the cache key for the
/// pre-baked tile sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum CodeBase {
    /// Base-16: blocks use the alphabet `0-9a-f`.
    Hex,
    /// Base-36: blocks use the alphabet `0-9a-z`.
    Base36,
}

impl CodeBase {
    /// The numeric radix.
    pub fn radix(&self) -> u32 {
        match self {
            CodeBase::Hex => 16,
            CodeBase::Base36 => 36,
        }
    }

    /// The full lowercase alphabet for this radix.
    pub fn alphabet(&self) -> &'static str {
        &"0123456789abcdefghijklmnopqrstuvwxyz"[..self.radix() as usize]
    }

    /// Returns true when `ch` is a legal digit under this radix.
    ///
    /// Validation is strict: a base-16 project rejects `g`-`z` and any
    /// uppercase character outright.
    pub fn contains(&self, ch: char) -> bool {
        self.alphabet().contains(ch)
    }
}

impl TryFrom<u32> for CodeBase {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(CodeBase::Hex),
            36 => Ok(CodeBase::Base36),
            other => Err(format!("unsupported code base: {other} (expected 16 or 36)")),
        }
    }
}

/// One selectable item inside a [`Layer`].
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    /// Stable identifier of the item within its layer.
    pub id: String,
    /// Human-readable label for presentation.
    #[serde(default)]
    pub label: String,
    /// Compact encoding index, unique within the layer. Index `0` marks the
    /// layer's implicit base choice.
    pub index: u32,
    /// Optional thumbnail location for the presentation layer.
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// An ordered, fixed-position slot of interchangeable items.
#[derive(Debug, Clone, Deserialize)]
pub struct Layer {
    /// Stable identifier of the layer.
    pub id: String,
    /// Human-readable label for presentation.
    #[serde(default)]
    pub label: String,
    /// Position of this layer's block inside the build code (`0..layer_count`).
    pub build_order: u32,
    /// Candidate items; exactly one carries `index == 0`.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Layer {
    /// Returns the item with the given id, if any.
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Returns the item with the given encoding index, if any.
    pub fn item_by_index(&self, index: u32) -> Option<&Item> {
        self.items.iter().find(|i| i.index == index)
    }

    /// Returns the layer's base item (`index == 0`).
    ///
    /// Validation guarantees the base item exists on every loaded project.
    pub fn base_item(&self) -> Option<&Item> {
        self.item_by_index(0)
    }
}

/// One displayable scene of the product, with its own layer stack.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    /// Stable identifier of the scene.
    pub id: String,
    /// Compact scene index used as the build-code prefix block under
    /// multi-scene addressing.
    #[serde(default)]
    pub scene_index: u32,
    /// Layers of this scene, sorted ascending by `build_order` after load.
    pub layers: Vec<Layer>,
}

/// Presentation options carried opaquely for the viewer.
///
/// The orchestrator never interprets these; they are handed to the
/// presentation layer together with the tile URL template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    /// Edge length of one tile in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Edge length of one cube face in pixels.
    #[serde(default = "default_cube_size")]
    pub cube_size: u32,
    /// Initial field of view in radians.
    #[serde(default)]
    pub default_fov: Option<f64>,
}

fn default_tile_size() -> u32 {
    512
}

fn default_cube_size() -> u32 {
    1024
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            cube_size: default_cube_size(),
            default_fov: None,
        }
    }
}

/// A client's full product configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    /// Client identifier; namespaces every remote asset location.
    pub client: String,
    /// Radix shared with the remote render worker.
    #[serde(rename = "configStringBase", default = "default_base")]
    pub code_base: CodeBase,
    /// Fixed block width shared with the remote render worker.
    #[serde(rename = "buildChars", default = "default_width")]
    pub code_width: usize,
    /// Viewer presentation options.
    #[serde(default)]
    pub viewer: ViewerOptions,
    /// Displayable scenes.
    pub scenes: Vec<SceneConfig>,
}

fn default_base() -> CodeBase {
    CodeBase::Base36
}

fn default_width() -> usize {
    2
}

impl Project {
    /// Parses and validates a project from its JSON configuration.
    ///
    /// Layers are sorted ascending by `build_order` so that build-code
    /// blocks always concatenate in a stable order regardless of how the
    /// configuration file lists them.
    ///
    /// # Errors
    /// Returns a [`ProjectError`] when the JSON is malformed or the
    /// configuration violates a structural invariant (duplicate or
    /// out-of-range `build_order`, missing base item, duplicate item index).
    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let mut project: Project = serde_json::from_str(json)?;

        for scene in &mut project.scenes {
            scene.layers.sort_by_key(|l| l.build_order);
        }
        project.validate()?;

        log::info!(
            "Project '{}' loaded: {} scene(s), base {}, width {}",
            project.client,
            project.scenes.len(),
            project.code_base.radix(),
            project.code_width
        );
        Ok(project)
    }

    /// Returns the scene with the given id, if any.
    pub fn scene(&self, scene_id: &str) -> Option<&SceneConfig> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }

    /// Returns the ids of all scenes, in configuration order.
    pub fn scene_list(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.id.as_str()).collect()
    }

    /// Whether build codes carry a scene-index prefix block.
    ///
    /// Single-scene projects address their one tile set without a prefix;
    /// multi-scene projects prepend one block so identical layer selections
    /// in different scenes never collide on the same cache key.
    pub fn uses_scene_prefix(&self) -> bool {
        self.scenes.len() > 1
    }

    fn validate(&self) -> Result<(), ProjectError> {
        // Width 8 in base 36 already addresses ~2.8e12 items per block;
        // anything wider is a configuration mistake.
        if !(1..=8).contains(&self.code_width) {
            return Err(ProjectError::InvalidCodeWidth);
        }

        for scene in &self.scenes {
            let count = scene.layers.len() as u32;
            for (position, layer) in scene.layers.iter().enumerate() {
                if layer.build_order != position as u32 || layer.build_order >= count {
                    return Err(ProjectError::InvalidBuildOrder {
                        scene: scene.id.clone(),
                        layer: layer.id.clone(),
                        build_order: layer.build_order,
                    });
                }

                let base_items = layer.items.iter().filter(|i| i.index == 0).count();
                if base_items != 1 {
                    return Err(ProjectError::MissingBaseItem {
                        scene: scene.id.clone(),
                        layer: layer.id.clone(),
                    });
                }

                for item in &layer.items {
                    let duplicates = layer.items.iter().filter(|i| i.index == item.index).count();
                    if duplicates != 1 {
                        return Err(ProjectError::DuplicateItemIndex {
                            scene: scene.id.clone(),
                            layer: layer.id.clone(),
                            index: item.index,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// An error produced while loading or validating a [`Project`].
#[derive(Debug)]
pub enum ProjectError {
    /// The JSON document could not be parsed into the project model.
    Parse(serde_json::Error),
    /// The configured block width is outside `1..=8`.
    InvalidCodeWidth,
    /// A layer's `build_order` is duplicated or outside `0..layer_count`.
    InvalidBuildOrder {
        /// Scene containing the offending layer.
        scene: String,
        /// The offending layer.
        layer: String,
        /// The rejected value.
        build_order: u32,
    },
    /// A layer has zero or several items with `index == 0`.
    MissingBaseItem {
        /// Scene containing the offending layer.
        scene: String,
        /// The offending layer.
        layer: String,
    },
    /// Two items of one layer share an encoding index.
    DuplicateItemIndex {
        /// Scene containing the offending layer.
        scene: String,
        /// The offending layer.
        layer: String,
        /// The duplicated index.
        index: u32,
    },
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::Parse(err) => write!(f, "Failed to parse project JSON: {err}"),
            ProjectError::InvalidCodeWidth => {
                write!(f, "Project code width must be between 1 and 8")
            }
            ProjectError::InvalidBuildOrder {
                scene,
                layer,
                build_order,
            } => write!(
                f,
                "Layer '{layer}' in scene '{scene}' has invalid build_order {build_order} \
                 (expected unique values covering 0..layer_count)"
            ),
            ProjectError::MissingBaseItem { scene, layer } => write!(
                f,
                "Layer '{layer}' in scene '{scene}' must have exactly one item with index 0"
            ),
            ProjectError::DuplicateItemIndex {
                scene,
                layer,
                index,
            } => write!(
                f,
                "Layer '{layer}' in scene '{scene}' has duplicate item index {index}"
            ),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(err: serde_json::Error) -> Self {
        ProjectError::Parse(err)
    }
}
