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

//! Remote asset layout.
//!
//! Every location in the content store derives purely from the client id,
//! scene id, and build code:
//!
//! ```text
//! cubemap/{client}/{scene}/tiles/{code}/{code}_{face}_{lod}_{x}_{y}.jpg
//! cubemap/{client}/{scene}/tiles/{code}/metadata.json
//! renders/2d_{code}.jpg
//! ```
//!
//! The scheme is shared verbatim with the render worker; the worker writes
//! under the same keys the client probes and streams. The scene id travels
//! per call because one session may address several scenes while jobs for
//! earlier scenes are still in flight.

use panoply_core::code::BuildCode;

/// Computes store URLs for one client namespace.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    base_url: String,
    client: String,
}

impl AssetLayout {
    /// Creates a layout rooted at `base_url` (trailing slash tolerated).
    pub fn new(base_url: &str, client: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: client.to_string(),
        }
    }

    /// The store-relative root of a build's tile set.
    pub fn tile_root(&self, scene: &str, code: &BuildCode) -> String {
        format!("cubemap/{}/{}/tiles/{}", self.client, scene, code)
    }

    /// The manifest written by the worker after the last tile upload.
    pub fn metadata_url(&self, scene: &str, code: &BuildCode) -> String {
        format!("{}/{}/metadata.json", self.base_url, self.tile_root(scene, code))
    }

    /// One representative tile: front face, LOD 0, position (0, 0).
    pub fn canonical_tile_url(&self, scene: &str, code: &BuildCode) -> String {
        format!(
            "{}/{}/{}_f_0_0_0.jpg",
            self.base_url,
            self.tile_root(scene, code),
            code
        )
    }

    /// The tile URL template handed to the panorama viewer, with
    /// `{f}`/`{z}`/`{x}`/`{y}` placeholders for face, LOD, and position.
    pub fn viewer_url_template(&self, scene: &str, code: &BuildCode) -> String {
        format!(
            "{}/{}/{}_{{f}}_{{z}}_{{x}}_{{y}}.jpg",
            self.base_url,
            self.tile_root(scene, code),
            code
        )
    }

    /// The flat 2-D render of a build.
    pub fn snapshot_url(&self, code: &BuildCode) -> String {
        format!("{}/renders/2d_{}.jpg", self.base_url, code)
    }

    /// The client namespace this layout addresses.
    pub fn client(&self) -> &str {
        &self.client
    }
}
