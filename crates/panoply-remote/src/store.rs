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

//! Tile-store availability probe.

use crate::layout::AssetLayout;
use panoply_core::code::BuildCode;
use panoply_core::remote::AvailabilityProbe;
use std::time::Duration;

/// HEAD-probes the content store for a build's tile set.
///
/// A build counts as available only when both the manifest and the
/// canonical tile respond success: the manifest alone may precede a partial
/// upload recovery, and a stray tile alone says nothing about the rest of
/// the set.
pub struct TileStore {
    http: reqwest::blocking::Client,
    layout: AssetLayout,
}

impl TileStore {
    /// Default timeout applied to each probe request.
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a probe over `layout`.
    pub fn new(layout: AssetLayout) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Self::PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                // Builder failure here means TLS backend misconfiguration;
                // fall back to the default client rather than aborting.
                log::warn!("Tile store client builder failed ({e}); using defaults");
                reqwest::blocking::Client::new()
            });
        Self { http, layout }
    }

    /// The layout this store probes.
    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    fn head_ok(&self, url: &str) -> bool {
        match self.http.head(url).send() {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    log::debug!("Probe miss: {url} -> HTTP {}", response.status());
                }
                ok
            }
            Err(e) => {
                // Existence checking is advisory; transport trouble reads
                // as "missing" and the render path takes over.
                log::debug!("Probe transport failure for {url}: {e}");
                false
            }
        }
    }
}

impl AvailabilityProbe for TileStore {
    fn exists(&self, scene: &str, code: &BuildCode) -> bool {
        let metadata = self.layout.metadata_url(scene, code);
        if !self.head_ok(&metadata) {
            return false;
        }

        let canonical = self.layout.canonical_tile_url(scene, code);
        let ok = self.head_ok(&canonical);
        if ok {
            log::debug!("Build {code} present in store under scene '{scene}'");
        }
        ok
    }
}
