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

//! Scene-backend contract.
//!
//! The presentation layer (panorama viewer, tile renderer) sits behind this
//! trait. The director is the only caller and the exclusive owner of every
//! [`SceneId`] it creates; no other component may destroy one.

use crate::code::BuildCode;
use std::fmt;
use std::time::Duration;

/// Opaque identifier of one scene instance living in the display backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub u64);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Display backend that materializes and swaps scene instances.
///
/// Construction is assumed synchronous and cheap relative to tile loading;
/// the backend streams tiles on its own once a transition begins.
pub trait SceneBackend {
    /// Creates a scene instance bound to the tile set named by `code`.
    ///
    /// # Errors
    /// Returns [`SceneBackendError`] when the backend cannot allocate the
    /// instance.
    fn create_scene(&mut self, code: &BuildCode) -> Result<SceneId, SceneBackendError>;

    /// Starts displaying `to`, fading over `duration` (zero means an
    /// immediate cut).
    ///
    /// # Errors
    /// Returns [`SceneBackendError`] when the backend rejects the swap; the
    /// director aborts the transition and drains pending work instead of
    /// wedging.
    fn begin_transition(&mut self, to: SceneId, duration: Duration)
        -> Result<(), SceneBackendError>;

    /// Releases a scene instance.
    ///
    /// # Errors
    /// Returns [`SceneBackendError`] when the instance is already gone; the
    /// director swallows teardown failures.
    fn destroy_scene(&mut self, id: SceneId) -> Result<(), SceneBackendError>;
}

/// An error reported by the display backend.
#[derive(Debug, Clone)]
pub struct SceneBackendError(pub String);

impl fmt::Display for SceneBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scene backend error: {}", self.0)
    }
}

impl std::error::Error for SceneBackendError {}
