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

//! # Panoply Runtime
//!
//! The orchestration layer of the configurator: the deduplicated,
//! rate-limited render queue, the scene handover director, and the
//! [`ViewerSession`] facade that ties them to the codec and the remote
//! collaborators.

#![warn(missing_docs)]

pub mod director;
pub mod queue;
pub mod session;

pub use director::{DirectorConfig, SceneDirector};
pub use queue::{QueueConfig, RenderQueue};
pub use session::ViewerSession;
