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

//! # Panoply Core
//!
//! Foundational crate containing the product-configuration model, the
//! build-code codec, and the interface contracts (remote store, render
//! service, scene backend) that define the configurator's architecture.

#![warn(missing_docs)]

pub mod code;
pub mod event;
pub mod project;
pub mod remote;
pub mod retry;
pub mod scene;
pub mod selection;

pub use code::BuildCode;
pub use project::Project;
pub use selection::Selection;
