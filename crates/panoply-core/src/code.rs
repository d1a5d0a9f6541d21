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

//! Build-code codec.
//!
//! A build code is the deterministic name of one product configuration: the
//! ordered concatenation of fixed-width radix-encoded item indices, one block
//! per layer in ascending `build_order`, optionally preceded by one
//! scene-index block. The code doubles as the cache key under which the
//! remote worker publishes the pre-baked tile set, so the radix and block
//! width must match the worker's configuration verbatim.

use crate::project::{CodeBase, Layer, Project};
use crate::selection::Selection;
use std::fmt;

/// A deterministic identifier for one configuration of the product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildCode(String);

impl BuildCode {
    /// Wraps an already-derived code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The raw code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BuildCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The result of decoding a build code back into a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBuild {
    /// The scene-index prefix, when the project uses multi-scene addressing.
    pub scene_index: Option<u32>,
    /// The reconstructed per-layer selection.
    pub selection: Selection,
}

/// An error produced while validating or decoding a build code.
///
/// Always recoverable: the caller falls back to a known-good default code
/// instead of failing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// The code's length does not match the scene's layer count and block width.
    BadLength {
        /// Length the active scene requires.
        expected: usize,
        /// Length of the rejected input.
        actual: usize,
    },
    /// A character outside the configured radix's alphabet.
    BadCharacter {
        /// The rejected character.
        ch: char,
        /// Zero-based position inside the code.
        position: usize,
    },
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeError::BadLength { expected, actual } => {
                write!(f, "Invalid build code length: expected {expected}, got {actual}")
            }
            CodeError::BadCharacter { ch, position } => {
                write!(
                    f,
                    "Invalid character '{ch}' at position {position} for the configured radix"
                )
            }
        }
    }
}

impl std::error::Error for CodeError {}

/// Encodes selections into build codes and decodes codes back.
///
/// The codec is a pure value derived from the project configuration; it
/// holds no I/O and no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct BuildCodec {
    base: CodeBase,
    width: usize,
    scene_prefix: bool,
}

impl BuildCodec {
    /// Builds the codec from a project's configured radix, block width, and
    /// scene-addressing mode.
    pub fn from_project(project: &Project) -> Self {
        Self {
            base: project.code_base,
            width: project.code_width,
            scene_prefix: project.uses_scene_prefix(),
        }
    }

    /// The exact code length the given layer stack produces.
    pub fn code_len(&self, layer_count: usize) -> usize {
        let blocks = layer_count + usize::from(self.scene_prefix);
        blocks * self.width
    }

    /// Derives the build code for `selection` over `layers`.
    ///
    /// Layers must already be sorted ascending by `build_order` (the project
    /// loader guarantees this). A missing or unresolvable selection entry
    /// encodes as index `0`, the layer's base choice; encoding is total and
    /// never fails.
    pub fn encode(&self, layers: &[Layer], selection: &Selection, scene_index: u32) -> BuildCode {
        let mut code = String::with_capacity(self.code_len(layers.len()));

        if self.scene_prefix {
            code.push_str(&self.encode_block(scene_index as u64));
        }

        for layer in layers {
            let index = selection
                .get(&layer.id)
                .and_then(|item_id| layer.item(item_id))
                .map(|item| item.index)
                .unwrap_or(0);
            code.push_str(&self.encode_block(index as u64));
        }

        BuildCode(code)
    }

    /// Reconstructs a selection from a raw code string.
    ///
    /// Validation is strict: the length must match exactly and every
    /// character must belong to the configured radix's alphabet — a base-16
    /// project rejects `g`-`z` rather than accepting the base-36 superset.
    /// A block value with no matching item leaves that layer at its base
    /// item; decoding only fails on malformed input.
    ///
    /// # Errors
    /// Returns [`CodeError`] on wrong length or illegal characters.
    pub fn decode(&self, layers: &[Layer], raw: &str) -> Result<DecodedBuild, CodeError> {
        let expected = self.code_len(layers.len());
        if raw.len() != expected {
            return Err(CodeError::BadLength {
                expected,
                actual: raw.len(),
            });
        }

        for (position, ch) in raw.chars().enumerate() {
            if !self.base.contains(ch) {
                return Err(CodeError::BadCharacter { ch, position });
            }
        }

        let mut blocks = raw
            .as_bytes()
            .chunks(self.width)
            .map(|chunk| std::str::from_utf8(chunk).expect("code validated as ASCII"));

        let scene_index = if self.scene_prefix {
            let block = blocks.next().expect("length validated above");
            Some(u32::try_from(self.parse_block(block)).unwrap_or(u32::MAX))
        } else {
            None
        };

        let mut selection = Selection::new();
        for (layer, block) in layers.iter().zip(blocks) {
            let value = self.parse_block(block);
            let item = layer
                .item_by_index(u32::try_from(value).unwrap_or(u32::MAX))
                .or_else(|| layer.base_item());
            if let Some(item) = item {
                selection.insert(layer.id.clone(), item.id.clone());
            }
        }

        Ok(DecodedBuild {
            scene_index,
            selection,
        })
    }

    /// Encodes one value as a fixed-width block, left-padded with `'0'`.
    ///
    /// Values beyond the block's capacity saturate at the maximum encodable
    /// value so the code always keeps its fixed layout.
    fn encode_block(&self, value: u64) -> String {
        let radix = self.base.radix() as u64;
        let capacity = radix
            .checked_pow(self.width as u32)
            .map(|c| c - 1)
            .unwrap_or(u64::MAX);

        let mut n = if value > capacity {
            log::warn!(
                "Index {value} exceeds block capacity {capacity}; encoding saturated value"
            );
            capacity
        } else {
            value
        };

        let alphabet = self.base.alphabet().as_bytes();
        let mut digits = Vec::with_capacity(self.width);
        while n > 0 {
            digits.push(alphabet[(n % radix) as usize]);
            n /= radix;
        }
        while digits.len() < self.width {
            digits.push(b'0');
        }
        digits.reverse();
        String::from_utf8(digits).expect("alphabet is ASCII")
    }

    fn parse_block(&self, block: &str) -> u64 {
        u64::from_str_radix(block, self.base.radix())
            .expect("block characters validated against the radix alphabet")
    }
}
