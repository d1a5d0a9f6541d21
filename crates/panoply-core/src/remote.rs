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

//! Interface contracts for the remote collaborators.
//!
//! The runtime never talks HTTP itself; it reaches the content store and the
//! render worker only through these traits, keeping the queue and session
//! testable against in-memory doubles. `panoply-remote` provides the real
//! implementations.

use crate::code::BuildCode;
use crate::selection::Selection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory existence probe against the remote content store.
pub trait AvailabilityProbe: Send + Sync {
    /// Returns true only when the full tile set for `code` under the given
    /// scene namespace is known to be published.
    ///
    /// Implementations must degrade safely: any transport failure maps to
    /// `false` ("assume missing, try to render"), never to an error.
    fn exists(&self, scene: &str, code: &BuildCode) -> bool;
}

/// A render request handed to the remote worker.
///
/// The selection is a snapshot taken at enqueue time; the worker derives the
/// same build code from it that the client derived, which is why radix and
/// width live in shared project configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    /// Client namespace.
    pub client: String,
    /// Scene to render.
    pub scene: String,
    /// Immutable selection snapshot.
    pub selection: Selection,
}

/// How the worker satisfied a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// The tile set already existed; nothing was rendered.
    Cached,
    /// A render was started (or completed synchronously).
    Generated,
}

/// Acknowledgement returned by the render worker on an accepted submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAck {
    /// Disposition of the request.
    pub status: SubmitStatus,
    /// The build code the worker derived for the snapshot.
    pub build: String,
}

/// Submission client for the remote render worker.
pub trait RenderSubmitter: Send + Sync {
    /// Submits one render request.
    ///
    /// # Errors
    /// Returns [`SubmissionError`] when the worker rejects the request or
    /// the transport fails; the queue marks the job failed without retry.
    fn submit(&self, request: &RenderRequest) -> Result<SubmitAck, SubmissionError>;
}

/// An error produced while submitting a render request.
#[derive(Debug)]
pub enum SubmissionError {
    /// The worker's global rate limit rejected the request (HTTP 429).
    RateLimited,
    /// The worker rejected or failed the request with a status code.
    Rejected {
        /// The HTTP status returned by the worker.
        status: u16,
    },
    /// The request never reached the worker.
    Transport(String),
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionError::RateLimited => {
                write!(f, "Render worker rate limit hit; submission rejected")
            }
            SubmissionError::Rejected { status } => {
                write!(f, "Render worker rejected the submission with status {status}")
            }
            SubmissionError::Transport(msg) => {
                write!(f, "Render submission transport failure: {msg}")
            }
        }
    }
}

impl std::error::Error for SubmissionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_worker_payload() {
        let mut selection = Selection::new();
        selection.insert("roof".to_string(), "roof-slate".to_string());
        let request = RenderRequest {
            client: "atelier".to_string(),
            scene: "front".to_string(),
            selection,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["client"], "atelier");
        assert_eq!(json["scene"], "front");
        assert_eq!(json["selection"]["roof"], "roof-slate");
    }

    #[test]
    fn ack_parses_worker_response() {
        let ack: SubmitAck =
            serde_json::from_str(r#"{ "status": "cached", "build": "050e" }"#).unwrap();
        assert_eq!(ack.status, SubmitStatus::Cached);
        assert_eq!(ack.build, "050e");

        let ack: SubmitAck =
            serde_json::from_str(r#"{ "status": "generated", "build": "0000", "tilesCount": 36 }"#)
                .unwrap();
        assert_eq!(ack.status, SubmitStatus::Generated);
    }

    #[test]
    fn submission_error_display() {
        assert_eq!(
            format!("{}", SubmissionError::Rejected { status: 500 }),
            "Render worker rejected the submission with status 500"
        );
        assert_eq!(
            format!("{}", SubmissionError::RateLimited),
            "Render worker rate limit hit; submission rejected"
        );
    }
}
