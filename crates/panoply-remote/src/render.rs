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

//! Render-worker submission client.

use panoply_core::remote::{RenderRequest, RenderSubmitter, SubmissionError, SubmitAck};
use serde::Deserialize;
use std::time::Duration;

/// Acknowledgement for a flat 2-D render request.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotAck {
    /// The build code the snapshot was rendered for.
    pub build: String,
    /// Store location of the finished image.
    pub url: String,
}

/// Blocking HTTP client for the render worker's API.
pub struct RenderClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl RenderClient {
    /// Default timeout for submission requests; renders may complete
    /// synchronously on small products, so this is generous.
    pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Creates a client against the worker at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Self::SUBMIT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Render client builder failed ({e}); using defaults");
                reqwest::blocking::Client::new()
            });
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Requests a flat 2-D composite of the given selection.
    ///
    /// # Errors
    /// Same mapping as [`RenderSubmitter::submit`].
    pub fn render_snapshot(&self, request: &RenderRequest) -> Result<SnapshotAck, SubmissionError> {
        let url = format!("{}/api/render2d", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        Self::check_status(response.status())?;
        response
            .json::<SnapshotAck>()
            .map_err(|e| SubmissionError::Transport(format!("invalid snapshot ack: {e}")))
    }

    /// Asks the worker whether it is alive; any failure reads as "down".
    pub fn health(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        match self.http.get(&url).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("Health check failed: {e}");
                false
            }
        }
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), SubmissionError> {
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(SubmissionError::RateLimited)
        } else {
            Err(SubmissionError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

impl RenderSubmitter for RenderClient {
    fn submit(&self, request: &RenderRequest) -> Result<SubmitAck, SubmissionError> {
        let url = format!("{}/api/render", self.base_url);
        log::info!(
            "Submitting render: client={} scene={} ({} layer entries)",
            request.client,
            request.scene,
            request.selection.len()
        );

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        Self::check_status(response.status())?;
        response
            .json::<SubmitAck>()
            .map_err(|e| SubmissionError::Transport(format!("invalid submit ack: {e}")))
    }
}
