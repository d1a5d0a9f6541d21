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

//! Interactive viewer session.
//!
//! The session is the single component that talks to everything: it owns
//! the selection model, derives build codes, routes availability work
//! through the render queue, and drives the scene director. Callers mutate
//! the selection and tick [`pump`](ViewerSession::pump) from their loop;
//! everything else — existence probing, render dispatch, completion
//! polling, handover — happens without blocking them.

use crate::director::{DirectorConfig, DirectorEvent, SceneDirector};
use crate::queue::{QueueConfig, QueueEvent, RenderQueue};
use anyhow::{anyhow, Context, Result};
use panoply_core::code::{BuildCode, BuildCodec};
use panoply_core::event::EventBus;
use panoply_core::project::Project;
use panoply_core::remote::{AvailabilityProbe, RenderRequest, RenderSubmitter, SubmissionError};
use panoply_core::scene::SceneBackend;
use panoply_core::selection::{Selection, SelectionModel};
use panoply_remote::render::SnapshotAck;
use panoply_remote::{AssetLayout, RenderClient, TileStore};
use std::sync::Arc;

/// Notifications published by the session for its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A build's scene took over the display. The host reflects this code
    /// into the addressable application location (shareable reference).
    Displayed {
        /// The now-visible build.
        code: BuildCode,
    },
    /// A render job was queued for a build missing from the store.
    RenderQueued {
        /// The requested build.
        code: BuildCode,
    },
    /// A render job reached its failed terminal state; the build's imagery
    /// will not appear unless re-requested.
    RenderFailed {
        /// The failed build.
        code: BuildCode,
        /// Human-readable failure cause, for a non-blocking notice.
        reason: String,
    },
    /// The user changed one layer's choice.
    SelectionChanged {
        /// The layer that changed.
        layer: String,
        /// The newly selected item.
        item: String,
    },
    /// The session moved to another scene.
    SceneChanged {
        /// The new scene id.
        scene: String,
    },
}

/// Configuration bundle for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Render queue tuning.
    pub queue: QueueConfig,
    /// Scene handover tuning.
    pub director: DirectorConfig,
}

/// Orchestrates one interactive configurator session.
pub struct ViewerSession<B: SceneBackend> {
    model: SelectionModel,
    codec: BuildCodec,
    director: SceneDirector<B>,
    queue: RenderQueue,
    queue_events: crossbeam_channel::Receiver<QueueEvent>,
    bus: EventBus<SessionEvent>,
    layout: Option<AssetLayout>,
    render: Option<Arc<RenderClient>>,
    desired: Option<BuildCode>,
}

impl<B: SceneBackend> ViewerSession<B> {
    /// Creates a session over explicit collaborator implementations and
    /// immediately requests the default build of `scene_id`.
    ///
    /// # Errors
    /// Fails when the project has no such scene.
    pub fn new(
        project: Arc<Project>,
        scene_id: &str,
        backend: B,
        probe: Arc<dyn AvailabilityProbe>,
        submitter: Arc<dyn RenderSubmitter>,
        config: SessionConfig,
    ) -> Result<Self> {
        let model = SelectionModel::new(Arc::clone(&project), scene_id)
            .ok_or_else(|| anyhow!("Project '{}' has no scene '{scene_id}'", project.client))?;
        let codec = BuildCodec::from_project(&project);

        let (mut queue, queue_events) = RenderQueue::new(config.queue, probe, submitter);
        queue.start();

        let mut session = Self {
            model,
            codec,
            director: SceneDirector::new(backend, config.director),
            queue,
            queue_events,
            bus: EventBus::new(),
            layout: None,
            render: None,
            desired: None,
        };
        session.refresh();
        Ok(session)
    }

    /// Creates a session wired to a live deployment: the render worker API
    /// at `api_url` and the tile store at `store_url`.
    ///
    /// # Errors
    /// Fails when the project has no such scene.
    pub fn connect(
        project: Arc<Project>,
        scene_id: &str,
        backend: B,
        api_url: &str,
        store_url: &str,
        config: SessionConfig,
    ) -> Result<Self> {
        let layout = AssetLayout::new(store_url, &project.client);
        let probe = Arc::new(TileStore::new(layout.clone()));
        let submitter = Arc::new(RenderClient::new(api_url));

        if !submitter.health() {
            log::warn!("Render worker at {api_url} is not answering health checks");
        }

        let mut session =
            Self::new(project, scene_id, backend, probe, Arc::clone(&submitter) as _, config)
                .context("Failed to open viewer session")?;
        session.layout = Some(layout);
        session.render = Some(submitter);
        Ok(session)
    }

    /// Requests a flat 2-D composite of the live selection.
    ///
    /// Blocking by design: this backs an explicit "save as image" action,
    /// not the interactive loop. Returns `None` when the session was built
    /// without a live render client.
    pub fn render_snapshot(&self) -> Option<Result<SnapshotAck, SubmissionError>> {
        let client = self.render.as_ref()?;
        let request = RenderRequest {
            client: self.model.project().client.clone(),
            scene: self.model.scene_id().to_string(),
            selection: self.model.snapshot(),
        };
        Some(client.render_snapshot(&request))
    }

    /// Changes one layer's choice and requests the resulting build.
    pub fn select(&mut self, layer_id: &str, item_id: &str) -> bool {
        if !self.model.select(layer_id, item_id) {
            return false;
        }
        self.bus.publish(SessionEvent::SelectionChanged {
            layer: layer_id.to_string(),
            item: item_id.to_string(),
        });
        self.refresh();
        true
    }

    /// Moves to another scene, resetting the selection to its defaults, and
    /// requests that scene's default build.
    pub fn switch_scene(&mut self, scene_id: &str) -> bool {
        if !self.model.switch_scene(scene_id) {
            return false;
        }
        self.bus.publish(SessionEvent::SceneChanged {
            scene: scene_id.to_string(),
        });
        self.refresh();
        true
    }

    /// Restores a configuration from an externally supplied code string
    /// (a shareable reference).
    ///
    /// Malformed input falls back to the current defaults with a warning;
    /// it never fails the session.
    pub fn restore(&mut self, raw: &str) {
        let project = Arc::clone(self.model.project());

        for scene in &project.scenes {
            let Ok(decoded) = self.codec.decode(&scene.layers, raw) else {
                continue;
            };
            // Under multi-scene addressing the prefix must name this scene;
            // without a prefix there is exactly one scene to match.
            if let Some(index) = decoded.scene_index {
                if index != scene.scene_index {
                    continue;
                }
            }

            if self.model.scene_id() != scene.id {
                self.model.switch_scene(&scene.id);
                self.bus.publish(SessionEvent::SceneChanged {
                    scene: scene.id.clone(),
                });
            }
            self.model.initialize(Some(&decoded.selection));
            self.refresh();
            return;
        }

        log::warn!("Ignoring invalid shared code '{raw}'; keeping current configuration");
        self.refresh();
    }

    /// Requests that `code` become the displayed build.
    ///
    /// Never blocks on I/O: availability is verified by the queue worker,
    /// which resolves a cached build to `ready` on its first step without
    /// dispatching a render.
    pub fn show_build(&mut self, code: BuildCode) {
        if self.director.displayed_code() == Some(&code) {
            log::debug!("Build {code} already displayed; nothing to do");
            self.desired = Some(code);
            return;
        }

        self.desired = Some(code.clone());
        let request = RenderRequest {
            client: self.model.project().client.clone(),
            scene: self.model.scene_id().to_string(),
            selection: self.model.snapshot(),
        };
        if self.queue.enqueue(code.clone(), request) {
            self.bus.publish(SessionEvent::RenderQueued { code });
        }
    }

    /// Drains queue completions and advances the director. Call once per
    /// host-loop tick.
    pub fn pump(&mut self) {
        for event in self.queue_events.try_iter() {
            match event {
                QueueEvent::Ready { code } => {
                    if self.desired.as_ref() == Some(&code) {
                        self.director.show(&code);
                    } else {
                        // The user moved on while this build rendered; the
                        // tiles stay cached for the next request.
                        log::debug!("Build {code} ready but no longer desired");
                    }
                }
                QueueEvent::Failed { code, reason } => {
                    log::warn!("Build {code} failed: {reason}");
                    self.bus.publish(SessionEvent::RenderFailed {
                        code,
                        reason: reason.to_string(),
                    });
                }
            }
        }

        self.director.update();

        for event in self.director.poll_events() {
            match event {
                DirectorEvent::Shown { code } => {
                    self.bus.publish(SessionEvent::Displayed { code });
                }
            }
        }
    }

    /// Receiver for the session's event stream.
    pub fn events(&self) -> flume::Receiver<SessionEvent> {
        self.bus.receiver()
    }

    /// The build the display is showing or fading towards.
    pub fn displayed_code(&self) -> Option<&BuildCode> {
        self.director.displayed_code()
    }

    /// The most recently requested build.
    pub fn desired_code(&self) -> Option<&BuildCode> {
        self.desired.as_ref()
    }

    /// The live selection.
    pub fn selection(&self) -> &Selection {
        self.model.selection()
    }

    /// The active scene id.
    pub fn scene_id(&self) -> &str {
        self.model.scene_id()
    }

    /// The tile URL template for the currently displayed build, when the
    /// session was opened with [`connect`](Self::connect).
    pub fn tile_url_template(&self) -> Option<String> {
        let layout = self.layout.as_ref()?;
        let code = self.director.displayed_code()?;
        Some(layout.viewer_url_template(self.model.scene_id(), code))
    }

    /// Stops the background queue worker.
    pub fn stop(&mut self) {
        self.queue.stop();
    }

    /// Derives the code for the live selection and requests it.
    fn refresh(&mut self) {
        let scene = self.model.scene();
        let code = self
            .codec
            .encode(&scene.layers, self.model.selection(), scene.scene_index);
        self.show_build(code);
    }
}
