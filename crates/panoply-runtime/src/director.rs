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

//! Scene handover director.
//!
//! Presents exactly one scene instance as current at any time and swaps
//! between instances without ever destroying one that is still visible or
//! about to become visible. Transitions are strictly serialized; requests
//! arriving mid-transition collapse into a single pending successor, so
//! rapid repeated input lands on the most recent target without animating
//! through intermediate states nobody will ever see.
//!
//! The director exclusively owns every [`SceneId`] it creates. Teardown of a
//! superseded instance is deferred by a grace period on top of the
//! authoritative identity guard: an instance that is current, incoming, or
//! pending at teardown time is never destroyed, however its due time fell.

use panoply_core::code::BuildCode;
use panoply_core::scene::{SceneBackend, SceneId};
use std::time::{Duration, Instant};

/// Configuration for the scene director.
#[derive(Debug, Clone, Copy)]
pub struct DirectorConfig {
    transition: Duration,
    teardown_grace: Duration,
    settle: Duration,
}

impl DirectorConfig {
    /// Creates a config, clamping `teardown_grace` to strictly exceed the
    /// transition duration.
    ///
    /// The grace period only supplements the identity guard, but it must
    /// still outlast the fade so the display backend never samples a
    /// mid-animation instance that has already been released.
    pub fn new(transition: Duration, teardown_grace: Duration, settle: Duration) -> Self {
        let min_grace = transition + Duration::from_millis(1);
        let teardown_grace = teardown_grace.max(min_grace);
        Self {
            transition,
            teardown_grace,
            settle,
        }
    }

    /// Duration of one fade between scene instances.
    pub fn transition(&self) -> Duration {
        self.transition
    }

    /// Delay between a handover completing and the superseded instance
    /// becoming destroyable.
    pub fn teardown_grace(&self) -> Duration {
        self.teardown_grace
    }

    /// Pause after a completed transition before a recorded successor
    /// starts its own.
    pub fn settle(&self) -> Duration {
        self.settle
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1200),
            Duration::from_millis(2000),
            Duration::from_millis(150),
        )
    }
}

/// Coarse state of the director, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorState {
    /// No scene has been displayed yet.
    Idle,
    /// One current scene, no transition animating.
    Stable,
    /// A handover is animating.
    Transitioning,
}

/// Notifications produced by the director, drained via
/// [`SceneDirector::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorEvent {
    /// A scene instance for this build started becoming visible (immediate
    /// cut or fade start).
    Shown {
        /// The build taking over the display.
        code: BuildCode,
    },
}

#[derive(Debug, Clone)]
struct SceneRecord {
    id: SceneId,
    code: BuildCode,
}

#[derive(Debug)]
struct Retired {
    id: SceneId,
    due: Instant,
}

/// Serialized scene-handover state machine over a display backend.
pub struct SceneDirector<B: SceneBackend> {
    backend: B,
    config: DirectorConfig,
    current: Option<SceneRecord>,
    incoming: Option<(SceneRecord, Instant)>,
    pending: Option<SceneRecord>,
    settle_until: Option<Instant>,
    retired: Vec<Retired>,
    events: Vec<DirectorEvent>,
}

impl<B: SceneBackend> SceneDirector<B> {
    /// Creates an idle director over `backend`.
    pub fn new(backend: B, config: DirectorConfig) -> Self {
        Self {
            backend,
            config,
            current: None,
            incoming: None,
            pending: None,
            settle_until: None,
            retired: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Requests that the scene for `code` become the visible one.
    ///
    /// Returns true when the request changed director state; repeats of the
    /// already-visible or already-requested build are no-ops.
    pub fn show(&mut self, code: &BuildCode) -> bool {
        if self.is_already_requested(code) {
            log::debug!("Build {code} already displayed or requested; ignoring");
            return false;
        }

        if self.incoming.is_some() {
            // A handover is animating: record the single pending successor.
            // An earlier, different successor is superseded before anything
            // of it ever became visible.
            let record = match self.create_record(code) {
                Some(record) => record,
                None => return false,
            };
            if let Some(old) = self.pending.replace(record) {
                log::debug!(
                    "Pending build {} superseded by {code} before its transition started",
                    old.code
                );
                self.retire(old);
            }
            return true;
        }

        match self.current {
            None => self.show_initial(code),
            Some(_) => self.show_fade(code),
        }
    }

    /// Advances transitions and teardown. Call once per host-loop tick.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.complete_transition(now);
        self.drain_retired(now);
        self.start_pending(now);
    }

    /// Drains the notifications accumulated since the last call.
    pub fn poll_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// The build whose scene is settled as current, if any.
    pub fn current_code(&self) -> Option<&BuildCode> {
        self.current.as_ref().map(|r| &r.code)
    }

    /// The build the display is showing or fading towards.
    pub fn displayed_code(&self) -> Option<&BuildCode> {
        self.incoming
            .as_ref()
            .map(|(r, _)| &r.code)
            .or_else(|| self.current_code())
    }

    /// The coarse state of the handover machine.
    pub fn state(&self) -> DirectorState {
        if self.incoming.is_some() {
            DirectorState::Transitioning
        } else if self.current.is_some() {
            DirectorState::Stable
        } else {
            DirectorState::Idle
        }
    }

    /// Access to the underlying backend (e.g. for the host to resize).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn is_already_requested(&self, code: &BuildCode) -> bool {
        if let Some((record, _)) = &self.incoming {
            // Mid-transition, the incoming instance is the one becoming
            // visible; the fading-out current may legitimately be
            // re-requested to fade back.
            return record.code == *code
                || self.pending.as_ref().is_some_and(|p| p.code == *code);
        }
        self.current.as_ref().is_some_and(|r| r.code == *code)
            || self.pending.as_ref().is_some_and(|p| p.code == *code)
    }

    fn show_initial(&mut self, code: &BuildCode) -> bool {
        let Some(record) = self.create_record(code) else {
            return false;
        };
        match self.backend.begin_transition(record.id, Duration::ZERO) {
            Ok(()) => {
                log::info!("Displaying build {code} (initial scene, immediate)");
                self.events.push(DirectorEvent::Shown { code: code.clone() });
                self.current = Some(record);
                true
            }
            Err(e) => {
                log::warn!("Initial display of build {code} failed: {e}");
                self.destroy_quietly(record.id);
                false
            }
        }
    }

    fn show_fade(&mut self, code: &BuildCode) -> bool {
        // A successor still waiting out the settle delay is superseded by
        // this newer request, unless it names the same build and its
        // instance can be promoted as-is.
        let record = match self.pending.take() {
            Some(p) if p.code == *code => p,
            other => {
                if let Some(stale) = other {
                    self.retire(stale);
                }
                match self.create_record(code) {
                    Some(record) => record,
                    None => return false,
                }
            }
        };

        match self.backend.begin_transition(record.id, self.config.transition) {
            Ok(()) => {
                log::info!(
                    "Transitioning to build {code} over {:?}",
                    self.config.transition
                );
                self.events.push(DirectorEvent::Shown { code: code.clone() });
                self.incoming = Some((record, Instant::now()));
                true
            }
            Err(e) => {
                // The display backend rejected the swap: abort rather than
                // wedging in the transitioning state.
                log::warn!("Transition to build {code} failed to start: {e}");
                self.destroy_quietly(record.id);
                false
            }
        }
    }

    fn complete_transition(&mut self, now: Instant) {
        let Some((record, started)) = self.incoming.take() else {
            return;
        };
        if started.elapsed() < self.config.transition {
            self.incoming = Some((record, started));
            return;
        }

        log::debug!("Transition to build {} completed", record.code);
        if let Some(old) = self.current.replace(record) {
            self.retired.push(Retired {
                id: old.id,
                due: now + self.config.teardown_grace,
            });
        }
        self.settle_until = Some(now + self.config.settle);
    }

    fn drain_retired(&mut self, now: Instant) {
        if self.retired.is_empty() {
            return;
        }

        let protected: Vec<SceneId> = self
            .current
            .iter()
            .map(|r| r.id)
            .chain(self.incoming.iter().map(|(r, _)| r.id))
            .chain(self.pending.iter().map(|r| r.id))
            .collect();

        let due: Vec<Retired> = {
            let (due, waiting) = std::mem::take(&mut self.retired)
                .into_iter()
                .partition(|r| now >= r.due);
            self.retired = waiting;
            due
        };

        for retired in due {
            if protected.contains(&retired.id) {
                // Promoted back into service after being scheduled; the
                // identity guard outranks the elapsed grace period.
                log::debug!("{} is live again; skipping teardown", retired.id);
                continue;
            }
            self.destroy_quietly(retired.id);
        }
    }

    fn start_pending(&mut self, now: Instant) {
        if self.incoming.is_some() {
            return;
        }
        let Some(settle_until) = self.settle_until else {
            return;
        };
        if now < settle_until {
            return;
        }
        self.settle_until = None;

        let Some(next) = self.pending.take() else {
            return;
        };
        match self.backend.begin_transition(next.id, self.config.transition) {
            Ok(()) => {
                log::info!("Starting deferred transition to build {}", next.code);
                self.events.push(DirectorEvent::Shown {
                    code: next.code.clone(),
                });
                self.incoming = Some((next, now));
            }
            Err(e) => {
                log::warn!("Deferred transition to build {} failed: {e}", next.code);
                self.destroy_quietly(next.id);
            }
        }
    }

    fn create_record(&mut self, code: &BuildCode) -> Option<SceneRecord> {
        match self.backend.create_scene(code) {
            Ok(id) => Some(SceneRecord {
                id,
                code: code.clone(),
            }),
            Err(e) => {
                log::warn!("Scene creation for build {code} failed: {e}");
                None
            }
        }
    }

    fn retire(&mut self, record: SceneRecord) {
        self.retired.push(Retired {
            id: record.id,
            due: Instant::now() + self.config.teardown_grace,
        });
    }

    fn destroy_quietly(&mut self, id: SceneId) {
        // The underlying resource may already be gone; teardown failures
        // are advisory.
        if let Err(e) = self.backend.destroy_scene(id) {
            log::debug!("Teardown of {id} reported: {e}");
        }
    }
}
