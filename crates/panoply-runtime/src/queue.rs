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

//! Deduplicated, rate-limited render job queue.
//!
//! For any build code there is at most one render request in flight
//! system-wide, no matter how often the UI asks for it, and the remote
//! worker is never fed faster than one job per configured interval. A single
//! background worker drains the queue strictly FIFO; completion is surfaced
//! as [`QueueEvent`]s on the receiver returned by [`RenderQueue::new`].

use panoply_core::code::BuildCode;
use panoply_core::remote::{AvailabilityProbe, RenderRequest, RenderSubmitter, SubmitStatus};
use panoply_core::retry::RetryPolicy;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Configuration for the render queue service.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Minimum pause between consecutive job dispatches (global pacing,
    /// matching the worker's rate limit).
    pub min_dispatch_interval: Duration,
    /// Completion-polling cadence and attempt budget.
    pub poll: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_dispatch_interval: Duration::from_secs(1),
            poll: RetryPolicy::default(),
        }
    }
}

/// Why a job reached the `failed` terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// The worker rejected the submission; no retry is attempted.
    Submission(String),
    /// The tile set never appeared within the polling budget.
    PollTimeout,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderFailure::Submission(msg) => write!(f, "Submission failed: {msg}"),
            RenderFailure::PollTimeout => {
                write!(f, "Tile set never appeared within the polling budget")
            }
        }
    }
}

/// Terminal outcome of one job, emitted to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// The build's tile set is available in the store.
    Ready {
        /// The finished build.
        code: BuildCode,
    },
    /// The job failed; a fresh enqueue is the only retry path.
    Failed {
        /// The failed build.
        code: BuildCode,
        /// Terminal failure cause.
        reason: RenderFailure,
    },
}

struct Job {
    code: BuildCode,
    request: RenderRequest,
}

/// Background render-queue service.
///
/// The in-flight set is the sole back-pressure mechanism: repeated enqueues
/// for a code already in flight are cheap no-ops, so rapid identical
/// requests never amplify load on the worker.
pub struct RenderQueue {
    config: QueueConfig,
    probe: Arc<dyn AvailabilityProbe>,
    submitter: Arc<dyn RenderSubmitter>,
    in_flight: Arc<Mutex<HashSet<BuildCode>>>,
    job_tx: crossbeam_channel::Sender<Job>,
    job_rx: Option<crossbeam_channel::Receiver<Job>>,
    event_tx: crossbeam_channel::Sender<QueueEvent>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderQueue {
    /// Creates the queue and returns it together with its event receiver.
    ///
    /// The worker thread does not run until [`start`](Self::start) is called.
    pub fn new(
        config: QueueConfig,
        probe: Arc<dyn AvailabilityProbe>,
        submitter: Arc<dyn RenderSubmitter>,
    ) -> (Self, crossbeam_channel::Receiver<QueueEvent>) {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let queue = Self {
            config,
            probe,
            submitter,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            job_tx,
            job_rx: Some(job_rx),
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        (queue, event_rx)
    }

    /// Starts the background worker thread.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(job_rx) = self.job_rx.take() else {
            return;
        };

        let running = Arc::clone(&self.running);
        let in_flight = Arc::clone(&self.in_flight);
        let probe = Arc::clone(&self.probe);
        let submitter = Arc::clone(&self.submitter);
        let event_tx = self.event_tx.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            log::info!("Render queue worker started.");
            while running.load(Ordering::Relaxed) {
                match job_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(job) => {
                        let event = Self::process_job(&job, &config, &*probe, &*submitter, &running);

                        // The code leaves the in-flight set on every terminal
                        // state, before the completion event is observable.
                        in_flight
                            .lock()
                            .expect("in-flight set lock poisoned")
                            .remove(&job.code);

                        if event_tx.send(event).is_err() {
                            log::warn!("Queue event receiver dropped; stopping worker");
                            break;
                        }

                        // Global pacing between jobs, regardless of outcome.
                        thread::sleep(config.min_dispatch_interval);
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            log::info!("Render queue worker stopped.");
        });
        self.handle = Some(handle);
    }

    /// Enqueues a render job for `code` with an immutable selection snapshot.
    ///
    /// Returns false without queueing anything when the code is already in
    /// flight (dedup invariant: the in-flight set never holds duplicates).
    /// Never blocks on I/O; the caller learns the outcome through the event
    /// receiver.
    pub fn enqueue(&self, code: BuildCode, request: RenderRequest) -> bool {
        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set lock poisoned");
            if !in_flight.insert(code.clone()) {
                log::debug!("Build {code} already in flight; enqueue is a no-op");
                return false;
            }
        }

        log::info!("Build {code} queued for render");
        if self.job_tx.send(Job { code: code.clone(), request }).is_err() {
            log::warn!("Render queue worker unavailable; dropping job {code}");
            self.in_flight
                .lock()
                .expect("in-flight set lock poisoned")
                .remove(&code);
            return false;
        }
        true
    }

    /// Whether a job for `code` is currently queued or being processed.
    pub fn is_in_flight(&self, code: &BuildCode) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight set lock poisoned")
            .contains(code)
    }

    /// Stops the worker and joins it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Runs one job to its terminal state.
    fn process_job(
        job: &Job,
        config: &QueueConfig,
        probe: &dyn AvailabilityProbe,
        submitter: &dyn RenderSubmitter,
        running: &AtomicBool,
    ) -> QueueEvent {
        let scene = job.request.scene.as_str();

        // The asset may have appeared while the job waited in line (for
        // example, requested by a concurrent session); skip dispatch then.
        if probe.exists(scene, &job.code) {
            log::info!("Build {} became available while queued; skipping dispatch", job.code);
            return QueueEvent::Ready {
                code: job.code.clone(),
            };
        }

        log::debug!("Dispatching render for build {}", job.code);
        let ack = match submitter.submit(&job.request) {
            Ok(ack) => ack,
            Err(e) => {
                log::warn!("Render submission for build {} failed: {e}", job.code);
                return QueueEvent::Failed {
                    code: job.code.clone(),
                    reason: RenderFailure::Submission(e.to_string()),
                };
            }
        };

        if ack.build != job.code.as_str() {
            // The worker derived a different code from the same snapshot:
            // the two ends disagree on radix or width. The job can still
            // complete, but the configuration needs fixing.
            log::warn!(
                "Worker derived build '{}' where the client derived '{}'; check shared codec configuration",
                ack.build,
                job.code
            );
        }

        if ack.status == SubmitStatus::Cached {
            log::debug!("Worker reports build {} already cached", job.code);
            return QueueEvent::Ready {
                code: job.code.clone(),
            };
        }

        log::debug!(
            "Polling store for build {} (every {:?}, {} attempts max)",
            job.code,
            config.poll.interval,
            config.poll.max_attempts
        );
        let appeared = config.poll.poll_until(
            || probe.exists(scene, &job.code),
            || running.load(Ordering::Relaxed),
        );

        if appeared {
            log::info!("Build {} is ready", job.code);
            QueueEvent::Ready {
                code: job.code.clone(),
            }
        } else {
            log::warn!("Build {} timed out waiting for tiles", job.code);
            QueueEvent::Failed {
                code: job.code.clone(),
                reason: RenderFailure::PollTimeout,
            }
        }
    }
}

impl Drop for RenderQueue {
    fn drop(&mut self) {
        self.stop();
    }
}
