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

use panoply_core::code::BuildCode;
use panoply_core::remote::{
    AvailabilityProbe, RenderRequest, RenderSubmitter, SubmissionError, SubmitAck, SubmitStatus,
};
use panoply_core::retry::RetryPolicy;
use panoply_core::selection::Selection;
use panoply_runtime::queue::{QueueConfig, QueueEvent, RenderFailure, RenderQueue};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory stand-in for the tile store: a build "exists" once its code is
/// in the shared set. Every probe is recorded.
#[derive(Default)]
struct FakeStore {
    available: Mutex<HashSet<String>>,
    probes: Mutex<Vec<String>>,
}

impl FakeStore {
    fn publish(&self, code: &str) {
        self.available.lock().unwrap().insert(code.to_string());
    }

    fn probe_count(&self, code: &str) -> usize {
        self.probes.lock().unwrap().iter().filter(|c| *c == code).count()
    }
}

impl AvailabilityProbe for FakeStore {
    fn exists(&self, _scene: &str, code: &BuildCode) -> bool {
        self.probes.lock().unwrap().push(code.to_string());
        self.available.lock().unwrap().contains(code.as_str())
    }
}

/// Submitter double. On accept it "renders" by publishing the build into
/// the fake store, either immediately or never (for timeout tests).
struct FakeWorker {
    store: Arc<FakeStore>,
    accept: bool,
    completes: bool,
    submissions: Mutex<Vec<String>>,
}

impl FakeWorker {
    fn new(store: Arc<FakeStore>, accept: bool, completes: bool) -> Self {
        Self {
            store,
            accept,
            completes,
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }
}

impl RenderSubmitter for FakeWorker {
    fn submit(&self, request: &RenderRequest) -> Result<SubmitAck, SubmissionError> {
        // A real worker re-derives the code from the snapshot; the tests
        // smuggle it through a "code" entry instead.
        let code = request
            .selection
            .get("code")
            .cloned()
            .unwrap_or_else(|| "0000".to_string());
        self.submissions.lock().unwrap().push(code.clone());

        if !self.accept {
            return Err(SubmissionError::Rejected { status: 500 });
        }
        if self.completes {
            self.store.publish(&code);
        }
        Ok(SubmitAck {
            status: SubmitStatus::Generated,
            build: code,
        })
    }
}

fn request_for(code: &BuildCode) -> RenderRequest {
    let mut selection = Selection::new();
    selection.insert("code".to_string(), code.to_string());
    RenderRequest {
        client: "atelier".to_string(),
        scene: "front".to_string(),
        selection,
    }
}

fn fast_config() -> QueueConfig {
    QueueConfig {
        min_dispatch_interval: Duration::from_millis(1),
        poll: RetryPolicy::new(Duration::from_millis(2), 5),
    }
}

fn recv_terminal(events: &crossbeam_channel::Receiver<QueueEvent>) -> QueueEvent {
    events
        .recv_timeout(Duration::from_secs(5))
        .expect("queue should reach a terminal state")
}

#[test]
fn duplicate_enqueue_dispatches_exactly_one_render() {
    let store = Arc::new(FakeStore::default());
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true, true));
    let (mut queue, events) =
        RenderQueue::new(fast_config(), Arc::clone(&store) as _, Arc::clone(&worker) as _);

    let code = BuildCode::new("050e");
    // Both enqueues land before the worker starts, so the dedup window is
    // guaranteed to cover them.
    assert!(queue.enqueue(code.clone(), request_for(&code)));
    assert!(!queue.enqueue(code.clone(), request_for(&code)));

    queue.start();
    match recv_terminal(&events) {
        QueueEvent::Ready { code: ready } => assert_eq!(ready, code),
        other => panic!("expected Ready, got {other:?}"),
    }

    assert_eq!(worker.submissions(), vec!["050e".to_string()]);
    assert!(
        events.recv_timeout(Duration::from_millis(200)).is_err(),
        "the duplicate enqueue must not produce a second terminal event"
    );
    queue.stop();
}

#[test]
fn jobs_dispatch_in_fifo_order() {
    let store = Arc::new(FakeStore::default());
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true, true));
    let (mut queue, events) =
        RenderQueue::new(fast_config(), Arc::clone(&store) as _, Arc::clone(&worker) as _);

    let a = BuildCode::new("0001");
    let b = BuildCode::new("0002");
    assert!(queue.enqueue(a.clone(), request_for(&a)));
    assert!(queue.enqueue(b.clone(), request_for(&b)));

    queue.start();
    let first = recv_terminal(&events);
    let second = recv_terminal(&events);
    assert_eq!(first, QueueEvent::Ready { code: a });
    assert_eq!(second, QueueEvent::Ready { code: b });

    assert_eq!(
        worker.submissions(),
        vec!["0001".to_string(), "0002".to_string()]
    );
    queue.stop();
}

#[test]
fn queued_job_skips_dispatch_when_build_appears_out_of_band() {
    let store = Arc::new(FakeStore::default());
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true, true));
    let (mut queue, events) =
        RenderQueue::new(fast_config(), Arc::clone(&store) as _, Arc::clone(&worker) as _);

    let code = BuildCode::new("050e");
    assert!(queue.enqueue(code.clone(), request_for(&code)));

    // The build materializes (e.g. a concurrent session rendered it) while
    // the job is still waiting in line.
    store.publish("050e");
    queue.start();

    match recv_terminal(&events) {
        QueueEvent::Ready { code: ready } => assert_eq!(ready, code),
        other => panic!("expected Ready, got {other:?}"),
    }
    assert!(
        worker.submissions().is_empty(),
        "an already-available build must not be dispatched"
    );
    queue.stop();
}

#[test]
fn poll_timeout_is_surfaced_as_failure_and_clears_the_flight() {
    let store = Arc::new(FakeStore::default());
    // Accepts the job but never publishes tiles.
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true, false));
    let (mut queue, events) =
        RenderQueue::new(fast_config(), Arc::clone(&store) as _, Arc::clone(&worker) as _);
    queue.start();

    let code = BuildCode::new("050e");
    assert!(queue.enqueue(code.clone(), request_for(&code)));

    match recv_terminal(&events) {
        QueueEvent::Failed { code: failed, reason } => {
            assert_eq!(failed, code);
            assert_eq!(reason, RenderFailure::PollTimeout);
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // The full polling budget was spent: one pre-dispatch probe plus five
    // polling attempts.
    assert_eq!(store.probe_count("050e"), 6);

    // Terminal state frees the code for a fresh attempt.
    assert!(!queue.is_in_flight(&code));
    assert!(queue.enqueue(code.clone(), request_for(&code)));
    queue.stop();
}

#[test]
fn rejected_submission_fails_without_retry() {
    let store = Arc::new(FakeStore::default());
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), false, false));
    let (mut queue, events) =
        RenderQueue::new(fast_config(), Arc::clone(&store) as _, Arc::clone(&worker) as _);
    queue.start();

    let code = BuildCode::new("050e");
    assert!(queue.enqueue(code.clone(), request_for(&code)));

    match recv_terminal(&events) {
        QueueEvent::Failed { reason, .. } => {
            assert!(matches!(reason, RenderFailure::Submission(_)));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(
        worker.submissions().len(),
        1,
        "a failed job must not be resubmitted"
    );
    queue.stop();
}
