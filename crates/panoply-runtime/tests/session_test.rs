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
use panoply_core::project::Project;
use panoply_core::remote::{
    AvailabilityProbe, RenderRequest, RenderSubmitter, SubmissionError, SubmitAck, SubmitStatus,
};
use panoply_core::retry::RetryPolicy;
use panoply_core::scene::{SceneBackend, SceneBackendError, SceneId};
use panoply_runtime::director::DirectorConfig;
use panoply_runtime::queue::QueueConfig;
use panoply_runtime::session::{SessionConfig, SessionEvent, ViewerSession};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store double. Individual builds can be pre-published; `publish_all`
/// makes every probe succeed, standing in for a worker that finished
/// whatever was asked of it.
#[derive(Default)]
struct FakeStore {
    available: Mutex<HashSet<String>>,
    wildcard: AtomicBool,
}

impl FakeStore {
    fn publish(&self, code: &str) {
        self.available.lock().unwrap().insert(code.to_string());
    }

    fn publish_all(&self) {
        self.wildcard.store(true, Ordering::SeqCst);
    }
}

impl AvailabilityProbe for FakeStore {
    fn exists(&self, _scene: &str, code: &BuildCode) -> bool {
        self.wildcard.load(Ordering::SeqCst)
            || self.available.lock().unwrap().contains(code.as_str())
    }
}

/// Worker double that renders instantly by publishing into the store.
struct FakeWorker {
    store: Arc<FakeStore>,
    accept: bool,
    submissions: Mutex<Vec<String>>,
}

impl FakeWorker {
    fn new(store: Arc<FakeStore>, accept: bool) -> Self {
        Self {
            store,
            accept,
            submissions: Mutex::new(Vec::new()),
        }
    }
}

impl RenderSubmitter for FakeWorker {
    fn submit(&self, request: &RenderRequest) -> Result<SubmitAck, SubmissionError> {
        self.submissions
            .lock()
            .unwrap()
            .push(request.scene.clone());
        if !self.accept {
            return Err(SubmissionError::Rejected { status: 503 });
        }
        // A real worker re-derives the code from the snapshot; the double
        // cannot, so it completes by making every probe succeed.
        self.store.publish_all();
        Ok(SubmitAck {
            status: SubmitStatus::Generated,
            build: String::new(),
        })
    }
}

/// Recording scene backend.
#[derive(Clone, Default)]
struct FakeViewer {
    state: Arc<Mutex<ViewerState>>,
}

#[derive(Default)]
struct ViewerState {
    next_id: u64,
    created: Vec<(SceneId, String)>,
    destroyed: Vec<SceneId>,
}

impl SceneBackend for FakeViewer {
    fn create_scene(&mut self, code: &BuildCode) -> Result<SceneId, SceneBackendError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = SceneId(state.next_id);
        state.created.push((id, code.to_string()));
        Ok(id)
    }

    fn begin_transition(
        &mut self,
        _to: SceneId,
        _duration: Duration,
    ) -> Result<(), SceneBackendError> {
        Ok(())
    }

    fn destroy_scene(&mut self, id: SceneId) -> Result<(), SceneBackendError> {
        self.state.lock().unwrap().destroyed.push(id);
        Ok(())
    }
}

fn project() -> Arc<Project> {
    let json = r#"{
        "client": "atelier",
        "configStringBase": 36,
        "buildChars": 2,
        "scenes": [
            {
                "id": "front",
                "scene_index": 0,
                "layers": [
                    {
                        "id": "roof",
                        "build_order": 0,
                        "items": [
                            { "id": "roof-base", "index": 0 },
                            { "id": "roof-slate", "index": 5 }
                        ]
                    },
                    {
                        "id": "wall",
                        "build_order": 1,
                        "items": [
                            { "id": "wall-base", "index": 0 },
                            { "id": "wall-brick", "index": 14 }
                        ]
                    }
                ]
            }
        ]
    }"#;
    Arc::new(Project::from_json(json).unwrap())
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        queue: QueueConfig {
            min_dispatch_interval: Duration::from_millis(1),
            poll: RetryPolicy::new(Duration::from_millis(2), 10),
        },
        director: DirectorConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(15),
            Duration::from_millis(2),
        ),
    }
}

/// Pumps the session until `done` returns true or the deadline passes.
fn pump_until<B: SceneBackend>(
    session: &mut ViewerSession<B>,
    mut done: impl FnMut(&ViewerSession<B>) -> bool,
) -> bool {
    for _ in 0..400 {
        session.pump();
        if done(session) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn cached_default_build_displays_automatically() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000"); // the default build is already baked
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();
    let events = session.events();

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("0000"))
    }));

    let seen: Vec<SessionEvent> = events.try_iter().collect();
    assert!(seen.contains(&SessionEvent::RenderQueued {
        code: BuildCode::new("0000")
    }));
    assert!(seen.contains(&SessionEvent::Displayed {
        code: BuildCode::new("0000")
    }));
    assert!(
        worker.submissions.lock().unwrap().is_empty(),
        "a cached build must not be rendered again"
    );
    session.stop();
}

#[test]
fn selection_change_renders_and_hands_over() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000");
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("0000"))
    }));

    // roof-slate (5) + wall-brick (14) => "050e"; missing from the store,
    // so the queue dispatches a render and hands over once tiles appear.
    assert!(session.select("roof", "roof-slate"));
    assert!(session.select("wall", "wall-brick"));
    assert_eq!(session.desired_code(), Some(&BuildCode::new("050e")));

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("050e"))
    }));
    assert!(!worker.submissions.lock().unwrap().is_empty());
    session.stop();
}

#[test]
fn failed_render_surfaces_notice_and_keeps_old_scene() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000");
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), false));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();
    let events = session.events();

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("0000"))
    }));

    session.select("roof", "roof-slate");

    let mut saw_failure = false;
    for _ in 0..400 {
        session.pump();
        for event in events.try_iter() {
            if matches!(
                &event,
                SessionEvent::RenderFailed { code, .. } if *code == BuildCode::new("0500")
            ) {
                saw_failure = true;
            }
        }
        if saw_failure {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(saw_failure, "the failed job must surface a notice");
    assert_eq!(session.displayed_code(), Some(&BuildCode::new("0000")));
    session.stop();
}

#[test]
fn restore_applies_a_shared_code() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000");
    store.publish("050e");
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();

    session.restore("050e");
    assert_eq!(session.selection().get("roof").unwrap(), "roof-slate");
    assert_eq!(session.selection().get("wall").unwrap(), "wall-brick");

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("050e"))
    }));
    session.stop();
}

#[test]
fn restore_rejects_malformed_codes() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000");
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();

    // Wrong length and illegal alphabet both fall back to the defaults.
    session.restore("05");
    session.restore("05-e");
    assert_eq!(session.selection().get("roof").unwrap(), "roof-base");
    assert_eq!(session.desired_code(), Some(&BuildCode::new("0000")));
    session.stop();
}

#[test]
fn rapid_reselection_lands_on_the_latest_build() {
    let store = Arc::new(FakeStore::default());
    store.publish("0000");
    store.publish("0500");
    store.publish("050e");
    let worker = Arc::new(FakeWorker::new(Arc::clone(&store), true));

    let mut session = ViewerSession::new(
        project(),
        "front",
        FakeViewer::default(),
        Arc::clone(&store) as _,
        Arc::clone(&worker) as _,
        fast_config(),
    )
    .unwrap();

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("0000"))
    }));

    // Two quick edits: the session must converge on the second one.
    session.select("roof", "roof-slate"); // 0500
    session.select("wall", "wall-brick"); // 050e

    assert!(pump_until(&mut session, |s| {
        s.displayed_code() == Some(&BuildCode::new("050e"))
    }));
    assert_eq!(session.desired_code(), Some(&BuildCode::new("050e")));
    session.stop();
}
