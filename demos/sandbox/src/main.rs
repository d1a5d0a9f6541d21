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

// Panoply sandbox
// Drives one headless viewer session against a live deployment: loads a
// client config, requests a build, and reports when its tiles are displayed.

use anyhow::{Context, Result};
use clap::Parser;
use panoply_core::code::BuildCode;
use panoply_core::project::Project;
use panoply_core::scene::{SceneBackend, SceneBackendError, SceneId};
use panoply_runtime::session::{SessionConfig, SessionEvent, ViewerSession};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "sandbox", about = "Headless Panoply session driver")]
struct Args {
    /// Path to the client's project configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Render worker API base URL.
    #[arg(long, default_value = "http://localhost:8000")]
    api_url: String,

    /// Tile store base URL.
    #[arg(long, default_value = "http://localhost:8000/panoply_cache")]
    store_url: String,

    /// Scene to open; defaults to the project's first scene.
    #[arg(long)]
    scene: Option<String>,

    /// Optional shared build code to restore.
    #[arg(long)]
    code: Option<String>,

    /// Also request a flat 2-D snapshot once the build is displayed.
    #[arg(long)]
    snapshot: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

/// Headless scene backend: logs what a real viewer would do.
#[derive(Default)]
struct LogViewer {
    next_id: u64,
}

impl SceneBackend for LogViewer {
    fn create_scene(&mut self, code: &BuildCode) -> Result<SceneId, SceneBackendError> {
        self.next_id += 1;
        let id = SceneId(self.next_id);
        log::info!("[viewer] created {id} for build {code}");
        Ok(id)
    }

    fn begin_transition(
        &mut self,
        to: SceneId,
        duration: Duration,
    ) -> Result<(), SceneBackendError> {
        log::info!("[viewer] transitioning to {to} over {duration:?}");
        Ok(())
    }

    fn destroy_scene(&mut self, id: SceneId) -> Result<(), SceneBackendError> {
        log::info!("[viewer] destroyed {id}");
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let json = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let project = Arc::new(Project::from_json(&json)?);

    let scene_id = match &args.scene {
        Some(scene) => scene.clone(),
        None => project
            .scene_list()
            .first()
            .context("Project defines no scenes")?
            .to_string(),
    };

    let mut session = ViewerSession::connect(
        Arc::clone(&project),
        &scene_id,
        LogViewer::default(),
        &args.api_url,
        &args.store_url,
        SessionConfig::default(),
    )?;
    let events = session.events();

    if let Some(code) = &args.code {
        session.restore(code);
    }

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let outcome = loop {
        session.pump();

        let mut terminal = None;
        for event in events.try_iter() {
            match event {
                SessionEvent::Displayed { code } => {
                    println!("displayed build {code}");
                    if session.desired_code() == Some(&code) {
                        terminal = Some(Ok(code));
                    }
                }
                SessionEvent::RenderQueued { code } => {
                    println!("render queued for build {code}");
                }
                SessionEvent::RenderFailed { code, reason } => {
                    if session.desired_code() == Some(&code) {
                        terminal = Some(Err(anyhow::anyhow!(
                            "build {code} failed to render: {reason}"
                        )));
                    }
                }
                SessionEvent::SelectionChanged { layer, item } => {
                    log::debug!("selection: {layer} -> {item}");
                }
                SessionEvent::SceneChanged { scene } => {
                    log::info!("scene: {scene}");
                }
            }
        }
        if let Some(outcome) = terminal {
            break outcome;
        }
        if Instant::now() >= deadline {
            break Err(anyhow::anyhow!(
                "timed out after {}s waiting for a terminal state",
                args.timeout
            ));
        }
        std::thread::sleep(Duration::from_millis(100));
    };

    let code = outcome?;
    if let Some(template) = session.tile_url_template() {
        println!("tile template: {template}");
    }
    println!("session settled on build {code}");

    if args.snapshot {
        match session.render_snapshot() {
            Some(Ok(ack)) => println!("snapshot ready: {}", ack.url),
            Some(Err(e)) => log::warn!("snapshot request failed: {e}"),
            None => {}
        }
    }

    session.stop();
    Ok(())
}
