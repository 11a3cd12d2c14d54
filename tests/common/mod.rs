// Shared test doubles for the controller integration tests.
//
// The scripted engine stands in for the platform capture primitive. Its
// status feed runs on the (paused) tokio test clock and can be made to
// glitch or die at a chosen offset, which is how the recovery scenarios are
// driven deterministically.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use botmr_recorder::config::RecorderConfig;
use botmr_recorder::{
    AppLifecycle, BackgroundGuard, CaptureEngine, ControllerDeps, EngineHandle, EngineStatus,
    MemoryMeetingStore, RecorderEvent, RecordingController, RecordingStorage,
};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How the scripted engine's status feed behaves over the session.
#[derive(Debug, Clone, Copy)]
pub enum EngineBehavior {
    /// Status tracks capture faithfully for the whole session.
    Healthy,
    /// From `at_ms` the status feed reports inactive with a frozen duration,
    /// but capture internally continues; a resume() call heals the feed.
    StatusGlitchAt { at_ms: u64 },
    /// Capture genuinely dies at `at_ms`: duration freezes there and
    /// resume() fails from then on.
    DiesAt { at_ms: u64 },
}

pub struct ScriptedEngine {
    behavior: EngineBehavior,
    capture_dir: PathBuf,
    create_delay: Duration,
    pub deny_permission: AtomicBool,
    /// Fail this many create() calls before succeeding.
    pub create_failures: AtomicU32,
    pub create_calls: AtomicU32,
}

impl ScriptedEngine {
    pub fn new(behavior: EngineBehavior, capture_dir: PathBuf) -> Self {
        Self {
            behavior,
            capture_dir,
            create_delay: Duration::ZERO,
            deny_permission: AtomicBool::new(false),
            create_failures: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }
}

#[async_trait]
impl CaptureEngine for ScriptedEngine {
    async fn request_permission(&self) -> Result<bool> {
        Ok(!self.deny_permission.load(Ordering::SeqCst))
    }

    async fn create(&self) -> Result<Box<dyn EngineHandle>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        if self.create_failures.load(Ordering::SeqCst) > 0 {
            self.create_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("capture device busy"));
        }

        std::fs::create_dir_all(&self.capture_dir).context("capture dir")?;
        let path = self
            .capture_dir
            .join(format!("capture-{}.wav", uuid::Uuid::new_v4()));

        Ok(Box::new(ScriptedHandle {
            behavior: self.behavior,
            path,
            state: Mutex::new(HandleState::default()),
        }))
    }
}

#[derive(Default)]
struct HandleState {
    started_at: Option<Instant>,
    paused_accum: Duration,
    pause_started: Option<Instant>,
    healed: bool,
    stopped: bool,
}

impl HandleState {
    fn elapsed_ms(&self) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let paused = match self.pause_started {
            Some(since) => self.paused_accum + since.elapsed(),
            None => self.paused_accum,
        };
        started_at.elapsed().saturating_sub(paused).as_millis() as u64
    }
}

struct ScriptedHandle {
    behavior: EngineBehavior,
    path: PathBuf,
    state: Mutex<HandleState>,
}

#[async_trait]
impl EngineHandle for ScriptedHandle {
    async fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.started_at = Some(Instant::now());
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.pause_started.is_none() {
            state.pause_started = Some(Instant::now());
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if let EngineBehavior::DiesAt { at_ms } = self.behavior {
            if state.elapsed_ms() >= at_ms {
                return Err(anyhow!("capture device gone"));
            }
        }

        if let Some(since) = state.pause_started.take() {
            state.paused_accum += since.elapsed();
        }
        state.healed = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf> {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        std::fs::write(&self.path, b"scripted-audio").context("write artifact")?;
        Ok(self.path.clone())
    }

    async fn status(&self) -> Result<EngineStatus> {
        let state = self.state.lock().unwrap();
        let running =
            state.started_at.is_some() && state.pause_started.is_none() && !state.stopped;
        let elapsed = state.elapsed_ms();

        let (is_active, reported) = match self.behavior {
            EngineBehavior::Healthy => (running, elapsed),
            EngineBehavior::StatusGlitchAt { at_ms } => {
                if !state.healed && elapsed >= at_ms {
                    (false, at_ms)
                } else {
                    (running, elapsed)
                }
            }
            EngineBehavior::DiesAt { at_ms } => {
                if elapsed >= at_ms {
                    (false, at_ms)
                } else {
                    (running, elapsed)
                }
            }
        };

        Ok(EngineStatus {
            is_active,
            reported_duration_ms: reported,
        })
    }
}

#[derive(Default)]
pub struct TestGuard {
    active: AtomicBool,
    /// All acquire() calls return Ok(false).
    pub deny_acquire: AtomicBool,
    pub acquires: AtomicU32,
    pub releases: AtomicU32,
    pub renews: AtomicU32,
}

impl TestGuard {
    /// Simulate the OS revoking the grant out from under us.
    pub fn revoke(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackgroundGuard for TestGuard {
    async fn acquire(&self, _started_at: DateTime<Utc>) -> Result<bool> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.deny_acquire.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn renew(&self, _elapsed_ms: u64) -> Result<()> {
        self.renews.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub controller: RecordingController,
    pub events: mpsc::UnboundedReceiver<RecorderEvent>,
    pub engine: Arc<ScriptedEngine>,
    pub guard: Arc<TestGuard>,
    pub store: Arc<MemoryMeetingStore>,
    pub lifecycle: AppLifecycle,
    pub temp: TempDir,
}

impl Harness {
    pub fn capture_dir(&self) -> PathBuf {
        self.temp.path().join("capture")
    }

    pub fn capture_files(&self) -> usize {
        match std::fs::read_dir(self.capture_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

pub fn build(behavior: EngineBehavior) -> Harness {
    let temp = TempDir::new().expect("tempdir");
    let engine = Arc::new(ScriptedEngine::new(behavior, temp.path().join("capture")));
    build_from(engine, temp, RecorderConfig::default())
}

pub fn build_with_create_delay(behavior: EngineBehavior, delay: Duration) -> Harness {
    let temp = TempDir::new().expect("tempdir");
    let engine = Arc::new(
        ScriptedEngine::new(behavior, temp.path().join("capture")).with_create_delay(delay),
    );
    build_from(engine, temp, RecorderConfig::default())
}

fn build_from(engine: Arc<ScriptedEngine>, temp: TempDir, config: RecorderConfig) -> Harness {
    let guard = Arc::new(TestGuard::default());
    let store = Arc::new(MemoryMeetingStore::new());
    let storage = Arc::new(RecordingStorage::new(temp.path().join("recordings")));
    let lifecycle = AppLifecycle::new();

    let (controller, events) = RecordingController::new(
        ControllerDeps {
            engine: Arc::clone(&engine) as Arc<dyn CaptureEngine>,
            guard: Arc::clone(&guard) as Arc<dyn BackgroundGuard>,
            store: store.clone(),
            storage,
            config,
        },
        lifecycle.subscribe(),
    );

    Harness {
        controller,
        events,
        engine,
        guard,
        store,
        lifecycle,
        temp,
    }
}
