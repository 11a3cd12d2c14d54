use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{AudioFrame, CaptureEngine, EngineHandle, EngineStatus};

/// Capture engine that drains an audio frame channel into a WAV file.
///
/// The frame channel stands in for the platform capture callback; whoever
/// owns the sender is the actual audio producer. Reported duration derives
/// from samples actually written, which makes it the codec's own account of
/// captured audio rather than a wall-clock estimate.
///
/// The receiver is loaned to one live handle at a time and handed back when
/// that handle's writer task finishes, so the engine can serve session after
/// session.
pub struct WavCaptureEngine {
    frames: Arc<Mutex<Option<mpsc::Receiver<AudioFrame>>>>,
    capture_dir: PathBuf,
    sample_rate: u32,
    channels: u16,
}

impl WavCaptureEngine {
    pub fn new(
        frames: mpsc::Receiver<AudioFrame>,
        capture_dir: PathBuf,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            frames: Arc::new(Mutex::new(Some(frames))),
            capture_dir,
            sample_rate,
            channels,
        }
    }
}

#[async_trait::async_trait]
impl CaptureEngine for WavCaptureEngine {
    async fn request_permission(&self) -> Result<bool> {
        // File-backed capture has no platform permission gate.
        Ok(true)
    }

    async fn create(&self) -> Result<Box<dyn EngineHandle>> {
        let frames = self
            .frames
            .lock()
            .await
            .take()
            .context("capture engine already has a live handle")?;

        std::fs::create_dir_all(&self.capture_dir)
            .context("failed to create capture directory")?;

        let path = self
            .capture_dir
            .join(format!("capture-{}.wav", uuid::Uuid::new_v4()));

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        info!("Capture handle created: {:?}", path);

        Ok(Box::new(WavEngineHandle::spawn(
            frames,
            Arc::clone(&self.frames),
            writer,
            path,
            self.sample_rate,
            self.channels,
        )))
    }
}

struct WavShared {
    /// True while samples should be written (started, not paused).
    active: AtomicBool,
    stopped: AtomicBool,
    samples_written: AtomicU64,
    shutdown: Notify,
}

pub struct WavEngineHandle {
    shared: Arc<WavShared>,
    writer_task: Option<JoinHandle<()>>,
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
}

impl WavEngineHandle {
    fn spawn(
        mut frames: mpsc::Receiver<AudioFrame>,
        frames_slot: Arc<Mutex<Option<mpsc::Receiver<AudioFrame>>>>,
        writer: hound::WavWriter<BufWriter<File>>,
        path: PathBuf,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let shared = Arc::new(WavShared {
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            samples_written: AtomicU64::new(0),
            shutdown: Notify::new(),
        });

        let task_shared = Arc::clone(&shared);
        let writer_task = tokio::spawn(async move {
            let mut writer = Some(writer);

            loop {
                tokio::select! {
                    _ = task_shared.shutdown.notified() => break,
                    frame = frames.recv() => match frame {
                        Some(frame) if task_shared.active.load(Ordering::SeqCst) => {
                            if let Some(w) = writer.as_mut() {
                                let mut written = 0u64;
                                for &sample in &frame.samples {
                                    if let Err(e) = w.write_sample(sample) {
                                        warn!("Failed to write sample: {}", e);
                                        break;
                                    }
                                    written += 1;
                                }
                                task_shared
                                    .samples_written
                                    .fetch_add(written, Ordering::SeqCst);
                            }
                        }
                        // Suspended: the frame is discarded.
                        Some(_) => {}
                        None => break,
                    }
                }
            }

            if let Some(w) = writer.take() {
                if let Err(e) = w.finalize() {
                    warn!("Failed to finalize WAV writer: {}", e);
                }
            }

            // Hand the frame source back so the engine can loan it to the
            // next session's handle.
            *frames_slot.lock().await = Some(frames);
        });

        Self {
            shared,
            writer_task: Some(writer_task),
            path,
            sample_rate,
            channels,
        }
    }

    fn reported_duration_ms(&self) -> u64 {
        let samples = self.shared.samples_written.load(Ordering::SeqCst);
        let per_channel = samples / self.channels.max(1) as u64;
        per_channel * 1000 / self.sample_rate.max(1) as u64
    }
}

#[async_trait::async_trait]
impl EngineHandle for WavEngineHandle {
    async fn start(&mut self) -> Result<()> {
        anyhow::ensure!(
            !self.shared.stopped.load(Ordering::SeqCst),
            "capture handle already stopped"
        );
        self.shared.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.shared.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        anyhow::ensure!(
            !self.shared.stopped.load(Ordering::SeqCst),
            "capture handle already stopped"
        );
        self.shared.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf> {
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.shutdown.notify_one();

        if let Some(task) = self.writer_task.take() {
            if let Err(e) = task.await {
                warn!("Capture writer task panicked: {}", e);
            }
        }

        info!(
            "Capture finalized: {:?} ({}ms)",
            self.path,
            self.reported_duration_ms()
        );

        Ok(self.path.clone())
    }

    async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            is_active: self.shared.active.load(Ordering::SeqCst)
                && !self.shared.stopped.load(Ordering::SeqCst),
            reported_duration_ms: self.reported_duration_ms(),
        })
    }
}
