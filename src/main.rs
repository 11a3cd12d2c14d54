use anyhow::Result;
use botmr_recorder::{
    create_router, AppLifecycle, AppState, BackgroundGuard, Config, ControllerDeps,
    JsonMeetingStore, MeetingStore, NoopGuard, RecorderEvent, RecordingController,
    RecordingStorage, WavCaptureEngine,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "botmr-recorder", version, about = "Meeting recording session controller")]
struct Args {
    /// Path to the config file (extension optional, file optional)
    #[arg(long, default_value = "config/botmr-recorder")]
    config: String,

    /// Override the HTTP bind address (host:port)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    // The platform capture callback feeds this channel; it stays open for
    // the lifetime of the process.
    let (_frames_tx, frames_rx) = mpsc::channel(64);

    let engine = Arc::new(WavCaptureEngine::new(
        frames_rx,
        std::env::temp_dir().join("botmr-capture"),
        16_000, // 16kHz mono matches the downstream transcription input
        1,
    ));
    let guard: Arc<dyn BackgroundGuard> = Arc::new(NoopGuard::new());
    let store: Arc<dyn MeetingStore> =
        Arc::new(JsonMeetingStore::open(PathBuf::from(&cfg.storage.meetings_path))?);
    let storage = Arc::new(RecordingStorage::new(PathBuf::from(
        &cfg.storage.recordings_path,
    )));

    info!("Meeting store: {}", cfg.storage.meetings_path);
    info!("Recordings directory: {}", cfg.storage.recordings_path);

    let lifecycle = AppLifecycle::new();
    let (controller, mut events) = RecordingController::new(
        ControllerDeps {
            engine,
            guard,
            store: Arc::clone(&store),
            storage,
            config: cfg.recorder.clone(),
        },
        lifecycle.subscribe(),
    );
    let controller = Arc::new(controller);

    // Terminal session outcomes land in the log; the UI gets them over HTTP
    // by polling status and the meeting list.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RecorderEvent::SessionSaved(meeting) => {
                    info!("Session saved: {} ({}s)", meeting.title, meeting.duration_sec)
                }
                RecorderEvent::NothingCaptured => {
                    info!("Session ended with no audio captured")
                }
                RecorderEvent::Error(e) => error!("Recorder error: {}", e),
            }
        }
    });

    let app = create_router(AppState::new(controller, store));

    let bind = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", cfg.service.http.bind, cfg.service.http.port));
    info!("HTTP server listening on {}", bind);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
