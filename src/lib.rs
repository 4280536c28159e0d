pub mod camera;
mod cli;
pub mod content;
pub mod error;
pub mod events;
pub mod models;
pub mod results;
pub mod service;
pub mod settings;
pub mod upload;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use camera::{CameraController, Environment, EnvironmentSignal, FfmpegSource, VideoSource};
use events::EventBus;
use results::ResultBoard;
use service::{HistoryClient, RecognitionClient, Recognizer, ServiceHttp};
use settings::SettingsStore;
use upload::FilePipeline;

pub use error::{ScanError, ScanResult};

const DEBUG_ENV: &str = "QRSCAN_DEBUG";

/// Everything a presentation host drives. Cheap to share: every member is a
/// handle onto shared state.
pub struct AppState {
    pub camera: CameraController,
    pub files: FilePipeline,
    pub client: RecognitionClient,
    pub history: HistoryClient,
    pub events: EventBus,
    pub results: ResultBoard,
    pub environment: Environment,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    /// Wires the orchestrator against the configured service and camera.
    pub fn new(settings: SettingsStore) -> anyhow::Result<Self> {
        let camera_settings = settings.camera();
        let source = Arc::new(FfmpegSource::new(camera_settings.device.clone()));
        Self::with_source(settings, source)
    }

    pub fn with_source(
        settings: SettingsStore,
        source: Arc<dyn VideoSource>,
    ) -> anyhow::Result<Self> {
        let http = ServiceHttp::new(&settings.service())
            .context("Failed to build the recognition service client")?;
        let client = RecognitionClient::new(http.clone());
        let history = HistoryClient::new(http);

        let events = EventBus::new();
        let results = ResultBoard::new(events.clone());
        let environment = Environment::new();
        let recognizer: Arc<dyn Recognizer> = Arc::new(client.clone());

        let camera = CameraController::new(
            source,
            Arc::clone(&recognizer),
            results.clone(),
            events.clone(),
            environment.clone(),
            settings.camera(),
        );
        let files = FilePipeline::new(recognizer, results.clone(), events.clone());

        Ok(Self {
            camera,
            files,
            client,
            history,
            events,
            results,
            environment,
            settings: Arc::new(settings),
        })
    }

    /// Leaving the camera view releases the device.
    pub async fn switch_to_file_mode(&self) {
        if self.camera.stop().await {
            log::info!("Camera stopped for file mode");
        }
    }

    pub async fn shutdown(&self) {
        self.environment.signal(EnvironmentSignal::Teardown);
        self.camera.stop().await;
    }
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn run() {
    let level = if debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG, when set, takes precedence over the default level.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let args = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::dispatch(args)) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
