//! FPS Mouse Test & Diagnosis
//!
//! Desktop front end for the phantom scroll recorder.

mod app;

use anyhow::Context;
use eframe::{egui, NativeOptions};
use phantom_scroll::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{DiagnosisApp, APP_NAME};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phantom_scroll=info,phantom_scroll_gui=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(&settings_path);
    let app = DiagnosisApp::new(runtime, settings, settings_path);

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([780.0, 560.0])
            .with_min_inner_size([760.0, 520.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(APP_NAME, options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("Window closed with an error: {}", e))
}
