use anyhow::Context;
use phantom_scroll::{next_log_path, DiagnosisRecorder, RecorderConfig, SessionUpdate, Settings};
use tokio::signal::ctrl_c;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phantom_scroll=info,record_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings_path = Settings::default_path();
    let mut settings = Settings::load_or_default(&settings_path);
    debug!("Loaded settings: {:?}", settings);

    let config = RecorderConfig {
        classifier: settings.classifier_config(),
        ..Default::default()
    };
    let mut recorder = DiagnosisRecorder::new(config);
    let mut updates = recorder.event_stream();

    let log_path = next_log_path(&settings.log_dir(), chrono::Local::now());
    recorder
        .start(&log_path)
        .await
        .context("Failed to start diagnosis session")?;
    info!("Logging to {:?}. Play, then press Ctrl+C to stop.", log_path);

    loop {
        tokio::select! {
            _ = ctrl_c() => break,
            update = updates.next() => match update {
                Some(SessionUpdate::Row { row, .. }) if row.scroll_near_click || row.combat_state => {
                    println!("{}", row.summary_line());
                }
                Some(SessionUpdate::Combat(transition)) => info!("Combat: {:?}", transition),
                Some(SessionUpdate::LogDegraded { reason }) => warn!("Log file unavailable, buffering in memory: {}", reason),
                Some(SessionUpdate::EventsDropped { total }) => warn!("{} input events dropped", total),
                Some(_) => {}
                None => break,
            },
        }
    }

    let summary = recorder.stop().await.context("Failed to stop diagnosis session")?;
    info!(
        "Session saved to {:?}: {} rows, {} kept in memory",
        summary.log_path,
        summary.rows_written,
        summary.buffered_rows.len()
    );

    settings.remember_log_path(&log_path);
    settings.save(&settings_path)?;
    Ok(())
}
