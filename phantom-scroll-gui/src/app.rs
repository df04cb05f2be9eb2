use chrono::Local;
use eframe::{egui, App};
use phantom_scroll::{
    format_elapsed, next_log_path, CombatTransition, DiagnosisRecorder, LogRow, RecorderConfig,
    SessionUpdate, Settings,
};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{error, info, warn};

pub const APP_NAME: &str = "FPS Mouse Test & Diagnosis";

const MAX_LINES: usize = 5000;
const REPAINT_INTERVAL: Duration = Duration::from_millis(100);
const COMBAT_BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0xf2, 0xde, 0xde);

const HELP_TEXT: &str = "Reference (approx): AK-47 auto ~10 shots/s (~100 ms), \
    Tec-9 semi ~6-7 shots/s (~150-170 ms), Deagle accuracy reset ~450-500 ms.";

struct LogLine {
    text: String,
    near: bool,
    combat: bool,
}

impl From<&LogRow> for LogLine {
    fn from(row: &LogRow) -> Self {
        Self {
            text: row.summary_line(),
            near: row.scroll_near_click && row.event.is_wheel(),
            combat: row.combat_state,
        }
    }
}

/// Application state for the diagnosis window
pub struct DiagnosisApp {
    runtime: tokio::runtime::Runtime,
    recorder: DiagnosisRecorder,
    updates: broadcast::Receiver<SessionUpdate>,

    settings: Settings,
    settings_path: PathBuf,

    log_path: String,
    session_started: Option<Instant>,
    event_count: u64,
    clicks_per_sec: f64,
    in_combat: bool,
    lines: VecDeque<LogLine>,

    warning: Option<String>,
    error: Option<String>,
    shut_down: bool,
}

impl DiagnosisApp {
    pub fn new(runtime: tokio::runtime::Runtime, settings: Settings, settings_path: PathBuf) -> Self {
        let config = RecorderConfig {
            classifier: settings.classifier_config(),
            ..Default::default()
        };
        let recorder = DiagnosisRecorder::new(config);
        let updates = recorder.subscribe();
        let log_path = next_log_path(&settings.log_dir(), Local::now())
            .to_string_lossy()
            .to_string();

        Self {
            runtime,
            recorder,
            updates,
            settings,
            settings_path,
            log_path,
            session_started: None,
            event_count: 0,
            clicks_per_sec: 0.0,
            in_combat: false,
            lines: VecDeque::new(),
            warning: None,
            error: None,
            shut_down: false,
        }
    }

    fn is_logging(&self) -> bool {
        self.recorder.is_recording()
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save(&self.settings_path) {
            warn!("Failed to save settings: {}", e);
        }
    }

    fn apply_thresholds(&mut self) {
        self.recorder.update_config(self.settings.classifier_config());
    }

    /// Apply a threshold edit live and persist it once the edit is finished
    fn on_threshold_edited(&mut self, response: &egui::Response) {
        if response.changed() {
            self.apply_thresholds();
        }
        if response.drag_stopped() || response.lost_focus() {
            self.save_settings();
        }
    }

    fn on_option_toggled(&mut self) {
        self.apply_thresholds();
        self.save_settings();
    }

    fn start_logging(&mut self) {
        let path = self.log_path.trim().to_string();
        if path.is_empty() {
            self.error = Some("Select a log file path.".to_string());
            return;
        }

        self.apply_thresholds();
        match self.runtime.block_on(self.recorder.start(&path)) {
            Ok(()) => {
                info!("Logging to {}", path);
                self.session_started = Some(Instant::now());
                self.event_count = 0;
                self.clicks_per_sec = 0.0;
                self.in_combat = false;
                self.warning = None;
                self.error = None;
            }
            Err(e) => {
                error!("Failed to start logging: {}", e);
                self.error = Some(format!("Failed to start logging:\n{}", e));
            }
        }
    }

    fn stop_logging(&mut self) {
        match self.runtime.block_on(self.recorder.stop()) {
            Ok(summary) => {
                if !summary.buffered_rows.is_empty() {
                    self.warning = Some(format!(
                        "{} rows could not be written to {}",
                        summary.buffered_rows.len(),
                        summary.log_path.display()
                    ));
                }

                let finished = PathBuf::from(self.log_path.trim());
                self.settings.remember_log_path(&finished);
                let dir = finished
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.settings.log_dir());
                // fresh name so the next session never overwrites this one
                self.log_path = next_log_path(&dir, Local::now())
                    .to_string_lossy()
                    .to_string();
                self.save_settings();
            }
            Err(e) => {
                error!("Failed to stop logging: {}", e);
                self.error = Some(format!("Failed to stop logging:\n{}", e));
            }
        }
        self.session_started = None;
        self.clicks_per_sec = 0.0;
        self.in_combat = false;
    }

    fn drain_updates(&mut self) {
        loop {
            match self.updates.try_recv() {
                Ok(update) => self.apply_update(update),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Log view skipped {} updates", skipped);
                }
            }
        }
    }

    fn apply_update(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Started { log_path } => {
                self.lines.clear();
                info!("Session started: {:?}", log_path);
            }
            SessionUpdate::Row {
                row,
                clicks_per_sec,
            } => {
                self.event_count += 1;
                self.clicks_per_sec = clicks_per_sec;
                self.push_line(LogLine::from(&row));
            }
            SessionUpdate::Combat(transition) => {
                self.in_combat = transition == CombatTransition::Entered;
            }
            SessionUpdate::Rate { clicks_per_sec } => {
                self.clicks_per_sec = clicks_per_sec;
            }
            SessionUpdate::LogDegraded { reason } => {
                self.warning = Some(format!(
                    "Log file unavailable, rows are kept in memory: {}",
                    reason
                ));
            }
            SessionUpdate::EventsDropped { total } => {
                self.warning = Some(format!("{} input events were dropped", total));
            }
        }
    }

    fn push_line(&mut self, line: LogLine) {
        if self.lines.len() >= MAX_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if self.is_logging() {
            self.stop_logging();
        }
        self.save_settings();
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let logging = self.is_logging();

        ui.horizontal(|ui| {
            ui.label("Log file:");
            ui.add_enabled(
                !logging,
                egui::TextEdit::singleline(&mut self.log_path).desired_width(f32::INFINITY),
            );
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!logging, egui::Button::new("Start").min_size(egui::vec2(90.0, 0.0)))
                .clicked()
            {
                self.start_logging();
            }
            if ui
                .add_enabled(logging, egui::Button::new("Stop").min_size(egui::vec2(90.0, 0.0)))
                .clicked()
            {
                self.stop_logging();
            }

            ui.separator();
            let running = self
                .session_started
                .map(|started| started.elapsed().as_millis() as u64)
                .unwrap_or_default();
            ui.label(format!("Running for: {}", format_elapsed(running)));
        });

        ui.add_space(4.0);
        egui::Grid::new("status_grid")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.label("Status:");
                let status = match (self.is_logging(), self.in_combat) {
                    (false, _) => egui::RichText::new("Idle"),
                    (true, false) => egui::RichText::new("Logging"),
                    (true, true) => egui::RichText::new("Logging [COMBAT]").color(egui::Color32::RED),
                };
                ui.label(status);
                ui.end_row();

                ui.label("Events:");
                ui.label(format!("{}    CPS: {:.1}", self.event_count, self.clicks_per_sec));
                ui.end_row();

                ui.label("Near-click window (ms):");
                let near = ui.add(
                    egui::DragValue::new(&mut self.settings.near_click_ms)
                        .clamp_range(20..=500)
                        .speed(5.0),
                );
                self.on_threshold_edited(&near);
                ui.end_row();

                ui.label("Combat CPS threshold:");
                let cps = ui.add(
                    egui::DragValue::new(&mut self.settings.combat_cps)
                        .clamp_range(1.0..=20.0)
                        .speed(0.5)
                        .fixed_decimals(1),
                );
                self.on_threshold_edited(&cps);
                ui.end_row();
            });

        ui.add(egui::Label::new(egui::RichText::new(HELP_TEXT).color(egui::Color32::GRAY)).wrap(true));

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            if ui
                .checkbox(&mut self.settings.coords_enabled, "Record cursor coordinates (x, y)")
                .changed()
            {
                self.on_option_toggled();
            }
            if ui
                .checkbox(&mut self.settings.log_button_events, "Log button events")
                .changed()
            {
                self.on_option_toggled();
            }
        });
    }

    fn banners(&mut self, ui: &mut egui::Ui) {
        if let Some(error) = self.error.clone() {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::RED, error);
                if ui.small_button("Dismiss").clicked() {
                    self.error = None;
                }
            });
        }
        if let Some(warning) = self.warning.clone() {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::from_rgb(0xd0, 0x80, 0x00), warning);
                if ui.small_button("Dismiss").clicked() {
                    self.warning = None;
                }
            });
        }
    }

    fn log_view(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.lines {
                    let mut text = egui::RichText::new(&line.text).monospace();
                    if line.near {
                        text = text.color(egui::Color32::RED);
                    }
                    if line.combat {
                        text = text.background_color(COMBAT_BACKGROUND);
                    }
                    ui.label(text);
                }
            });
    }
}

impl App for DiagnosisApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.shutdown();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.controls(ui);
            self.banners(ui);
            ui.separator();
            self.log_view(ui);
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

impl Drop for DiagnosisApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(dir: &Path) -> DiagnosisApp {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let settings = Settings {
            last_log_dir: Some(dir.to_path_buf()),
            ..Default::default()
        };
        DiagnosisApp::new(runtime, settings, dir.join("settings.json"))
    }

    #[test]
    fn test_rate_readout_follows_idle_decay() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        app.apply_update(SessionUpdate::Combat(CombatTransition::Entered));
        app.apply_update(SessionUpdate::Rate { clicks_per_sec: 5.0 });
        assert!(app.in_combat);
        assert_eq!(app.clicks_per_sec, 5.0);

        app.apply_update(SessionUpdate::Combat(CombatTransition::Left));
        app.apply_update(SessionUpdate::Rate { clicks_per_sec: 0.0 });
        assert!(!app.in_combat);
        assert_eq!(app.clicks_per_sec, 0.0);
    }

    #[test]
    fn test_log_path_starts_in_last_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        assert!(Path::new(&app.log_path).starts_with(dir.path()));
        assert!(!app.is_logging());
    }
}
