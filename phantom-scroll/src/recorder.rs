use crate::{
    Classifier, ClassifierConfig, CombatTransition, InputEvent, LogRow, RecorderError, Result,
    SessionLog,
};
use chrono::{DateTime, Local};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc, oneshot, watch,
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
use self::windows::{HookSink, MouseHook};

/// Configuration for the diagnosis recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Initial classifier thresholds
    pub classifier: ClassifierConfig,

    /// Capacity of the channel between the input hook and the classifier
    pub channel_capacity: usize,

    /// Capacity of the update channel feeding the UI
    pub update_capacity: usize,

    /// How often the log is flushed and idle combat state re-evaluated
    pub flush_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            channel_capacity: 4096,
            update_capacity: 1024,
            flush_interval: Duration::from_millis(500),
        }
    }
}

/// Live feedback published while a session runs
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A session started logging to `log_path`
    Started { log_path: PathBuf },

    /// A row was appended to the session log
    Row { row: LogRow, clicks_per_sec: f64 },

    /// The combat flag changed
    Combat(CombatTransition),

    /// The click rate decayed while no input arrived
    Rate { clicks_per_sec: f64 },

    /// The log file failed and rows are now kept in memory
    LogDegraded { reason: String },

    /// The input hook had to drop events because the classifier fell behind
    EventsDropped { total: u64 },
}

/// What a finished session leaves behind
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub log_path: PathBuf,
    pub rows_written: u64,
    /// Rows that never reached the log file
    pub buffered_rows: Vec<LogRow>,
    /// Set if the log fell back to memory
    pub degraded: Option<String>,
    pub dropped_events: u64,
    pub duration: Duration,
}

struct RunningSession {
    task: JoinHandle<SessionSummary>,
    shutdown: oneshot::Sender<()>,
    log_path: PathBuf,
}

/// Captures mouse input and classifies it into a session log
pub struct DiagnosisRecorder {
    config: RecorderConfig,

    /// Live classifier thresholds
    config_tx: watch::Sender<ClassifierConfig>,

    /// The update sender
    update_tx: broadcast::Sender<SessionUpdate>,

    session: Option<RunningSession>,

    /// Events the hook could not enqueue during the current session
    dropped: Arc<AtomicU64>,

    /// Whether the hook forwards cursor moves
    track_cursor: Arc<AtomicBool>,

    /// The platform-specific hook, installed on first start
    #[cfg(target_os = "windows")]
    hook: Option<MouseHook>,
}

impl DiagnosisRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        let classifier = config.classifier.clone().validated();
        let track_cursor = Arc::new(AtomicBool::new(classifier.coords_enabled));
        let (config_tx, _) = watch::channel(classifier);
        let (update_tx, _) = broadcast::channel(config.update_capacity.max(1));

        Self {
            config,
            config_tx,
            update_tx,
            session: None,
            dropped: Arc::new(AtomicU64::new(0)),
            track_cursor,
            #[cfg(target_os = "windows")]
            hook: None,
        }
    }

    /// Get a stream of session updates
    pub fn event_stream(&self) -> impl Stream<Item = SessionUpdate> {
        let mut rx = self.update_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(update) => yield update,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Update stream lagged, skipped {} updates", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Receiver for consumers that poll instead of awaiting
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Path of the running session's log
    pub fn log_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.log_path.as_path())
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        self.config_tx.borrow().clone()
    }

    /// Change thresholds, applied to the running session as well
    pub fn update_config(&self, config: ClassifierConfig) {
        let config = config.validated();
        self.track_cursor.store(config.coords_enabled, Ordering::SeqCst);
        self.config_tx.send_replace(config);
    }

    /// Start a session that captures system-wide mouse input
    pub async fn start<P: AsRef<Path>>(&mut self, log_path: P) -> Result<()> {
        if self.session.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        info!("Starting diagnosis session");

        #[cfg(target_os = "windows")]
        {
            if self.hook.is_none() {
                self.hook = Some(MouseHook::install()?);
            }

            let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
            let epoch = Instant::now();
            let started_at = Local::now();
            self.dropped.store(0, Ordering::SeqCst);

            if self.track_cursor.load(Ordering::SeqCst) {
                if let Some((x, y)) = windows::cursor_position() {
                    let _ = tx.try_send(InputEvent::CursorMove { x, y, at_ms: 0 });
                }
            }

            if let Some(hook) = &self.hook {
                hook.attach(HookSink {
                    tx,
                    epoch,
                    dropped: Arc::clone(&self.dropped),
                    track_cursor: Arc::clone(&self.track_cursor),
                });
            }

            self.spawn_session(log_path.as_ref(), rx, epoch, started_at);
            Ok(())
        }

        #[cfg(not(target_os = "windows"))]
        {
            let _ = log_path;
            Err(RecorderError::InitializationError(
                "Mouse hook capture is only supported on Windows".to_string(),
            ))
        }
    }

    /// Start a session fed by `events` instead of the OS hook
    pub fn start_with_source<P: AsRef<Path>>(
        &mut self,
        log_path: P,
        events: mpsc::Receiver<InputEvent>,
    ) -> Result<()> {
        if self.session.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        self.dropped.store(0, Ordering::SeqCst);
        self.spawn_session(log_path.as_ref(), events, Instant::now(), Local::now());
        Ok(())
    }

    /// Stop the running session, flush and close its log
    pub async fn stop(&mut self) -> Result<SessionSummary> {
        let session = self.session.take().ok_or(RecorderError::NotRecording)?;
        info!("Stopping diagnosis session");

        #[cfg(target_os = "windows")]
        {
            if let Some(hook) = &self.hook {
                hook.detach();
            }
        }

        let _ = session.shutdown.send(());
        let summary = session
            .task
            .await
            .map_err(|e| RecorderError::RecordingError(format!("session task failed: {}", e)))?;

        info!(
            "Session finished after {:?}: {} rows written, {} buffered, {} events dropped",
            summary.duration,
            summary.rows_written,
            summary.buffered_rows.len(),
            summary.dropped_events
        );
        Ok(summary)
    }

    fn spawn_session(
        &mut self,
        log_path: &Path,
        events: mpsc::Receiver<InputEvent>,
        epoch: Instant,
        started_at: DateTime<Local>,
    ) {
        let (log, degraded) = SessionLog::open_or_buffer(log_path);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let mut config_rx = self.config_tx.subscribe();
        let classifier = Classifier::new(config_rx.borrow_and_update().clone(), started_at);

        let _ = self.update_tx.send(SessionUpdate::Started {
            log_path: log_path.to_path_buf(),
        });
        if let Some(reason) = degraded {
            let _ = self.update_tx.send(SessionUpdate::LogDegraded { reason });
        }

        let pipeline = SessionPipeline {
            classifier,
            log,
            events,
            config_rx,
            config_open: true,
            updates: self.update_tx.clone(),
            dropped: Arc::clone(&self.dropped),
            dropped_reported: 0,
            epoch,
        };
        let task = tokio::spawn(pipeline.run(shutdown_rx, self.config.flush_interval));

        self.session = Some(RunningSession {
            task,
            shutdown: shutdown_tx,
            log_path: log_path.to_path_buf(),
        });
    }
}

impl Drop for DiagnosisRecorder {
    fn drop(&mut self) {
        #[cfg(target_os = "windows")]
        {
            if let Some(hook) = &self.hook {
                hook.detach();
            }
        }
        if let Some(session) = self.session.take() {
            debug!("Recorder dropped while recording, signalling session shutdown");
            let _ = session.shutdown.send(());
        }
    }
}

/// Single consumer of the input channel: classifier, log and update fan-out
struct SessionPipeline {
    classifier: Classifier,
    log: SessionLog,
    events: mpsc::Receiver<InputEvent>,
    config_rx: watch::Receiver<ClassifierConfig>,
    config_open: bool,
    updates: broadcast::Sender<SessionUpdate>,
    dropped: Arc<AtomicU64>,
    dropped_reported: u64,
    epoch: Instant,
}

impl SessionPipeline {
    async fn run(
        mut self,
        mut shutdown: oneshot::Receiver<()>,
        flush_interval: Duration,
    ) -> SessionSummary {
        let mut flush = tokio::time::interval(flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.apply_pending_config();
                    while let Ok(event) = self.events.try_recv() {
                        self.handle(event);
                    }
                    break;
                }
                changed = self.config_rx.changed(), if self.config_open => {
                    if changed.is_ok() {
                        self.apply_config();
                    } else {
                        self.config_open = false;
                    }
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = flush.tick() => self.on_tick(),
            }
        }

        self.finish()
    }

    fn apply_config(&mut self) {
        let config = self.config_rx.borrow_and_update().clone();
        self.classifier.set_config(config);
    }

    /// Pick up a config change that raced with shutdown
    fn apply_pending_config(&mut self) {
        if self.config_open && self.config_rx.has_changed().unwrap_or(false) {
            self.apply_config();
        }
    }

    fn handle(&mut self, event: InputEvent) {
        let verdict = self.classifier.observe(&event);

        if let Some(transition) = verdict.transition {
            info!("Combat state changed: {:?}", transition);
            self.publish(SessionUpdate::Combat(transition));
        }

        if let Some(row) = verdict.row {
            if let Some(reason) = self.log.append(&row) {
                self.publish(SessionUpdate::LogDegraded { reason });
            }
            let clicks_per_sec = self.classifier.clicks_per_sec();
            self.publish(SessionUpdate::Row {
                row,
                clicks_per_sec,
            });
        }
    }

    fn on_tick(&mut self) {
        // sampled before the flush, which may block on disk
        let now_ms = self.epoch.elapsed().as_millis() as u64;

        if let Some(reason) = self.log.flush() {
            self.publish(SessionUpdate::LogDegraded { reason });
        }

        let rate_before = self.classifier.clicks_per_sec();
        if let Some(transition) = self.classifier.tick(now_ms) {
            info!("Combat state changed while idle: {:?}", transition);
            self.publish(SessionUpdate::Combat(transition));
        }
        let clicks_per_sec = self.classifier.clicks_per_sec();
        if (clicks_per_sec - rate_before).abs() > f64::EPSILON {
            self.publish(SessionUpdate::Rate { clicks_per_sec });
        }

        let dropped = self.dropped.load(Ordering::SeqCst);
        if dropped > self.dropped_reported {
            warn!("Input hook dropped {} events so far", dropped);
            self.dropped_reported = dropped;
            self.publish(SessionUpdate::EventsDropped { total: dropped });
        }
    }

    fn publish(&self, update: SessionUpdate) {
        // no subscribers is fine
        let _ = self.updates.send(update);
    }

    fn finish(self) -> SessionSummary {
        let duration = self.epoch.elapsed();
        let dropped_events = self.dropped.load(Ordering::SeqCst);
        let outcome = self.log.finish();

        SessionSummary {
            log_path: outcome.path,
            rows_written: outcome.rows_written,
            buffered_rows: outcome.buffered,
            degraded: outcome.degraded,
            dropped_events,
            duration,
        }
    }
}
