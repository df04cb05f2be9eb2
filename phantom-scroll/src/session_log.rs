//! CSV session log
//!
//! One row per qualifying event, appended as the classifier produces it. The file
//! is opened in append mode and the header is written only when the file is new
//! or empty. If the file cannot be opened or a write fails, the log degrades to
//! in-memory buffering so the session keeps running.

use crate::{EventLabel, RecorderError, Result};
use chrono::{DateTime, Local};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Column order of the session log
pub const CSV_HEADER: [&str; 9] = [
    "timestamp",
    "x",
    "y",
    "dx",
    "dy",
    "ms_since_button_event",
    "combat_state",
    "scroll_near_click",
    "event",
];

/// Prefix of generated log file names
pub const DEFAULT_BASENAME: &str = "mouse_events";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A single row of the session log
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    /// Wall-clock time of the event
    pub timestamp: DateTime<Local>,

    /// Milliseconds since the session started (not written to the CSV)
    pub ms_since_start: u64,

    /// Cursor position, only when coordinate logging is enabled
    pub x: Option<i32>,
    pub y: Option<i32>,

    /// Wheel deltas (zero for button rows)
    pub dx: i64,
    pub dy: i64,

    /// Time since the last button event, `None` if none was seen yet
    pub ms_since_button_event: Option<u64>,

    pub combat_state: bool,
    pub scroll_near_click: bool,
    pub event: EventLabel,
}

impl LogRow {
    /// Render the row as CSV fields in `CSV_HEADER` order
    pub fn to_record(&self) -> [String; 9] {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            opt(self.x),
            opt(self.y),
            self.dx.to_string(),
            self.dy.to_string(),
            opt(self.ms_since_button_event),
            flag(self.combat_state).to_string(),
            flag(self.scroll_near_click).to_string(),
            self.event.to_string(),
        ]
    }

    /// Human readable line for the live log view
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "[{}] Running for: {}",
            self.timestamp.format("%H:%M:%S"),
            format_elapsed(self.ms_since_start)
        );

        if let (Some(x), Some(y)) = (self.x, self.y) {
            line.push_str(&format!(" x={} y={} dx={} dy={}", x, y, self.dx, self.dy));
        }

        if self.event.is_wheel() {
            line.push_str(&format!(
                " ms_since_button_event={} scroll_near_click={}",
                self.ms_since_button_event
                    .map(|ms| ms.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                flag(self.scroll_near_click)
            ));
        }

        line.push_str(&format!(" event={}", self.event));

        if self.scroll_near_click {
            line.push_str(" [SCROLL NEAR CLICK]");
        }
        if self.combat_state {
            line.push_str(" [COMBAT]");
        }

        line
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Format a duration in milliseconds as `HH:MM:SS.mmm`
pub fn format_elapsed(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        ms % 1000
    )
}

/// Build a fresh session-timestamped log path inside `dir`.
///
/// A `_n` suffix is added if a file with the same name already exists.
pub fn next_log_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S");
    let mut candidate = dir.join(format!("{}_{}.csv", DEFAULT_BASENAME, stamp));
    let mut counter: usize = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}_{}.csv", DEFAULT_BASENAME, stamp, counter));
        counter += 1;
    }
    candidate
}

/// Encode one CSV record
fn encode_record<I, T>(record: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut encoder = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    encoder.write_record(record)?;
    encoder
        .into_inner()
        .map_err(|e| RecorderError::from(e.into_error()))
}

enum LogSink {
    File {
        file: Box<dyn Write + Send>,
        /// Encoded rows that have not been handed to `file` yet
        pending: Vec<u8>,
        /// The rows behind `pending`
        unflushed: Vec<LogRow>,
    },
    Memory {
        rows: Vec<LogRow>,
        reason: String,
    },
}

/// What a session log leaves behind when it is closed
#[derive(Debug, Clone, Default)]
pub struct LogOutcome {
    pub path: PathBuf,
    pub rows_written: u64,
    /// Rows that could not be written to disk
    pub buffered: Vec<LogRow>,
    /// Why the log fell back to memory, if it did
    pub degraded: Option<String>,
}

/// Append-only CSV log for one session
pub struct SessionLog {
    path: PathBuf,
    sink: LogSink,
    rows_written: u64,
}

impl SessionLog {
    /// Open `path` for appending, writing the header if the file is new or empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let log = Self::from_writer(path, file, needs_header)?;
        info!("Session log opened at {:?} (new file: {})", log.path, needs_header);
        Ok(log)
    }

    /// Log into any writer. Rows only reach it on `flush`.
    fn from_writer<W: Write + Send + 'static>(
        path: PathBuf,
        mut file: W,
        write_header: bool,
    ) -> Result<Self> {
        if write_header {
            file.write_all(&encode_record(CSV_HEADER)?)?;
            file.flush()?;
        }

        Ok(Self {
            path,
            sink: LogSink::File {
                file: Box::new(file),
                pending: Vec::new(),
                unflushed: Vec::new(),
            },
            rows_written: 0,
        })
    }

    /// Open `path`, falling back to an in-memory log if that fails.
    ///
    /// The second value carries the reason when the fallback was taken.
    pub fn open_or_buffer<P: AsRef<Path>>(path: P) -> (Self, Option<String>) {
        match Self::open(path.as_ref()) {
            Ok(log) => (log, None),
            Err(e) => {
                let reason = RecorderError::LogError(format!(
                    "cannot open {}: {}",
                    path.as_ref().display(),
                    e
                ))
                .to_string();
                warn!("Session log degraded to memory: {}", reason);
                (Self::in_memory(path, reason.clone()), Some(reason))
            }
        }
    }

    /// A log that only buffers rows in memory
    pub fn in_memory<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sink: LogSink::Memory {
                rows: Vec::new(),
                reason: reason.into(),
            },
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.sink, LogSink::Memory { .. })
    }

    /// Rows confirmed on disk
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Number of rows held in memory
    pub fn rows_buffered(&self) -> usize {
        match &self.sink {
            LogSink::Memory { rows, .. } => rows.len(),
            LogSink::File { .. } => 0,
        }
    }

    /// Append a row. Returns the reason if this call degraded the log.
    pub fn append(&mut self, row: &LogRow) -> Option<String> {
        let result = match &mut self.sink {
            LogSink::Memory { rows, .. } => {
                rows.push(row.clone());
                return None;
            }
            LogSink::File {
                pending, unflushed, ..
            } => {
                unflushed.push(row.clone());
                encode_record(row.to_record()).map(|bytes| pending.extend_from_slice(&bytes))
            }
        };

        match result {
            Ok(()) => None,
            Err(e) => Some(self.degrade(e)),
        }
    }

    /// Write pending rows to disk. Returns the reason if this call degraded the log.
    ///
    /// A write that fails part way may leave some of the batch on disk; the whole
    /// batch is still reported as buffered.
    pub fn flush(&mut self) -> Option<String> {
        let result = match &mut self.sink {
            LogSink::Memory { .. } => return None,
            LogSink::File {
                file,
                pending,
                unflushed,
            } => {
                if unflushed.is_empty() {
                    return None;
                }
                match file
                    .write_all(pending.as_slice())
                    .and_then(|()| file.flush())
                {
                    Ok(()) => {
                        let count = unflushed.len() as u64;
                        pending.clear();
                        unflushed.clear();
                        Ok(count)
                    }
                    Err(e) => Err(RecorderError::from(e)),
                }
            }
        };

        match result {
            Ok(count) => {
                debug!("Flushed {} rows to {:?}", count, self.path);
                self.rows_written += count;
                None
            }
            Err(e) => Some(self.degrade(e)),
        }
    }

    /// Flush and close the log
    pub fn finish(mut self) -> LogOutcome {
        self.flush();

        let (buffered, degraded) = match self.sink {
            LogSink::Memory { rows, reason } => (rows, Some(reason)),
            LogSink::File { .. } => (Vec::new(), None),
        };

        info!(
            "Session log closed: {} rows written, {} rows buffered in memory",
            self.rows_written,
            buffered.len()
        );

        LogOutcome {
            path: self.path,
            rows_written: self.rows_written,
            buffered,
            degraded,
        }
    }

    fn degrade(&mut self, error: RecorderError) -> String {
        let reason = RecorderError::LogError(format!(
            "write to {} failed: {}",
            self.path.display(),
            error
        ))
        .to_string();
        warn!("Session log degraded to memory: {}", reason);

        let rows = match &mut self.sink {
            LogSink::File { unflushed, .. } => std::mem::take(unflushed),
            LogSink::Memory { rows, .. } => std::mem::take(rows),
        };
        self.sink = LogSink::Memory {
            rows,
            reason: reason.clone(),
        };

        reason
    }
}
