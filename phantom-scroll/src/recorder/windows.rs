use crate::{InputEvent, MouseButton, RecorderError, Result};
use rdev::{Button, EventType};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc as std_mpsc, Arc, Mutex,
    },
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

/// How long `install` waits for the listener to report a failure
const INSTALL_GRACE: Duration = Duration::from_millis(300);

/// Where the hook delivers events for the current session
pub(crate) struct HookSink {
    /// The event sender
    pub tx: mpsc::Sender<InputEvent>,

    /// Session epoch that timestamps are measured from
    pub epoch: Instant,

    /// Count of events the channel could not take
    pub dropped: Arc<AtomicU64>,

    /// Whether cursor moves are forwarded
    pub track_cursor: Arc<AtomicBool>,
}

impl HookSink {
    fn deliver(&self, event: InputEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// The system-wide low-level mouse hook.
///
/// The hook is installed once per process; sessions attach and detach a sink.
pub(crate) struct MouseHook {
    sink: Arc<Mutex<Option<HookSink>>>,
}

impl MouseHook {
    /// Install the hook on a dedicated listener thread
    pub fn install() -> Result<Self> {
        debug!("Installing low-level mouse hook...");
        let sink: Arc<Mutex<Option<HookSink>>> = Arc::new(Mutex::new(None));
        let callback_sink = Arc::clone(&sink);
        let (err_tx, err_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("mouse-hook".to_string())
            .spawn(move || {
                // rdev::listen only returns if the hook could not be set up
                if let Err(e) = rdev::listen(move |event| {
                    let Ok(guard) = callback_sink.lock() else {
                        return;
                    };
                    let Some(sink) = guard.as_ref() else {
                        return;
                    };

                    let at_ms = sink.now_ms();
                    let input = match event.event_type {
                        EventType::ButtonPress(button) => InputEvent::ButtonDown {
                            button: map_button(button),
                            at_ms,
                        },
                        EventType::ButtonRelease(button) => InputEvent::ButtonUp {
                            button: map_button(button),
                            at_ms,
                        },
                        EventType::Wheel { delta_x, delta_y } => InputEvent::WheelScroll {
                            dx: delta_x,
                            dy: delta_y,
                            at_ms,
                        },
                        EventType::MouseMove { x, y } => {
                            if !sink.track_cursor.load(Ordering::Relaxed) {
                                return;
                            }
                            InputEvent::CursorMove { x, y, at_ms }
                        }
                        _ => return,
                    };
                    sink.deliver(input);
                }) {
                    error!("Failed to listen for mouse events: {:?}", e);
                    let _ = err_tx.send(format!("{:?}", e));
                }
            })?;

        match err_rx.recv_timeout(INSTALL_GRACE) {
            Ok(reason) => Err(RecorderError::HookInstall(reason)),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                info!("Low-level mouse hook installed");
                Ok(Self { sink })
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(RecorderError::HookInstall(
                "listener thread exited unexpectedly".to_string(),
            )),
        }
    }

    /// Route hook events to a new session
    pub fn attach(&self, sink: HookSink) {
        if let Ok(mut guard) = self.sink.lock() {
            *guard = Some(sink);
            debug!("Mouse hook attached to session");
        }
    }

    /// Stop routing events; the hook itself stays installed
    pub fn detach(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if guard.take().is_some() {
                debug!("Mouse hook detached from session");
            }
        }
    }
}

fn map_button(button: Button) -> MouseButton {
    match button {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(code) => MouseButton::Other(code),
    }
}

/// Current cursor position in screen coordinates
pub(crate) fn cursor_position() -> Option<(f64, f64)> {
    let mut point = POINT::default();
    match unsafe { GetCursorPos(&mut point) } {
        Ok(()) => Some((point.x as f64, point.y as f64)),
        Err(e) => {
            debug!("GetCursorPos failed: {}", e);
            None
        }
    }
}
