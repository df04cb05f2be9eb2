use phantom_scroll::*;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

fn down(at_ms: u64) -> InputEvent {
    InputEvent::ButtonDown {
        button: MouseButton::Left,
        at_ms,
    }
}

fn wheel(dy: i64, at_ms: u64) -> InputEvent {
    InputEvent::WheelScroll { dx: 0, dy, at_ms }
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(path).expect("Failed to read log");
    content
        .lines()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

async fn run_session(
    recorder: &mut DiagnosisRecorder,
    path: &Path,
    events: Vec<InputEvent>,
) -> SessionSummary {
    let (tx, rx) = mpsc::channel(64);
    recorder
        .start_with_source(path, rx)
        .expect("Failed to start session");
    for event in events {
        tx.send(event).await.expect("Session stopped early");
    }
    recorder.stop().await.expect("Failed to stop session")
}

#[tokio::test]
async fn test_near_click_scenario_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    let summary = run_session(
        &mut recorder,
        &path,
        vec![down(0), wheel(-1, 50), wheel(1, 200)],
    )
    .await;

    assert_eq!(summary.rows_written, 2);
    assert!(summary.degraded.is_none());

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], CSV_HEADER.to_vec());

    // x, y, dx, dy, ms_since_button_event, combat_state, scroll_near_click, event
    assert_eq!(rows[1][1..], ["", "", "0", "-1", "50", "0", "1", "WheelDown"]);
    assert_eq!(rows[2][1..], ["", "", "0", "1", "200", "0", "0", "WheelUp"]);
}

#[tokio::test]
async fn test_combat_scenario_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("combat.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    let summary = run_session(
        &mut recorder,
        &path,
        vec![down(0), down(150), down(300), down(450), down(600), wheel(-1, 700)],
    )
    .await;

    assert_eq!(summary.rows_written, 1);
    let rows = read_rows(&path);
    assert_eq!(rows[1][6], "1", "combat_state");
    assert_eq!(rows[1][7], "0", "scroll_near_click");
}

#[tokio::test]
async fn test_updates_are_published_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("updates.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());
    let mut updates = recorder.subscribe();

    run_session(
        &mut recorder,
        &path,
        vec![down(0), down(100), down(200), wheel(-1, 230)],
    )
    .await;

    let mut received = Vec::new();
    while let Ok(update) = updates.try_recv() {
        received.push(update);
    }

    assert!(matches!(received[0], SessionUpdate::Started { .. }));
    assert!(matches!(
        received[1],
        SessionUpdate::Combat(CombatTransition::Entered)
    ));
    match &received[2] {
        SessionUpdate::Row {
            row,
            clicks_per_sec,
        } => {
            assert!(row.scroll_near_click);
            assert!(row.combat_state);
            assert_eq!(row.ms_since_button_event, Some(30));
            assert!((clicks_per_sec - 3.0).abs() < f64::EPSILON);
        }
        other => panic!("Expected a row update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_event_stream_yields_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());
    let mut stream = recorder.event_stream();

    let (tx, rx) = mpsc::channel(8);
    recorder.start_with_source(&path, rx).unwrap();
    tx.send(wheel(1, 10)).await.unwrap();

    let row = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(update) = stream.next().await {
            if let SessionUpdate::Row { row, .. } = update {
                return Some(row);
            }
        }
        None
    })
    .await
    .expect("Timed out waiting for a row")
    .expect("Stream ended without a row");

    assert_eq!(row.event, EventLabel::WheelUp);
    assert_eq!(row.ms_since_button_event, None);

    recorder.stop().await.unwrap();
}

#[tokio::test]
async fn test_appending_keeps_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("append.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    run_session(&mut recorder, &path, vec![wheel(1, 5)]).await;
    run_session(&mut recorder, &path, vec![wheel(-1, 5)]).await;

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r[0] == "timestamp").count(), 1);
}

#[tokio::test]
async fn test_unwritable_log_degrades_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let path = blocker.join("nested").join("session.csv");

    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());
    let mut updates = recorder.subscribe();

    let summary = run_session(&mut recorder, &path, vec![down(0), wheel(-1, 20)]).await;

    assert!(summary.degraded.is_some());
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.buffered_rows.len(), 1);
    assert!(summary.buffered_rows[0].scroll_near_click);

    let mut saw_warning = false;
    while let Ok(update) = updates.try_recv() {
        if matches!(update, SessionUpdate::LogDegraded { .. }) {
            saw_warning = true;
        }
    }
    assert!(saw_warning);
}

#[tokio::test]
async fn test_live_config_update_applies_to_running_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    let (tx, rx) = mpsc::channel(8);
    recorder.start_with_source(&path, rx).unwrap();
    tx.send(down(0)).await.unwrap();

    recorder.update_config(ClassifierConfig {
        near_click_ms: 150,
        coords_enabled: true,
        ..Default::default()
    });
    assert_eq!(recorder.classifier_config().near_click_ms, 150);

    tx.send(InputEvent::CursorMove {
        x: 640.0,
        y: 360.0,
        at_ms: 100,
    })
    .await
    .unwrap();
    tx.send(wheel(-1, 120)).await.unwrap();
    recorder.stop().await.unwrap();

    let rows = read_rows(&path);
    assert_eq!(rows[1][1..], ["640", "360", "0", "-1", "120", "0", "1", "WheelDown"]);
}

#[tokio::test]
async fn test_session_lifecycle_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    assert!(matches!(
        recorder.stop().await,
        Err(RecorderError::NotRecording)
    ));

    let (_tx, rx) = mpsc::channel(1);
    recorder.start_with_source(&path, rx).unwrap();
    assert!(recorder.is_recording());
    assert_eq!(recorder.log_path(), Some(path.as_path()));

    let (_tx2, rx2) = mpsc::channel(1);
    assert!(matches!(
        recorder.start_with_source(&path, rx2),
        Err(RecorderError::AlreadyRecording)
    ));

    recorder.stop().await.unwrap();
    assert!(!recorder.is_recording());
}

#[cfg(not(target_os = "windows"))]
#[tokio::test]
async fn test_hook_capture_requires_windows() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    let result = recorder.start(dir.path().join("hook.csv")).await;
    assert!(matches!(result, Err(RecorderError::InitializationError(_))));
    assert!(!recorder.is_recording());
}

#[tokio::test]
async fn test_lagging_source_keeps_event_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lagging.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig::default());

    let (tx, rx) = mpsc::channel(8);
    recorder.start_with_source(&path, rx).unwrap();

    // let idle ticks run well past the stamps of the events below
    tokio::time::sleep(Duration::from_millis(700)).await;
    tx.send(down(0)).await.unwrap();
    tx.send(wheel(-1, 200)).await.unwrap();
    recorder.stop().await.unwrap();

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1..], ["", "", "0", "-1", "200", "0", "0", "WheelDown"]);
}

#[tokio::test]
async fn test_idle_rate_decay_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decay.csv");
    let mut recorder = DiagnosisRecorder::new(RecorderConfig {
        flush_interval: Duration::from_millis(100),
        ..Default::default()
    });
    let mut stream = recorder.event_stream();

    let (tx, rx) = mpsc::channel(8);
    recorder.start_with_source(&path, rx).unwrap();
    for t in [0, 100, 200] {
        tx.send(down(t)).await.unwrap();
    }

    let (left, rate) = tokio::time::timeout(Duration::from_secs(3), async {
        let mut left = false;
        while let Some(update) = stream.next().await {
            match update {
                SessionUpdate::Combat(CombatTransition::Left) => left = true,
                SessionUpdate::Rate { clicks_per_sec } if clicks_per_sec == 0.0 => {
                    return (left, clicks_per_sec);
                }
                _ => {}
            }
        }
        (left, -1.0)
    })
    .await
    .expect("Timed out waiting for the rate to decay");

    assert!(left, "combat should end before the rate reaches zero");
    assert_eq!(rate, 0.0);

    recorder.stop().await.unwrap();
}
