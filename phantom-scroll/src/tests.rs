use super::*;

#[test]
fn test_mouse_button_equality() {
    assert_eq!(MouseButton::Left, MouseButton::Left);
    assert_ne!(MouseButton::Left, MouseButton::Right);
    assert_ne!(MouseButton::Other(4), MouseButton::Other(5));
}

#[test]
fn test_event_labels() {
    assert_eq!(EventLabel::for_wheel(0, 1).to_string(), "WheelUp");
    assert_eq!(EventLabel::for_wheel(0, -2).to_string(), "WheelDown");
    assert_eq!(EventLabel::for_wheel(3, 0).to_string(), "WheelRight");
    assert_eq!(EventLabel::for_wheel(-1, 0).to_string(), "WheelLeft");
    assert_eq!(EventLabel::for_wheel(0, 0).to_string(), "Wheel");
    // vertical wins when both axes move
    assert_eq!(EventLabel::for_wheel(1, -1), EventLabel::WheelDown);

    assert_eq!(EventLabel::ButtonDown(MouseButton::Left).to_string(), "LeftDown");
    assert_eq!(EventLabel::ButtonUp(MouseButton::Middle).to_string(), "MiddleUp");
    assert!(!EventLabel::ButtonDown(MouseButton::Right).is_wheel());
    assert!(EventLabel::Wheel.is_wheel());
}

#[test]
fn test_input_event_timestamp() {
    let events = [
        InputEvent::ButtonDown {
            button: MouseButton::Left,
            at_ms: 1,
        },
        InputEvent::ButtonUp {
            button: MouseButton::Left,
            at_ms: 2,
        },
        InputEvent::WheelScroll {
            dx: 0,
            dy: 1,
            at_ms: 3,
        },
        InputEvent::CursorMove {
            x: 0.0,
            y: 0.0,
            at_ms: 4,
        },
    ];
    let stamps: Vec<u64> = events.iter().map(InputEvent::at_ms).collect();
    assert_eq!(stamps, vec![1, 2, 3, 4]);
}

#[test]
fn test_input_event_serialization() {
    let event = InputEvent::WheelScroll {
        dx: 0,
        dy: -1,
        at_ms: 42,
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("WheelScroll"));

    let back: InputEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_classifier_config_default() {
    let config = ClassifierConfig::default();

    assert_eq!(config.near_click_ms, 80);
    assert_eq!(config.combat_cps, 2.0);
    assert_eq!(config.rate_window_ms, 1000);
    assert!(!config.coords_enabled);
    assert!(!config.log_button_events);
    assert_eq!(config.rate_buttons, RateButtons::Primary);
}

#[test]
fn test_classifier_config_rejects_nan() {
    let config = ClassifierConfig {
        combat_cps: f64::NAN,
        rate_window_ms: 0,
        ..Default::default()
    }
    .validated();

    assert_eq!(config.combat_cps, COMBAT_CPS_DEFAULT);
    assert_eq!(config.rate_window_ms, 1);
}

#[test]
fn test_recorder_config_default() {
    let config = RecorderConfig::default();

    assert_eq!(config.channel_capacity, 4096);
    assert_eq!(config.flush_interval, std::time::Duration::from_millis(500));
    assert_eq!(config.classifier, ClassifierConfig::default());
}

#[test]
fn test_csv_header_order() {
    assert_eq!(
        CSV_HEADER.join(","),
        "timestamp,x,y,dx,dy,ms_since_button_event,combat_state,scroll_near_click,event"
    );
}

#[test]
fn test_error_types() {
    let init_error = RecorderError::InitializationError("Test error".to_string());
    let hook_error = RecorderError::HookInstall("access denied".to_string());
    let log_error = RecorderError::LogError("disk full".to_string());

    assert!(format!("{}", init_error).contains("Test error"));
    assert!(format!("{}", hook_error).contains("access denied"));
    assert!(format!("{}", log_error).contains("disk full"));
    assert!(RecorderError::AlreadyRecording.to_string().contains("already running"));
}
