use std::sync::Mutex;

use tempfile::NamedTempFile;

use seatmon::config::{MonitorConfig, Strategy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SEATMON_CONFIG",
        "SEATMON_API_ADDR",
        "SEATMON_CAMERA_URL",
        "SEATMON_REGIONS_PATH",
        "SEATMON_HISTORY_PATH",
        "SEATMON_STRATEGY",
        "SEATMON_DWELL_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "regions_path": "rooms/seat_config.json",
        "history_path": "rooms/seat_analytics.csv",
        "api": {
            "addr": "0.0.0.0:9100"
        },
        "camera": {
            "url": "stub://lab_camera",
            "target_fps": 12,
            "width": 800,
            "height": 600
        },
        "detection": {
            "strategy": "background",
            "dwell_secs": 5,
            "pixel_threshold": 1500
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SEATMON_CONFIG", file.path());
    std::env::set_var("SEATMON_CAMERA_URL", "stub://hall_camera");
    std::env::set_var("SEATMON_DWELL_SECS", "4");

    let cfg = MonitorConfig::load().expect("load config");
    assert_eq!(cfg.regions_path, "rooms/seat_config.json");
    assert_eq!(cfg.history_path, "rooms/seat_analytics.csv");
    assert_eq!(cfg.api_addr, "0.0.0.0:9100");
    // Env wins over the file.
    assert_eq!(cfg.camera.url, "stub://hall_camera");
    assert_eq!(cfg.camera.target_fps, 12);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.detection.strategy, Strategy::Background);
    assert_eq!(cfg.detection.dwell.as_secs(), 4);
    assert_eq!(cfg.detection.pixel_threshold, 1500);
    // Untouched values keep their defaults.
    assert_eq!(cfg.detection.diff_threshold, 25);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load config");
    assert_eq!(cfg.regions_path, "seat_config.json");
    assert_eq!(cfg.history_path, "seat_analytics.csv");
    assert_eq!(cfg.api_addr, "127.0.0.1:8700");
    assert_eq!(cfg.camera.url, "stub://seat_camera");
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.detection.strategy, Strategy::Background);
    assert_eq!(cfg.detection.dwell.as_secs(), 3);
    assert!((cfg.detection.max_box_area - 0.70).abs() < 1e-6);
    assert!((cfg.detection.min_confidence - 0.35).abs() < 1e-6);

    clear_env();
}

#[test]
fn model_strategy_requires_model_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SEATMON_STRATEGY", "model");
    let err = MonitorConfig::load().expect_err("model without model_path");
    assert!(err.to_string().contains("model_path"));

    clear_env();
}

#[test]
fn rejects_zero_dwell() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SEATMON_DWELL_SECS", "0");
    assert!(MonitorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_strategy() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SEATMON_STRATEGY", "hybrid");
    assert!(MonitorConfig::load().is_err());

    clear_env();
}
