//! End-to-end detection cycle: classifier -> debounce engine -> history log
//! -> region store, driven over synthetic frames with controlled timestamps.

use std::time::{Duration, SystemTime};

use image::{Rgb, RgbImage};

use seatmon::detect::{BackgroundClassifier, BackgroundSettings, Classifier};
use seatmon::state::{StateEngine, Transition};
use seatmon::store::{Region, RegionBounds, RegionStore};
use seatmon::{Frame, HistoryLog, SeatStatus};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn empty_scene() -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([60, 60, 60]))
}

/// Scene with a person-sized block over the left half.
fn occupied_scene() -> RgbImage {
    let mut image = empty_scene();
    for y in 40..200 {
        for x in 20..140 {
            image.put_pixel(x, y, Rgb([230, 230, 230]));
        }
    }
    image
}

fn classifier() -> BackgroundClassifier {
    BackgroundClassifier::new(BackgroundSettings {
        pixel_threshold: 800,
        ..BackgroundSettings::default()
    })
}

fn left_half_region() -> Region {
    Region::new(
        "seat-1",
        RegionBounds {
            x: 0.0,
            y: 0.0,
            w: 0.5,
            h: 1.0,
        },
    )
}

/// Drive one frame through classifier and engine, mirroring transitions the
/// way the daemon loop does.
fn step(
    classifier: &mut BackgroundClassifier,
    engine: &mut StateEngine,
    store: &mut RegionStore,
    history: &HistoryLog,
    image: RgbImage,
    at: SystemTime,
) -> Option<Transition> {
    let frame = Frame::new(image, at);
    let evaluation = classifier.evaluate(&frame, store.regions()).unwrap();
    let occupancy = evaluation.occupancy()?;
    let raw = occupancy["seat-1"];
    let transition = engine.observe("seat-1", raw, at)?;

    // Log failures are reported, never fatal; runtime state stays
    // authoritative.
    if let Err(e) = history.record(
        &transition.region_id,
        transition.from,
        transition.duration_minutes(),
    ) {
        eprintln!("history append failed: {}", e);
    }
    store
        .apply_transition(&transition, chrono::Utc::now())
        .unwrap();
    Some(transition)
}

#[test]
fn sustained_occupancy_logs_exactly_one_transition() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RegionStore::open(dir.path().join("seat_config.json")).unwrap();
    store.replace(vec![left_half_region()]).unwrap();
    let history = HistoryLog::new(dir.path().join("seat_analytics.csv"));

    let mut classifier = classifier();
    let mut engine = StateEngine::new(Duration::from_secs(3));
    let t0 = SystemTime::now();
    engine.configure(["seat-1"].into_iter(), t0);
    classifier.capture_reference(&Frame::new(empty_scene(), t0));

    let mut transitions = Vec::new();
    for s in 1..=6 {
        let at = t0 + Duration::from_secs(s);
        if let Some(t) = step(
            &mut classifier,
            &mut engine,
            &mut store,
            &history,
            occupied_scene(),
            at,
        ) {
            transitions.push(t);
        }
    }

    // Pending opens at t0+1, dwell satisfied at t0+4; later agreeing frames
    // add nothing.
    assert_eq!(transitions.len(), 1);
    let transition = &transitions[0];
    assert_eq!(transition.from, SeatStatus::Available);
    assert_eq!(transition.to, SeatStatus::Occupied);
    assert_eq!(transition.duration, Duration::from_secs(4));

    // Exactly one history row behind the header.
    let contents = std::fs::read_to_string(history.path()).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().nth(1).unwrap().contains("seat-1,available"));

    // The document mirrors the confirmed state and credits the closed state.
    let region = &store.regions()[0];
    assert_eq!(region.status, SeatStatus::Occupied);
    assert!((region.available_minutes - 4.0 / 60.0).abs() < 1e-9);
    assert_eq!(region.occupied_minutes, 0.0);
    assert_eq!(region.occupancy_history.len(), 1);
}

#[test]
fn flicker_produces_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RegionStore::open(dir.path().join("seat_config.json")).unwrap();
    store.replace(vec![left_half_region()]).unwrap();
    let history = HistoryLog::new(dir.path().join("seat_analytics.csv"));
    history.ensure_exists().unwrap();

    let mut classifier = classifier();
    let mut engine = StateEngine::new(Duration::from_secs(3));
    let t0 = SystemTime::now();
    engine.configure(["seat-1"].into_iter(), t0);
    classifier.capture_reference(&Frame::new(empty_scene(), t0));

    // occupied, occupied, available at 1s intervals: the spurious signal
    // never survives the dwell window.
    let scenes = [occupied_scene(), occupied_scene(), empty_scene()];
    for (i, scene) in scenes.into_iter().enumerate() {
        let at = t0 + Duration::from_secs(i as u64 + 1);
        let transition = step(
            &mut classifier,
            &mut engine,
            &mut store,
            &history,
            scene,
            at,
        );
        assert!(transition.is_none());
    }

    let contents = std::fs::read_to_string(history.path()).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert_eq!(store.regions()[0].status, SeatStatus::Available);
}

#[test]
fn uncalibrated_classifier_never_guesses() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RegionStore::open(dir.path().join("seat_config.json")).unwrap();
    store.replace(vec![left_half_region()]).unwrap();
    let history = HistoryLog::new(dir.path().join("seat_analytics.csv"));

    let mut classifier = classifier();
    let mut engine = StateEngine::new(Duration::from_secs(3));
    let t0 = SystemTime::now();
    engine.configure(["seat-1"].into_iter(), t0);

    // No reference captured: frames pass through without any observation.
    for s in 1..=5 {
        let at = t0 + Duration::from_secs(s);
        let transition = step(
            &mut classifier,
            &mut engine,
            &mut store,
            &history,
            occupied_scene(),
            at,
        );
        assert!(transition.is_none());
    }
    assert!(!classifier.is_calibrated());
    assert_eq!(store.regions()[0].status, SeatStatus::Available);
}

#[test]
fn log_write_failure_does_not_lose_the_state_change() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RegionStore::open(dir.path().join("seat_config.json")).unwrap();
    store.replace(vec![left_half_region()]).unwrap();
    // A history path in a directory that does not exist: every append fails.
    let history = HistoryLog::new(dir.path().join("missing").join("seat_analytics.csv"));

    let mut classifier = classifier();
    let mut engine = StateEngine::new(Duration::from_secs(3));
    let t0 = SystemTime::now();
    engine.configure(["seat-1"].into_iter(), t0);
    classifier.capture_reference(&Frame::new(empty_scene(), t0));

    let mut transitions = Vec::new();
    for s in 1..=5 {
        let at = t0 + Duration::from_secs(s);
        if let Some(t) = step(
            &mut classifier,
            &mut engine,
            &mut store,
            &history,
            occupied_scene(),
            at,
        ) {
            transitions.push(t);
        }
    }

    // The transition still took effect everywhere except the log.
    assert_eq!(transitions.len(), 1);
    assert_eq!(engine.confirmed("seat-1"), Some(SeatStatus::Occupied));
    assert_eq!(store.regions()[0].status, SeatStatus::Occupied);
    assert!(!history.path().exists());
}

#[test]
fn recalibration_resets_the_whole_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RegionStore::open(dir.path().join("seat_config.json")).unwrap();
    store.replace(vec![left_half_region()]).unwrap();
    let history = HistoryLog::new(dir.path().join("seat_analytics.csv"));

    let mut classifier = classifier();
    let mut engine = StateEngine::new(Duration::from_secs(3));
    let t0 = SystemTime::now();
    engine.configure(["seat-1"].into_iter(), t0);
    classifier.capture_reference(&Frame::new(empty_scene(), t0));

    for s in 1..=4 {
        let at = t0 + Duration::from_secs(s);
        step(
            &mut classifier,
            &mut engine,
            &mut store,
            &history,
            occupied_scene(),
            at,
        );
    }
    assert_eq!(engine.confirmed("seat-1"), Some(SeatStatus::Occupied));

    // Recapture with the occupant present: new baseline, states forced back
    // to available, reset row appended.
    let recapture_at = t0 + Duration::from_secs(10);
    classifier.capture_reference(&Frame::new(occupied_scene(), recapture_at));
    engine.recalibrate(recapture_at);
    store.reset_all(chrono::Utc::now(), true).unwrap();
    history.record_reset().unwrap();

    assert_eq!(engine.confirmed("seat-1"), Some(SeatStatus::Available));
    assert_eq!(store.regions()[0].status, SeatStatus::Available);

    // The unchanged scene now reads available against the new baseline.
    let at = recapture_at + Duration::from_secs(1);
    let transition = step(
        &mut classifier,
        &mut engine,
        &mut store,
        &history,
        occupied_scene(),
        at,
    );
    assert!(transition.is_none());

    let contents = std::fs::read_to_string(history.path()).unwrap();
    assert!(contents.contains("ALL,RESET (Background Captured),0.00"));
}
