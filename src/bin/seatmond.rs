//! seatmond - seat occupancy monitoring daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured camera source
//! 2. Evaluates per-region occupancy via the configured classifier
//! 3. Debounces raw signals and confirms state transitions
//! 4. Appends confirmed transitions to the history log and mirrors them
//!    onto the region document
//! 5. Publishes an annotated frame and seat state for the HTTP layer
//!
//! The loop never exits on per-frame failures; only an explicit shutdown
//! (Ctrl-C) stops it.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Result};
use chrono::Utc;

use seatmon::api::{ApiConfig, ApiServer};
use seatmon::config::{MonitorConfig, Strategy};
use seatmon::detect::{BackgroundClassifier, BackgroundSettings, Classifier, ModelSettings};
use seatmon::frame::{encode_jpeg, Frame, STREAM_JPEG_QUALITY};
use seatmon::ingest::{CameraConfig, CameraSource};
use seatmon::render::{annotate, Banner, Overlay};
use seatmon::shared::{Command, SharedState, Snapshot};
use seatmon::state::StateEngine;
use seatmon::store::RegionStore;
use seatmon::{HistoryLog, SeatStatus};

/// Delay before reopening the camera after a failed read.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = MonitorConfig::load()?;
    let mut store = RegionStore::open(&cfg.regions_path)?;
    let history = HistoryLog::new(&cfg.history_path);
    if let Err(e) = history.ensure_exists() {
        log::warn!("history log unavailable at startup: {}", e);
    }

    let mut engine = StateEngine::new(cfg.detection.dwell);
    engine.configure(
        store.regions().iter().map(|r| r.id.as_str()),
        SystemTime::now(),
    );

    let mut classifier = build_classifier(&cfg)?;

    let mut source = CameraSource::new(CameraConfig {
        url: cfg.camera.url.clone(),
        target_fps: cfg.camera.target_fps,
        width: cfg.camera.width,
        height: cfg.camera.height,
    })?;
    source.connect()?;

    let shared = SharedState::new();
    let ctrlc_shared = shared.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        ctrlc_shared.request_shutdown();
    })?;

    let api_handle = ApiServer::new(
        ApiConfig {
            addr: cfg.api_addr.clone(),
            history_path: cfg.history_path.clone(),
        },
        shared.clone(),
    )
    .spawn()?;
    log::info!("seat api listening on {}", api_handle.addr);
    log::info!(
        "seatmond running: {} regions, classifier={}, dwell={}s",
        store.len(),
        classifier.name(),
        cfg.detection.dwell.as_secs()
    );

    let frame_delay = Duration::from_millis((1000 / cfg.camera.target_fps.max(1)) as u64);
    let mut last_frame: Option<Frame> = None;
    let mut last_health_log = Instant::now();

    while !shared.shutdown_requested() {
        // Control signals execute between frame steps, never mid-frame.
        for command in shared.drain_commands() {
            handle_command(
                command,
                classifier.as_mut(),
                &mut engine,
                &mut store,
                &history,
                last_frame.as_ref(),
            );
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame read failed: {}; reconnecting", e);
                std::thread::sleep(RECONNECT_DELAY);
                if let Err(e) = source.connect() {
                    log::warn!("camera reconnect failed: {}", e);
                }
                continue;
            }
        };
        let now = frame.captured_at;

        match classifier.evaluate(&frame, store.regions()) {
            Ok(evaluation) => {
                if let Some(occupancy) = evaluation.occupancy() {
                    let region_ids: Vec<String> =
                        store.regions().iter().map(|r| r.id.clone()).collect();
                    for id in region_ids {
                        let raw = occupancy.get(&id).copied().unwrap_or(false);
                        let Some(transition) = engine.observe(&id, raw, now) else {
                            continue;
                        };
                        log::info!(
                            "seat {}: {} -> {} after {:.1}s",
                            transition.region_id,
                            transition.from,
                            transition.to,
                            transition.duration.as_secs_f64()
                        );
                        // A failed append or save never aborts the loop;
                        // runtime state stays authoritative.
                        if let Err(e) = history.record(
                            &transition.region_id,
                            transition.from,
                            transition.duration_minutes(),
                        ) {
                            log::error!("history append failed: {}", e);
                        }
                        if let Err(e) = store.apply_transition(&transition, Utc::now()) {
                            log::error!("region document update failed: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                // Skip this frame; previous confirmed state stands.
                log::warn!("classification failed: {}", e);
            }
        }

        publish_snapshot(&shared, &frame, &store, &engine, classifier.as_ref(), now);
        last_frame = Some(frame);

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "camera health={} frames={} source={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.source
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(frame_delay);
    }

    log::info!("detection loop stopped");
    api_handle.join()?;
    Ok(())
}

fn build_classifier(cfg: &MonitorConfig) -> Result<Box<dyn Classifier>> {
    match cfg.detection.strategy {
        Strategy::Background => Ok(Box::new(BackgroundClassifier::new(BackgroundSettings {
            diff_threshold: cfg.detection.diff_threshold,
            pixel_threshold: cfg.detection.pixel_threshold,
            ..BackgroundSettings::default()
        }))),
        Strategy::Model => {
            let settings = ModelSettings {
                min_confidence: cfg.detection.min_confidence,
                max_area_fraction: cfg.detection.max_box_area,
            };
            #[cfg(feature = "backend-tract")]
            {
                let model_path = cfg
                    .detection
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("model strategy requires detection.model_path"))?;
                let backend = seatmon::detect::backends::TractBackend::new(
                    model_path,
                    cfg.camera.width,
                    cfg.camera.height,
                    cfg.detection.model_labels.clone(),
                )?;
                Ok(Box::new(seatmon::detect::ModelClassifier::new(
                    Box::new(backend),
                    settings,
                )))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                let _ = settings;
                Err(anyhow!(
                    "model strategy requires the backend-tract feature"
                ))
            }
        }
    }
}

fn handle_command(
    command: Command,
    classifier: &mut dyn Classifier,
    engine: &mut StateEngine,
    store: &mut RegionStore,
    history: &HistoryLog,
    last_frame: Option<&Frame>,
) {
    let now = SystemTime::now();
    match command {
        Command::CaptureReference => {
            let Some(frame) = last_frame else {
                log::warn!("reference capture skipped: no frame available yet");
                return;
            };
            classifier.capture_reference(frame);
            engine.recalibrate(now);
            if let Err(e) = store.reset_all(Utc::now(), true) {
                log::error!("region document reset failed: {}", e);
            }
            if let Err(e) = history.record_reset() {
                log::error!("history reset row failed: {}", e);
            }
            log::info!("reference frame captured; all regions reset to available");
        }
        Command::SaveRegions(regions) => match store.replace(regions) {
            Ok(()) => {
                engine.configure(store.regions().iter().map(|r| r.id.as_str()), now);
                log::info!("region configuration saved: {} regions", store.len());
            }
            Err(e) => log::warn!("region configuration rejected: {}", e),
        },
        Command::ResetStates => {
            engine.recalibrate(now);
            if let Err(e) = store.reset_all(Utc::now(), false) {
                log::error!("region document reset failed: {}", e);
            }
            log::info!("all region states reset to available");
        }
    }
}

fn publish_snapshot(
    shared: &Arc<SharedState>,
    frame: &Frame,
    store: &RegionStore,
    engine: &StateEngine,
    classifier: &dyn Classifier,
    now: SystemTime,
) {
    let overlays: Vec<Overlay> = store
        .regions()
        .iter()
        .map(|region| Overlay {
            rect: region.bounds.to_pixels(frame.width(), frame.height()),
            status: engine
                .confirmed(&region.id)
                .unwrap_or(SeatStatus::Available),
        })
        .collect();

    let banner = if classifier.is_calibrated() {
        Banner::Monitoring {
            occupied: overlays.iter().filter(|o| o.status.is_occupied()).count(),
            total: overlays.len(),
        }
    } else {
        Banner::AwaitingCalibration
    };

    let annotated = annotate(&frame.image, &overlays, &banner);
    let rendered_jpeg = match encode_jpeg(&annotated, STREAM_JPEG_QUALITY) {
        Ok(bytes) => Some(Arc::new(bytes)),
        Err(e) => {
            // Keep serving the previous rendered frame.
            log::warn!("frame encode failed: {}", e);
            shared.latest_jpeg()
        }
    };

    shared.publish(Snapshot {
        rendered_jpeg,
        regions: store.regions().to_vec(),
        runtime: engine.snapshot(now),
        calibrated: classifier.is_calibrated(),
    });
}
