//! Control/status HTTP layer.
//!
//! A thin wrapper around the core: it only reads the published snapshot,
//! serves the history file, and enqueues control commands for the detection
//! loop. Control requests are answered 202 once queued; the loop executes
//! them between frame steps.
//!
//! The front-end is served from a different origin, so every response
//! carries permissive CORS headers.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::history::HistoryLog;
use crate::shared::{Command, SharedState};
use crate::store::Region;

const MAX_HEADER_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 256 * 1024;
/// Pacing for the MJPEG preview stream (~30 fps ceiling).
const STREAM_FRAME_DELAY: Duration = Duration::from_millis(33);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub history_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8700".to_string(),
            history_path: "seat_analytics.csv".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Wait for the server thread to exit (it watches the shared shutdown
    /// flag).
    pub fn join(mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    shared: Arc<SharedState>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, shared: Arc<SharedState>) -> Self {
        Self { cfg, shared }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let cfg = self.cfg.clone();
        let shared = self.shared.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, shared) {
                log::error!("seat api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, cfg: ApiConfig, shared: Arc<SharedState>) -> Result<()> {
    loop {
        if shared.shutdown_requested() {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &cfg, &shared) {
                    log::warn!("seat api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusResponse {
    classifier: &'static str,
    calibrated: bool,
    seats: Vec<crate::state::RuntimeState>,
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    shared: &Arc<SharedState>,
) -> Result<()> {
    let request = read_request(&mut stream)?;

    if request.method == "OPTIONS" {
        return write_response(&mut stream, 204, "text/plain", b"");
    }

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/seats") => {
            let snapshot = shared.snapshot();
            let payload = serde_json::to_vec(&snapshot.regions)?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("GET", "/status") => {
            let snapshot = shared.snapshot();
            let payload = serde_json::to_vec(&StatusResponse {
                classifier: if snapshot.calibrated {
                    "ready"
                } else {
                    "awaiting_calibration"
                },
                calibrated: snapshot.calibrated,
                seats: snapshot.runtime,
            })?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("GET", "/report") => {
            let log = HistoryLog::new(&cfg.history_path);
            log.ensure_exists()?;
            let bytes = std::fs::read(log.path())?;
            write_download_response(&mut stream, &bytes)
        }
        ("GET", "/video") => {
            // The stream runs on its own thread so the accept loop stays
            // responsive; it ends on client disconnect or shutdown.
            let shared = shared.clone();
            std::thread::spawn(move || {
                if let Err(err) = stream_mjpeg(stream, shared) {
                    log::debug!("mjpeg viewer disconnected: {}", err);
                }
            });
            Ok(())
        }
        ("POST", "/seats") => {
            let regions: Vec<Region> = match serde_json::from_slice(&request.body) {
                Ok(regions) => regions,
                Err(err) => {
                    write_json_response(&mut stream, 400, r#"{"error":"invalid_regions"}"#)?;
                    return Err(anyhow!("invalid region payload: {}", err));
                }
            };
            shared.push_command(Command::SaveRegions(regions));
            write_json_response(&mut stream, 202, r#"{"status":"queued"}"#)
        }
        ("POST", "/calibrate") => {
            shared.push_command(Command::CaptureReference);
            write_json_response(&mut stream, 202, r#"{"status":"queued"}"#)
        }
        ("POST", "/reset") => {
            shared.push_command(Command::ResetStates);
            write_json_response(&mut stream, 202, r#"{"status":"queued"}"#)
        }
        ("GET", _) | ("POST", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)
        }
        _ => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

/// Serve the MJPEG preview: the latest rendered frame, re-sent at a bounded
/// rate until the client goes away or shutdown is requested.
fn stream_mjpeg(mut stream: TcpStream, shared: Arc<SharedState>) -> Result<()> {
    let header = "HTTP/1.1 200 OK\r\n\
         Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
         Cache-Control: no-store\r\n\
         Access-Control-Allow-Origin: *\r\n\r\n";
    stream.write_all(header.as_bytes())?;

    loop {
        if shared.shutdown_requested() {
            break;
        }
        if let Some(jpeg) = shared.latest_jpeg() {
            let part = format!(
                "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                jpeg.len()
            );
            stream.write_all(part.as_bytes())?;
            stream.write_all(&jpeg)?;
            stream.write_all(b"\r\n")?;
        }
        std::thread::sleep(STREAM_FRAME_DELAY);
    }
    Ok(())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request header too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-request"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES {
        return Err(anyhow!("request body too large"));
    }
    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_download_response(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/csv\r\n\
         Content-Disposition: attachment; filename=\"seat_report.csv\"\r\n\
         Content-Length: {}\r\n\
         Cache-Control: no-store\r\n\
         Access-Control-Allow-Origin: *\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        202 => "HTTP/1.1 202 Accepted",
        204 => "HTTP/1.1 204 No Content",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {len}\r\n\
         Cache-Control: no-store\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}
