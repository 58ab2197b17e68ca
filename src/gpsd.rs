//! Position source backed by a local gpsd daemon.
//!
//! Speaks the gpsd JSON protocol: after `?WATCH={"enable":true,"json":true}`
//! the daemon streams newline-delimited reports, of which only `TPV`
//! (time-position-velocity) reports with a 2D or 3D fix are used.

use crate::device::{Position, PositionOptions, PositionSource, WatchId, WatchSink};
use crate::error::PositionError;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Used when gpsd reports no error estimate.
const DEFAULT_ACCURACY_METERS: f64 = 50.0;

#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Report {
    #[serde(rename = "TPV")]
    Tpv(Tpv),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    eph: Option<f64>,
}

/// Extracts a fix from one line of gpsd output, if it carries one.
fn parse_fix(line: &str) -> Option<Position> {
    let report: Report = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            debug!("Skipping unparsable gpsd line: {}", e);
            return None;
        }
    };
    let Report::Tpv(tpv) = report else {
        return None;
    };
    if tpv.mode < 2 {
        return None;
    }
    let accuracy = match (tpv.epx, tpv.epy) {
        (Some(x), Some(y)) => x.max(y),
        _ => tpv.eph.unwrap_or(DEFAULT_ACCURACY_METERS),
    };
    Some(Position {
        latitude: tpv.lat?,
        longitude: tpv.lon?,
        accuracy,
    })
}

fn io_to_position_error(err: io::Error) -> PositionError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => {
            PositionError::new(PositionError::PERMISSION_DENIED, err.to_string())
        }
        _ => PositionError::new(PositionError::POSITION_UNAVAILABLE, err.to_string()),
    }
}

fn timed_out(options: &PositionOptions) -> PositionError {
    PositionError::new(
        PositionError::TIMEOUT,
        format!("no fix within {}s", options.timeout.as_secs()),
    )
}

struct FixStream {
    lines: Lines<BufReader<TcpStream>>,
}

impl FixStream {
    async fn connect(addr: &str) -> Result<Self, PositionError> {
        let mut stream = TcpStream::connect(addr).await.map_err(io_to_position_error)?;
        stream
            .write_all(WATCH_COMMAND)
            .await
            .map_err(io_to_position_error)?;
        Ok(Self {
            lines: BufReader::new(stream).lines(),
        })
    }

    async fn next_fix(&mut self) -> Result<Position, PositionError> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(fix) = parse_fix(&line) {
                        return Ok(fix);
                    }
                }
                Ok(None) => {
                    return Err(PositionError::new(
                        PositionError::POSITION_UNAVAILABLE,
                        "gpsd closed the connection",
                    ))
                }
                Err(e) => return Err(io_to_position_error(e)),
            }
        }
    }
}

pub struct GpsdSource {
    addr: String,
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl GpsdSource {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
        }
    }
}

async fn run_watch(addr: String, options: PositionOptions, sink: WatchSink) {
    let first = tokio::time::timeout(options.timeout, async {
        let mut fixes = FixStream::connect(&addr).await?;
        let fix = fixes.next_fix().await?;
        Ok::<_, PositionError>((fixes, fix))
    })
    .await
    .unwrap_or_else(|_| Err(timed_out(&options)));

    let mut fixes = match first {
        Ok((fixes, fix)) => {
            if sink.send(Ok(fix)).is_err() {
                return;
            }
            fixes
        }
        Err(e) => {
            let _ = sink.send(Err(e));
            return;
        }
    };

    loop {
        match fixes.next_fix().await {
            Ok(fix) => {
                if sink.send(Ok(fix)).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("gpsd watch stopped: {}", e);
                let _ = sink.send(Err(e));
                return;
            }
        }
    }
}

impl PositionSource for GpsdSource {
    fn current_position(&self, options: PositionOptions) -> BoxFuture<'_, Result<Position, PositionError>> {
        Box::pin(async move {
            let read = async {
                let mut fixes = FixStream::connect(&self.addr).await?;
                fixes.next_fix().await
            };
            match tokio::time::timeout(options.timeout, read).await {
                Ok(result) => result,
                Err(_) => Err(timed_out(&options)),
            }
        })
    }

    fn watch_position(&self, options: PositionOptions, sink: WatchSink) -> WatchId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(run_watch(self.addr.clone(), options, sink));
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
        info!("gpsd watch {} started against {}", id, self.addr);
        id
    }

    fn clear_watch(&self, id: WatchId) {
        let handle = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(handle) = handle {
            handle.abort();
            info!("gpsd watch {} cleared", id);
        }
    }
}
