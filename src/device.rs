//! Device location provider over the host's native position source.

use crate::error::{LocationError, PositionError};
use crate::models::{DeviceSettings, LocationResult, ProviderDescriptor, ProviderId};
use crate::provider::{LocationProvider, UpdateSender};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type WatchId = u64;

/// Readings delivered by a continuous watch.
pub type WatchSink = mpsc::UnboundedSender<Result<Position, PositionError>>;

/// Options handed to the position source for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the source may return. Always zero here.
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub fn fresh(timeout_seconds: u64) -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(timeout_seconds),
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

/// The platform's location-sensing capability.
pub trait PositionSource: Send + Sync {
    /// Single fresh reading, honouring `options.timeout`.
    fn current_position(&self, options: PositionOptions) -> BoxFuture<'_, Result<Position, PositionError>>;

    /// Starts a continuous watch. The first reading must arrive within
    /// `options.timeout` or the sink receives a timeout error.
    fn watch_position(&self, options: PositionOptions, sink: WatchSink) -> WatchId;

    /// Stops a watch. Unknown ids are ignored.
    fn clear_watch(&self, id: WatchId);
}

pub struct DeviceLocationProvider {
    source: Option<Arc<dyn PositionSource>>,
    watch: Mutex<Option<WatchId>>,
}

impl DeviceLocationProvider {
    pub const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
        id: ProviderId::Device,
        display_name: "Device GPS",
        description: "Position fix from a local GPS receiver via gpsd",
        credential_field: None,
    };

    /// `None` means the host has no location capability at all.
    pub fn new(source: Option<Arc<dyn PositionSource>>) -> Self {
        Self {
            source,
            watch: Mutex::new(None),
        }
    }

    fn clear_active_watch(&self, source: &dyn PositionSource) {
        let previous = self.watch.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(id) = previous {
            debug!("Clearing position watch {}", id);
            source.clear_watch(id);
        }
    }

    async fn track(
        &self,
        source: &dyn PositionSource,
        settings: DeviceSettings,
        updates: UpdateSender,
    ) -> Result<LocationResult, LocationError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Registered and recorded under one lock so a concurrent cleanup
        // always sees the new watch.
        let id = {
            let mut watch = self.watch.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = watch.take() {
                source.clear_watch(previous);
            }
            let id = source.watch_position(PositionOptions::fresh(settings.timeout_seconds), tx);
            *watch = Some(id);
            id
        };
        info!("Started live tracking (watch {})", id);

        let first = match rx.recv().await {
            Some(Ok(position)) => to_result(position, true),
            Some(Err(e)) => return Err(LocationError::from_position(&e, settings.timeout_seconds)),
            None => return Err(LocationError::unknown("position watch ended before the first fix")),
        };
        updates.send(first.clone());

        // Later readings only feed the update channel. The loop ends when the
        // watch is cleared and its sink dropped.
        tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                match reading {
                    Ok(position) => {
                        if !updates.send(to_result(position, true)) {
                            break;
                        }
                    }
                    Err(e) => warn!("Live tracking reading failed: {}", e),
                }
            }
            debug!("Live tracking forwarder for watch {} finished", id);
        });

        Ok(first)
    }
}

impl LocationProvider for DeviceLocationProvider {
    type Request = DeviceSettings;

    fn descriptor(&self) -> ProviderDescriptor {
        Self::DESCRIPTOR
    }

    async fn get_location(
        &self,
        settings: DeviceSettings,
        updates: UpdateSender,
    ) -> Result<LocationResult, LocationError> {
        let Some(source) = self.source.as_deref() else {
            return Err(LocationError::unsupported());
        };
        // A refresh replaces whatever the previous acquisition left running,
        // including a watch when live tracking has just been turned off.
        self.clear_active_watch(source);

        if settings.live_tracking {
            return self.track(source, settings, updates).await;
        }

        let options = PositionOptions::fresh(settings.timeout_seconds);
        match source.current_position(options).await {
            Ok(position) => Ok(to_result(position, false)),
            Err(e) => Err(LocationError::from_position(&e, settings.timeout_seconds)),
        }
    }

    fn cleanup(&self) {
        if let Some(source) = self.source.as_deref() {
            self.clear_active_watch(source);
        }
    }
}

fn to_result(position: Position, is_live: bool) -> LocationResult {
    LocationResult::new(
        ProviderId::Device,
        position.latitude,
        position.longitude,
        position.accuracy,
        is_live,
    )
}
