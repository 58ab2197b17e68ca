//! The location session: which provider is active, what it last produced,
//! and the acquisition lifecycle around it.
//!
//! Every acquisition gets a fresh generation number. Events coming back from
//! providers carry their provider id and generation, and anything that does
//! not match the current pair is dropped. That is what makes switching
//! providers safe without cancelling in-flight requests.

use crate::error::{project_failure, FailureView};
use crate::models::{DeviceSettings, LocationResult, ProviderDescriptor, ProviderId, RemoteOptions};
use crate::provider::{AcquisitionRequest, LocationProvider, ProviderEvent, ProviderRegistry, UpdateSender};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long a transient notification stays up.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub raised_at: Instant,
}

/// UI-facing projection of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub active: ProviderId,
    pub loading: bool,
    pub failure: Option<FailureView>,
    pub result: Option<LocationResult>,
    pub notification: Option<Notification>,
}

pub struct LocationSession {
    registry: ProviderRegistry,
    events: mpsc::UnboundedSender<ProviderEvent>,
    generation: u64,
    state: SessionState,
    device: DeviceSettings,
    remote: RemoteOptions,
}

impl LocationSession {
    pub fn new(
        registry: ProviderRegistry,
        events: mpsc::UnboundedSender<ProviderEvent>,
        active: ProviderId,
        device: DeviceSettings,
        remote: RemoteOptions,
    ) -> Self {
        Self {
            registry,
            events,
            generation: 0,
            state: SessionState {
                active,
                loading: false,
                failure: None,
                result: None,
                notification: None,
            },
            device,
            remote,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Generation of the most recent acquisition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active(&self) -> ProviderId {
        self.state.active
    }

    pub fn device_settings(&self) -> DeviceSettings {
        self.device
    }

    pub fn remote_options(&self) -> &RemoteOptions {
        &self.remote
    }

    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.registry.descriptors()
    }

    /// Live tracking is only "on" while a device fix is actually flowing.
    pub fn is_live_active(&self) -> bool {
        self.state.active == ProviderId::Device
            && self.device.live_tracking
            && self.state.failure.is_none()
            && !self.state.loading
    }

    fn request_for(&self, id: ProviderId) -> AcquisitionRequest {
        match id {
            ProviderId::Device => AcquisitionRequest::Device(self.device),
            ProviderId::Remote => AcquisitionRequest::Remote(self.remote.clone()),
            ProviderId::Ip => AcquisitionRequest::Ip,
        }
    }

    /// Starts a new acquisition against the active provider. Nothing in
    /// flight is cancelled; its eventual result is simply stale.
    pub fn refresh(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let id = self.state.active;
        self.state.loading = true;
        self.state.failure = None;

        let Some(provider) = self.registry.get(id) else {
            warn!("No provider registered for '{}'", id);
            self.state.loading = false;
            return;
        };
        let request = self.request_for(id);
        let updates = UpdateSender::new(self.events.clone(), id, generation);
        let tx = self.events.clone();
        info!("Acquiring location from '{}' (generation {})", id, generation);

        tokio::spawn(async move {
            let outcome = provider.get_location(request, updates).await;
            let _ = tx.send(ProviderEvent::Settled {
                provider: id,
                generation,
                outcome,
            });
        });
    }

    /// Makes `id` the active provider and starts acquiring from it.
    ///
    /// Every provider is cleaned up, not only the outgoing one, and the
    /// switch happens even when `id` is already active.
    pub fn switch_provider(&mut self, id: ProviderId) {
        info!("Switching provider {} -> {}", self.state.active, id);
        self.registry.cleanup_all();
        self.state.result = None;
        self.state.failure = None;
        self.state.loading = false;
        self.state.active = id;
        self.refresh();
    }

    pub fn set_remote_options(&mut self, options: RemoteOptions) {
        if options == self.remote {
            return;
        }
        self.remote = options;
        if self.state.active == ProviderId::Remote && !self.state.loading {
            self.refresh();
        }
    }

    pub fn set_device_settings(&mut self, settings: DeviceSettings) {
        if settings == self.device {
            return;
        }
        self.device = settings;
        if self.state.active == ProviderId::Device && !self.state.loading {
            self.refresh();
        }
    }

    fn is_current(&self, provider: ProviderId, generation: u64) -> bool {
        provider == self.state.active && generation == self.generation
    }

    /// Applies a provider event. Returns true when the visible state changed.
    pub fn handle_event(&mut self, event: ProviderEvent) -> bool {
        match event {
            ProviderEvent::Update {
                provider,
                generation,
                result,
            } => {
                if !self.is_current(provider, generation) {
                    debug!("Discarding stale update from '{}' (generation {})", provider, generation);
                    return false;
                }
                self.state.result = Some(result);
                self.state.failure = None;
                true
            }
            ProviderEvent::Settled {
                provider,
                generation,
                outcome,
            } => {
                if !self.is_current(provider, generation) {
                    debug!("Discarding stale result from '{}' (generation {})", provider, generation);
                    return false;
                }
                self.state.loading = false;
                match outcome {
                    Ok(result) => {
                        self.state.result = Some(result);
                        self.state.failure = None;
                    }
                    Err(err) => {
                        warn!("Location from '{}' failed: {}", provider, err);
                        let view = project_failure(&err);
                        self.state.notification = Some(Notification {
                            message: view.toast.clone(),
                            raised_at: Instant::now(),
                        });
                        self.state.failure = Some(view);
                        self.state.result = None;
                    }
                }
                true
            }
        }
    }

    pub fn dismiss_notification(&mut self) {
        self.state.notification = None;
    }

    pub fn expire_notification(&mut self, now: Instant) {
        let expired = self
            .state
            .notification
            .as_ref()
            .is_some_and(|n| now.duration_since(n.raised_at) >= NOTIFICATION_TTL);
        if expired {
            self.state.notification = None;
        }
    }

    /// Stops any background activity before shutdown.
    pub fn shutdown(&self) {
        self.registry.cleanup_all();
    }
}
