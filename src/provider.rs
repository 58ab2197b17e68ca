//! The location-provider capability and the registry of concrete providers.
//!
//! Every provider exposes the same two operations: [`LocationProvider::get_location`]
//! runs one acquisition (or starts live tracking) and resolves with the first
//! usable fix, and [`LocationProvider::cleanup`] synchronously releases any
//! background activity. [`Provider`] is the tagged union the session holds,
//! so the session never looks past that contract.

use crate::device::DeviceLocationProvider;
use crate::error::LocationError;
use crate::ip::IpLocationProvider;
use crate::models::{DeviceSettings, LocationResult, ProviderDescriptor, ProviderId, RemoteOptions};
use crate::remote::RemoteApiProvider;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Messages flowing from in-flight acquisitions back to the session.
///
/// Both variants are tagged with the originating provider and the
/// acquisition generation so the session can drop stale ones.
#[derive(Debug)]
pub enum ProviderEvent {
    /// A live reading. May arrive any number of times after the first fix.
    Update {
        provider: ProviderId,
        generation: u64,
        result: LocationResult,
    },
    /// The acquisition settled.
    Settled {
        provider: ProviderId,
        generation: u64,
        outcome: Result<LocationResult, LocationError>,
    },
}

/// Channel a provider pushes live readings through.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<ProviderEvent>,
    provider: ProviderId,
    generation: u64,
}

impl UpdateSender {
    pub fn new(tx: mpsc::UnboundedSender<ProviderEvent>, provider: ProviderId, generation: u64) -> Self {
        Self {
            tx,
            provider,
            generation,
        }
    }

    /// Returns false once nobody is listening any more.
    pub fn send(&self, result: LocationResult) -> bool {
        self.tx
            .send(ProviderEvent::Update {
                provider: self.provider,
                generation: self.generation,
                result,
            })
            .is_ok()
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Shared contract of all location sources.
pub trait LocationProvider: Send + Sync {
    /// Per-acquisition parameters.
    type Request: Send;

    fn descriptor(&self) -> ProviderDescriptor;

    fn get_location(
        &self,
        request: Self::Request,
        updates: UpdateSender,
    ) -> impl Future<Output = Result<LocationResult, LocationError>> + Send;

    /// Must be idempotent and safe when nothing is active.
    fn cleanup(&self);
}

/// Parameters for one acquisition, shaped per provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionRequest {
    Device(DeviceSettings),
    Remote(RemoteOptions),
    Ip,
}

pub enum Provider {
    Device(DeviceLocationProvider),
    Remote(RemoteApiProvider),
    Ip(IpLocationProvider),
}

impl Provider {
    pub fn id(&self) -> ProviderId {
        match self {
            Provider::Device(_) => ProviderId::Device,
            Provider::Remote(_) => ProviderId::Remote,
            Provider::Ip(_) => ProviderId::Ip,
        }
    }
}

impl LocationProvider for Provider {
    type Request = AcquisitionRequest;

    fn descriptor(&self) -> ProviderDescriptor {
        match self {
            Provider::Device(p) => p.descriptor(),
            Provider::Remote(p) => p.descriptor(),
            Provider::Ip(p) => p.descriptor(),
        }
    }

    fn get_location(
        &self,
        request: AcquisitionRequest,
        updates: UpdateSender,
    ) -> impl Future<Output = Result<LocationResult, LocationError>> + Send {
        async move {
            match (self, request) {
                (Provider::Device(p), AcquisitionRequest::Device(settings)) => {
                    p.get_location(settings, updates).await
                }
                (Provider::Remote(p), AcquisitionRequest::Remote(options)) => {
                    p.get_location(options, updates).await
                }
                (Provider::Ip(p), AcquisitionRequest::Ip) => p.get_location((), updates).await,
                (provider, request) => Err(LocationError::unknown(format!(
                    "request {request:?} does not fit provider '{}'",
                    provider.id()
                ))),
            }
        }
    }

    fn cleanup(&self) {
        match self {
            Provider::Device(p) => p.cleanup(),
            Provider::Remote(p) => p.cleanup(),
            Provider::Ip(p) => p.cleanup(),
        }
    }
}

/// Holds one provider per [`ProviderId`].
pub struct ProviderRegistry {
    providers: Vec<Arc<Provider>>,
}

impl ProviderRegistry {
    pub fn new(
        device: DeviceLocationProvider,
        remote: RemoteApiProvider,
        ip: IpLocationProvider,
    ) -> Self {
        Self {
            providers: vec![
                Arc::new(Provider::Device(device)),
                Arc::new(Provider::Remote(remote)),
                Arc::new(Provider::Ip(ip)),
            ],
        }
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<Provider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor()).collect()
    }

    pub fn cleanup_all(&self) {
        for provider in &self.providers {
            provider.cleanup();
        }
    }
}
