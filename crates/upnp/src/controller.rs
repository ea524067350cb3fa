/// Front-end facing controller
///
/// Owns the device registry and wires discovery, description fetching and
/// casting together. Devices found during discovery are merged into the
/// registry and re-broadcast to subscribers.
use crate::avtransport::TransportInfo;
use crate::cast::Caster;
use crate::description::DescriptionFetcher;
use crate::discovery::{DiscoveryReport, SsdpDiscovery};
use crate::error::{CastError, DiscoveryError, FetchError};
use crate::soap::{HttpSoapTransport, SoapTransport};
use dlnalink_core::{Config, Device, DeviceRegistry, MergeOutcome, SharedDeviceRegistry};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

const EVENT_CAPACITY: usize = 64;

pub struct DlnaController {
    registry: SharedDeviceRegistry,
    fetcher: Arc<DescriptionFetcher>,
    discovery: SsdpDiscovery,
    caster: Caster,
    events: broadcast::Sender<Device>,
}

impl DlnaController {
    /// Controller with HTTP transports built from `config` and a fresh registry
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let transport = Arc::new(HttpSoapTransport::new(&config.cast)?);
        Self::with_transport(config, Arc::new(DeviceRegistry::new()), transport)
    }

    /// Controller using an existing registry and SOAP transport
    pub fn with_transport(
        config: &Config,
        registry: SharedDeviceRegistry,
        transport: Arc<dyn SoapTransport>,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = Arc::new(DescriptionFetcher::new(&config.discovery)?);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            registry,
            discovery: SsdpDiscovery::new(config.discovery.clone(), fetcher.clone()),
            fetcher,
            caster: Caster::new(transport, config.cast.title.clone()),
            events,
        })
    }

    pub fn registry(&self) -> &SharedDeviceRegistry {
        &self.registry
    }

    /// Snapshot of the registry
    pub fn devices(&self) -> Vec<Device> {
        self.registry.devices()
    }

    /// Stream of devices as they are inserted or enriched
    pub fn subscribe(&self) -> broadcast::Receiver<Device> {
        self.events.subscribe()
    }

    /// Empty the registry, typically before a re-scan
    pub fn clear_devices(&self) {
        info!("Clearing {} device(s)", self.registry.len());
        self.registry.clear();
    }

    /// Run one SSDP discovery pass, merging results into the registry
    ///
    /// Returns when the receive window has closed and all descriptions are in.
    pub async fn start_discovery(&self) -> Result<DiscoveryReport, DiscoveryError> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let merge = async {
            while let Some(device) = rx.recv().await {
                self.merge(device);
            }
        };

        let (result, ()) = tokio::join!(self.discovery.discover(tx), merge);
        result
    }

    /// Fetch one description directly, bypassing SSDP
    ///
    /// Useful when multicast is blocked but the description URL is known.
    pub async fn add_device_from_location(&self, location: &str) -> Result<Device, FetchError> {
        let device = self.fetcher.fetch(location).await?;
        self.merge(device.clone());
        Ok(device)
    }

    /// Cast `media_url` to `device`; `true` when the renderer accepted Play
    pub async fn cast_to_device(&self, device: &Device, media_url: &str) -> bool {
        self.cast(device, media_url).await.is_ok()
    }

    pub async fn cast(&self, device: &Device, media_url: &str) -> Result<(), CastError> {
        self.caster.cast(device, media_url).await
    }

    pub async fn cast_with_title(
        &self,
        device: &Device,
        media_url: &str,
        title: &str,
    ) -> Result<(), CastError> {
        self.caster.cast_with_title(device, media_url, title).await
    }

    pub async fn stop(&self, device: &Device) -> Result<(), CastError> {
        let av = self.caster.av_transport(device)?;
        av.stop()
            .await
            .map_err(|source| CastError::Action { action: "Stop", source })
    }

    pub async fn pause(&self, device: &Device) -> Result<(), CastError> {
        let av = self.caster.av_transport(device)?;
        av.pause()
            .await
            .map_err(|source| CastError::Action { action: "Pause", source })
    }

    pub async fn transport_info(&self, device: &Device) -> Result<TransportInfo, CastError> {
        let av = self.caster.av_transport(device)?;
        av.get_transport_info().await.map_err(|source| {
            error!("GetTransportInfo failed: {}", source);
            CastError::Action { action: "GetTransportInfo", source }
        })
    }

    fn merge(&self, device: Device) {
        match self.registry.merge(device.clone()) {
            MergeOutcome::Inserted | MergeOutcome::Updated => {
                // No subscribers is fine
                let _ = self.events.send(device);
            }
            MergeOutcome::Unchanged => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoapError;
    use crate::soap::SoapResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SoapTransport for CountingTransport {
        async fn post(
            &self,
            _control_url: &str,
            _soap_action: &str,
            _body: String,
        ) -> Result<SoapResponse, SoapError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SoapResponse { status: 200, body: String::new() })
        }
    }

    fn controller() -> (DlnaController, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport { calls: AtomicUsize::new(0) });
        let controller = DlnaController::with_transport(
            &Config::default(),
            Arc::new(DeviceRegistry::new()),
            transport.clone(),
        )
        .unwrap();
        (controller, transport)
    }

    #[tokio::test]
    async fn test_cast_to_device_without_endpoint() {
        let (controller, transport) = controller();
        let device = Device::new("http://192.168.1.5/desc.xml", "uuid:tv");

        assert!(!controller.cast_to_device(&device, "http://host/v.mp4").await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cast_to_device() {
        let (controller, transport) = controller();
        let device = Device::new("http://192.168.1.5/desc.xml", "uuid:tv")
            .with_control_endpoint("http://192.168.1.5/ctl");

        assert!(controller.cast_to_device(&device, "http://host/v.mp4").await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_merge_broadcasts_changes_only() {
        let (controller, _) = controller();
        let mut events = controller.subscribe();

        let bare = Device::new("http://192.168.1.5/desc.xml", "uuid:tv");
        let castable = bare.clone().with_control_endpoint("http://192.168.1.5/ctl");

        controller.merge(bare.clone());
        controller.merge(castable.clone());
        controller.merge(bare);

        assert_eq!(events.recv().await.unwrap().control_endpoint, None);
        assert_eq!(events.recv().await.unwrap(), castable);
        assert!(events.try_recv().is_err());
        assert_eq!(controller.devices(), vec![castable]);
    }

    #[tokio::test]
    async fn test_clear_devices() {
        let (controller, _) = controller();
        controller.merge(Device::new("http://192.168.1.5/desc.xml", "uuid:tv"));

        controller.clear_devices();
        assert!(controller.devices().is_empty());
    }
}
