/// Cast orchestration: Stop, SetAVTransportURI, Play
use crate::avtransport::AVTransport;
use crate::didl::didl_metadata;
use crate::error::CastError;
use crate::soap::SoapTransport;
use dlnalink_core::Device;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives a renderer through the cast sequence
pub struct Caster {
    transport: Arc<dyn SoapTransport>,
    title: String,
}

impl Caster {
    /// `title` is announced in the DIDL-Lite metadata of every cast
    pub fn new(transport: Arc<dyn SoapTransport>, title: impl Into<String>) -> Self {
        Self {
            transport,
            title: title.into(),
        }
    }

    /// AVTransport client for a device, if it has a control endpoint
    pub fn av_transport(&self, device: &Device) -> Result<AVTransport, CastError> {
        match &device.control_endpoint {
            Some(endpoint) => Ok(AVTransport::new(self.transport.clone(), endpoint.as_str())),
            None => Err(CastError::NotCastable(device.friendly_name.clone())),
        }
    }

    /// Make `device` play `media_url`
    pub async fn cast(&self, device: &Device, media_url: &str) -> Result<(), CastError> {
        self.cast_with_title(device, media_url, &self.title).await
    }

    /// Like [`Caster::cast`] with an explicit metadata title
    ///
    /// Stop is best effort. A failed SetAVTransportURI ends the sequence
    /// before Play is sent. The three requests are strictly sequential.
    pub async fn cast_with_title(
        &self,
        device: &Device,
        media_url: &str,
        title: &str,
    ) -> Result<(), CastError> {
        let av = self.av_transport(device).map_err(|e| {
            error!("Cannot cast: {}", e);
            e
        })?;

        info!(
            "Casting {} to {} via {}",
            media_url,
            device.friendly_name,
            av.control_url()
        );

        info!("[1/3] Stop");
        if let Err(e) = av.stop().await {
            warn!("Stop failed, continuing: {}", e);
        }

        info!("[2/3] SetAVTransportURI");
        let metadata = didl_metadata(media_url, title);
        av.set_av_transport_uri(media_url, &metadata)
            .await
            .map_err(|e| {
                error!("SetAVTransportURI failed: {}", e);
                CastError::SetUri(e)
            })?;

        info!("[3/3] Play");
        av.play().await.map_err(|e| {
            error!("Play failed: {}", e);
            CastError::Play(e)
        })?;

        info!("Cast to {} started", device.friendly_name);
        Ok(())
    }
}
