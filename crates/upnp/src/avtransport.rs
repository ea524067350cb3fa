/// AVTransport SOAP control for UPnP MediaRenderers
///
/// This module implements the AVTransport actions needed to cast:
/// - Set the media URL on a renderer (SetAVTransportURI)
/// - Start/stop/pause playback (Play, Stop, Pause)
/// - Query playback state (GetTransportInfo)
use crate::error::SoapError;
use crate::soap::{SoapEnvelope, SoapResponse, SoapTransport};
use crate::xml::{escape_xml, extract_xml_tag};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const AV_TRANSPORT_SERVICE: &str = "urn:schemas-upnp-org:service:AVTransport:1";

/// AVTransport controller for one renderer's control endpoint
pub struct AVTransport {
    transport: Arc<dyn SoapTransport>,
    control_url: String,
    service_type: String,
}

impl AVTransport {
    pub fn new(transport: Arc<dyn SoapTransport>, control_url: impl Into<String>) -> Self {
        Self {
            transport,
            control_url: control_url.into(),
            service_type: AV_TRANSPORT_SERVICE.to_string(),
        }
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    /// Set the URI for playback
    ///
    /// # Arguments
    /// * `uri` - The media URL (escaped here)
    /// * `metadata` - DIDL-Lite metadata, already escaped for embedding
    pub async fn set_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<(), SoapError> {
        info!("Setting AVTransport URI: {}", uri);

        let envelope = self
            .envelope("SetAVTransportURI")
            .arg("CurrentURI", escape_xml(uri))
            .arg("CurrentURIMetaData", metadata);

        self.send_soap_action(envelope).await?;
        Ok(())
    }

    /// Start playback
    pub async fn play(&self) -> Result<(), SoapError> {
        info!("Starting playback");
        self.send_soap_action(self.envelope("Play").arg("Speed", "1")).await?;
        Ok(())
    }

    /// Stop playback
    pub async fn stop(&self) -> Result<(), SoapError> {
        info!("Stopping playback");
        self.send_soap_action(self.envelope("Stop")).await?;
        Ok(())
    }

    /// Pause playback
    pub async fn pause(&self) -> Result<(), SoapError> {
        info!("Pausing playback");
        self.send_soap_action(self.envelope("Pause")).await?;
        Ok(())
    }

    /// Get transport state (PLAYING, STOPPED, PAUSED_PLAYBACK, etc.)
    pub async fn get_transport_info(&self) -> Result<TransportInfo, SoapError> {
        debug!("Getting transport info");

        let response = self.send_soap_action(self.envelope("GetTransportInfo")).await?;

        let state = extract_xml_tag(&response.body, "CurrentTransportState")
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let status = extract_xml_tag(&response.body, "CurrentTransportStatus")
            .unwrap_or_else(|| "OK".to_string());

        Ok(TransportInfo { state, status })
    }

    fn envelope(&self, action: &str) -> SoapEnvelope {
        SoapEnvelope::new(self.service_type.as_str(), action).arg("InstanceID", "0")
    }

    /// Send a SOAP action; any 2xx without a SOAP fault counts as success
    async fn send_soap_action(&self, envelope: SoapEnvelope) -> Result<SoapResponse, SoapError> {
        let response = self
            .transport
            .post(&self.control_url, &envelope.soap_action(), envelope.build())
            .await?;

        debug!("SOAP {} response: {}", envelope.action(), response.status);

        if !response.is_success() {
            warn!(
                "SOAP {} failed with status {}: {}",
                envelope.action(),
                response.status,
                response.body
            );
            return Err(SoapError::Status {
                status: response.status,
                body: response.body,
            });
        }

        if let Some(fault) = parse_soap_fault(&response.body) {
            warn!("SOAP {} returned a fault: {}", envelope.action(), fault);
            return Err(fault);
        }

        Ok(response)
    }
}

/// Transport state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub state: String,  // PLAYING, STOPPED, PAUSED_PLAYBACK, etc.
    pub status: String, // OK, ERROR_OCCURRED
}

/// Detect a `Fault` element in an otherwise successful response
fn parse_soap_fault(body: &str) -> Option<SoapError> {
    if !(body.contains(":Fault>") || body.contains("<Fault>")) {
        return None;
    }

    let code = extract_xml_tag(body, "errorCode")
        .or_else(|| extract_xml_tag(body, "faultcode"))
        .unwrap_or_else(|| "unknown".to_string());
    let description = extract_xml_tag(body, "errorDescription")
        .or_else(|| extract_xml_tag(body, "faultstring"))
        .unwrap_or_default();

    Some(SoapError::Fault { code, description })
}
