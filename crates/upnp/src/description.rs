/// Fetch and parse UPnP device description documents
///
/// Only the identity fields and the AVTransport control URL are extracted;
/// the rest of the description schema is ignored.
use crate::avtransport::AV_TRANSPORT_SERVICE;
use crate::error::FetchError;
use crate::xml::{extract_xml_tag, extract_xml_tag_from, unescape_xml};
use dlnalink_core::models::{
    UNKNOWN_DEVICE_NAME, UNKNOWN_DEVICE_TYPE, UNKNOWN_MANUFACTURER, UNKNOWN_MODEL_NAME, UNKNOWN_UDN,
};
use dlnalink_core::{Device, DiscoveryConfig};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client for device description documents
#[derive(Clone)]
pub struct DescriptionFetcher {
    client: Client,
}

impl DescriptionFetcher {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.description_timeout())
            .timeout(config.description_timeout())
            .build()?;

        Ok(Self { client })
    }

    /// GET the description at `location` and parse it into a [`Device`]
    ///
    /// One attempt only; failures are returned to the caller.
    pub async fn fetch(&self, location: &str) -> Result<Device, FetchError> {
        debug!("Fetching device description from: {}", location);
        let started = Instant::now();

        let response = self.client.get(location).send().await?;
        let status = response.status();
        debug!("Description HTTP {} in {:?}", status.as_u16(), started.elapsed());

        if !status.is_success() {
            warn!("Description request to {} failed: HTTP {}", location, status.as_u16());
            return Err(FetchError::Status(status.as_u16()));
        }

        let xml = response.text().await?;
        debug!("Description is {} bytes", xml.len());

        let device = parse_device_description(&xml, location);
        info!(
            "Parsed device: {} / {} / {}",
            device.friendly_name, device.model_name, device.manufacturer
        );
        Ok(device)
    }
}

/// Build a [`Device`] from a description document, filling in defaults
pub fn parse_device_description(xml: &str, location: &str) -> Device {
    let field = |tag: &str, default: &str| {
        extract_xml_tag(xml, tag)
            .map(|value| unescape_xml(&value))
            .unwrap_or_else(|| default.to_string())
    };

    Device {
        location: location.to_string(),
        unique_id: field("UDN", UNKNOWN_UDN),
        friendly_name: field("friendlyName", UNKNOWN_DEVICE_NAME),
        model_name: field("modelName", UNKNOWN_MODEL_NAME),
        manufacturer: field("manufacturer", UNKNOWN_MANUFACTURER),
        device_type: field("deviceType", UNKNOWN_DEVICE_TYPE),
        control_endpoint: find_av_transport_control_url(xml, location),
    }
}

/// Absolute control URL of the AVTransport service, if the document lists one
///
/// Takes the first `<controlURL>` after the first mention of the AVTransport
/// service type. This relies on `serviceType` preceding `controlURL` inside
/// each `<service>` block; a document ordering them differently would bind
/// the next service's control URL.
fn find_av_transport_control_url(xml: &str, location: &str) -> Option<String> {
    let service_offset = xml.find(AV_TRANSPORT_SERVICE)?;
    let (control_url, _) = extract_xml_tag_from(xml, "controlURL", service_offset)?;
    let control_url = unescape_xml(&control_url);

    if control_url.is_empty() {
        warn!("AVTransport service at {} has an empty controlURL", location);
        return None;
    }

    let resolved = resolve_control_url(location, &control_url);
    debug!("Found AVTransport control URL: {}", resolved);
    Some(resolved)
}

/// Resolve a `controlURL` value against the description's location
///
/// - absolute URLs are returned unchanged
/// - `/path` keeps scheme, host and port of `location`, even for `//path`
/// - anything else is joined to the directory of `location`
pub fn resolve_control_url(location: &str, control_url: &str) -> String {
    if control_url.starts_with("http://") || control_url.starts_with("https://") {
        return control_url.to_string();
    }

    let mut base = match Url::parse(location) {
        Ok(base) if !base.cannot_be_a_base() => base,
        Ok(_) => {
            debug!("{} cannot be a base URL, joining as text", location);
            return join_as_text(location, control_url);
        }
        Err(e) => {
            debug!("Could not parse {} as a URL ({}), joining as text", location, e);
            return join_as_text(location, control_url);
        }
    };

    if control_url.starts_with('/') {
        // Url::join would read "//host/..." as a different authority
        let (path, query) = match control_url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (control_url, None),
        };
        base.set_path(path);
        base.set_query(query);
        base.set_fragment(None);
        return base.to_string();
    }

    match base.join(control_url) {
        Ok(url) => url.to_string(),
        Err(e) => {
            debug!("Could not join {} onto {} ({}), joining as text", control_url, location, e);
            join_as_text(location, control_url)
        }
    }
}

fn join_as_text(location: &str, control_url: &str) -> String {
    let authority_start = location.find("://").map_or(0, |pos| pos + 3);

    if control_url.starts_with('/') {
        // Keep everything up to the end of the authority
        let origin = match location[authority_start..].find('/') {
            Some(slash) => &location[..authority_start + slash],
            None => location,
        };
        return format!("{}{}", origin, control_url);
    }

    // Directory of the location, trailing slash included
    match location.rfind('/') {
        Some(last_slash) if last_slash >= authority_start => {
            format!("{}{}", &location[..=last_slash], control_url)
        }
        _ => format!("{}/{}", location, control_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATION: &str = "http://192.168.1.5:8080/desc.xml";

    fn description(control_url: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Living Room TV</friendlyName>
    <manufacturer>ACME Corp</manufacturer>
    <modelName>Renderer v1</modelName>
    <UDN>uuid:12345678-1234-1234-1234-123456789012</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <controlURL>/ctl/RenderingControl</controlURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <controlURL>{}</controlURL>
        <eventSubURL>/evt/AVTransport</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#,
            control_url
        )
    }

    #[test]
    fn test_parse_device_description() {
        let device = parse_device_description(&description("/ctl/AVTransport"), LOCATION);

        assert_eq!(device.location, LOCATION);
        assert_eq!(device.unique_id, "uuid:12345678-1234-1234-1234-123456789012");
        assert_eq!(device.friendly_name, "Living Room TV");
        assert_eq!(device.manufacturer, "ACME Corp");
        assert_eq!(device.model_name, "Renderer v1");
        assert_eq!(device.device_type, "urn:schemas-upnp-org:device:MediaRenderer:1");
        assert_eq!(
            device.control_endpoint.as_deref(),
            Some("http://192.168.1.5:8080/ctl/AVTransport")
        );
    }

    #[test]
    fn test_relative_control_url() {
        let device = parse_device_description(&description("AVTransport/control"), LOCATION);
        assert_eq!(
            device.control_endpoint.as_deref(),
            Some("http://192.168.1.5:8080/AVTransport/control")
        );
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let device = parse_device_description("<root><device></device></root>", LOCATION);

        assert_eq!(device.unique_id, "unknown-udn");
        assert_eq!(device.friendly_name, "Unknown Device");
        assert_eq!(device.model_name, "Unknown Model");
        assert_eq!(device.manufacturer, "Unknown");
        assert_eq!(device.device_type, "unknown");
        assert_eq!(device.control_endpoint, None);
    }

    #[test]
    fn test_no_av_transport_service() {
        let xml = r#"<root><device><UDN>uuid:nas</UDN><serviceList><service>
<serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
<controlURL>/ctl/ContentDirectory</controlURL>
</service></serviceList></device></root>"#;

        let device = parse_device_description(xml, LOCATION);
        assert_eq!(device.unique_id, "uuid:nas");
        assert!(!device.is_castable());
    }

    #[test]
    fn test_empty_control_url() {
        let device = parse_device_description(&description(""), LOCATION);
        assert_eq!(device.control_endpoint, None);
    }

    #[test]
    fn test_entities_in_fields() {
        let xml = "<root><friendlyName>Tom &amp; Jerry&apos;s TV</friendlyName></root>";
        let device = parse_device_description(xml, LOCATION);
        assert_eq!(device.friendly_name, "Tom & Jerry's TV");
    }

    #[test]
    fn test_resolve_control_url() {
        assert_eq!(
            resolve_control_url(LOCATION, "/ctl/AVTransport"),
            "http://192.168.1.5:8080/ctl/AVTransport"
        );
        assert_eq!(
            resolve_control_url(LOCATION, "AVTransport/control"),
            "http://192.168.1.5:8080/AVTransport/control"
        );
        assert_eq!(
            resolve_control_url("http://192.168.1.5:8080/upnp/desc.xml", "AVTransport/control"),
            "http://192.168.1.5:8080/upnp/AVTransport/control"
        );
        assert_eq!(
            resolve_control_url(LOCATION, "http://other.com/path"),
            "http://other.com/path"
        );
    }

    #[test]
    fn test_absolute_path_stays_on_location_host() {
        assert_eq!(
            resolve_control_url(LOCATION, "//evil/ctl"),
            "http://192.168.1.5:8080//evil/ctl"
        );
        assert_eq!(
            resolve_control_url("http://192.168.1.5:8080/desc.xml?v=2", "/ctl?id=1"),
            "http://192.168.1.5:8080/ctl?id=1"
        );

        let device = parse_device_description(&description("//evil/ctl"), LOCATION);
        assert!(device
            .control_endpoint
            .unwrap()
            .starts_with("http://192.168.1.5:8080/"));
    }

    #[test]
    fn test_trailing_slash_location() {
        assert_eq!(
            resolve_control_url("http://192.168.1.5:8080/dev/", "ctl"),
            "http://192.168.1.5:8080/dev/ctl"
        );
        assert_eq!(join_as_text("host:8080/dev/", "ctl"), "host:8080/dev/ctl");
        // Not a base URL, so resolution takes the textual path
        assert_eq!(resolve_control_url("host:8080/dev/", "ctl"), "host:8080/dev/ctl");
    }

    #[test]
    fn test_join_as_text() {
        assert_eq!(join_as_text("host/dir/desc.xml", "ctl"), "host/dir/ctl");
        assert_eq!(join_as_text("host:8080/dev/desc.xml", "/ctl"), "host:8080/ctl");
        assert_eq!(join_as_text("odd://host/desc.xml", "/ctl"), "odd://host/ctl");
        assert_eq!(join_as_text("odd://host", "ctl"), "odd://host/ctl");
    }
}
