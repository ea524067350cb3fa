//! UPnP/DLNA casting core
//!
//! This crate provides:
//! - UPnP device discovery via SSDP M-SEARCH
//! - Device description fetching and AVTransport endpoint resolution
//! - AVTransport control over SOAP (Stop, SetAVTransportURI, Play, ...)
//! - DIDL-Lite metadata generation
//! - A controller tying discovery, the device registry and casting together
pub mod avtransport;
pub mod cast;
pub mod controller;
pub mod description;
pub mod didl;
pub mod discovery;
pub mod error;
pub mod soap;
pub mod xml;

pub use avtransport::{AVTransport, TransportInfo, AV_TRANSPORT_SERVICE};
pub use cast::Caster;
pub use controller::DlnaController;
pub use description::{parse_device_description, resolve_control_url, DescriptionFetcher};
pub use didl::{build_didl_lite, didl_metadata};
pub use discovery::{
    build_msearch, parse_location, DiscoveryReport, Observation, SeenLocations, SsdpDiscovery,
    SsdpSocket,
};
pub use error::{CastError, DiscoveryError, FetchError, SoapError};
pub use soap::{HttpSoapTransport, SoapEnvelope, SoapResponse, SoapTransport};
pub use xml::{escape_xml, extract_xml_tag, extract_xml_tag_from, unescape_xml};

pub use dlnalink_core::{Config, Device, DeviceRegistry, MergeOutcome};
