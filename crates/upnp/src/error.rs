use thiserror::Error;

/// Failure to run an SSDP search at all (as opposed to finding nothing)
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid SSDP target address {0}")]
    InvalidTarget(String),
    #[error("SSDP socket error: {0}")]
    Socket(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("description request returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum SoapError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SOAP action failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("SOAP fault {code}: {description}")]
    Fault { code: String, description: String },
}

#[derive(Debug, Error)]
pub enum CastError {
    #[error("device '{0}' has no AVTransport control endpoint")]
    NotCastable(String),
    #[error("SetAVTransportURI failed: {0}")]
    SetUri(#[source] SoapError),
    #[error("Play failed: {0}")]
    Play(#[source] SoapError),
    #[error("{action} failed: {source}")]
    Action {
        action: &'static str,
        #[source]
        source: SoapError,
    },
}
