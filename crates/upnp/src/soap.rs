//! SOAP 1.1 envelopes and the HTTP transport used to deliver them

use crate::error::SoapError;
use async_trait::async_trait;
use dlnalink_core::CastConfig;
use reqwest::header::{CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use tracing::debug;

pub const SOAP_CONTENT_TYPE: &str = r#"text/xml; charset="utf-8""#;

/// One UPnP action call
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    service_type: String,
    action: String,
    args: Vec<(String, String)>,
}

impl SoapEnvelope {
    pub fn new(service_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            action: action.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument; `value` is inserted verbatim and must already be escaped
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Value of the SOAPAction header, quotes included
    pub fn soap_action(&self) -> String {
        format!("\"{}#{}\"", self.service_type, self.action)
    }

    pub fn build(&self) -> String {
        let mut args = String::new();
        for (name, value) in &self.args {
            args.push_str(&format!("\n      <{name}>{value}</{name}>"));
        }

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action} xmlns:u="{service}">{args}
    </u:{action}>
  </s:Body>
</s:Envelope>"#,
            action = self.action,
            service = self.service_type,
            args = args,
        )
    }
}

/// Raw HTTP answer to a SOAP request
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: u16,
    pub body: String,
}

impl SoapResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers SOAP requests to a control URL
///
/// Implementations return `Err` only when no HTTP response was obtained;
/// error statuses come back as a `SoapResponse`.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    async fn post(
        &self,
        control_url: &str,
        soap_action: &str,
        body: String,
    ) -> Result<SoapResponse, SoapError>;
}

/// reqwest-backed transport
pub struct HttpSoapTransport {
    client: Client,
    user_agent: String,
}

impl HttpSoapTransport {
    pub fn new(config: &CastConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.soap_timeout())
            .timeout(config.soap_timeout())
            .build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl SoapTransport for HttpSoapTransport {
    async fn post(
        &self,
        control_url: &str,
        soap_action: &str,
        body: String,
    ) -> Result<SoapResponse, SoapError> {
        debug!("Sending SOAP action {} to {}", soap_action, control_url);
        debug!("Body: {}", body);

        let response = self
            .client
            .post(control_url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header("SOAPAction", soap_action)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONNECTION, "close")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!("SOAP response {}: {}", status, body);

        Ok(SoapResponse { status, body })
    }
}
