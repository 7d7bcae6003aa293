//! Low-level SOAP protocol implementation for UPnP/Sonos communication.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and XML response parsing. For typed device operations, see `traits.rs`
//! and the per-service command modules.
//!
//! No retries happen here. Callers that want to retry transient faults wrap
//! their request in [`with_retry`](super::retry::with_retry).

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use thiserror::Error;

use super::services::SonosService;
use super::utils::escape_xml;
use crate::protocol_constants::SOAP_TIMEOUT_SECS;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with Sonos speakers.
#[derive(Debug, Error)]
pub enum SoapError {
    /// Network-level failure (connection refused, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-success HTTP status whose body is not a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker returned a well-formed SOAP fault.
    #[error("SOAP fault {code}: {description}")]
    Fault {
        /// UPnP error code (e.g. "701"), or the SOAP `faultcode` when absent.
        code: String,
        /// UPnP error description, or the SOAP `faultstring` when absent.
        description: String,
    },

    /// A successful response did not contain the expected elements.
    #[error("Failed to parse SOAP response")]
    Parse,

    /// The request was incomplete (missing service or action).
    #[error("Invalid SOAP request: {0}")]
    InvalidRequest(&'static str),
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Returns true if this error is transient and the operation may be retried.
    ///
    /// Transient Sonos SOAP fault codes:
    /// - 701: Transition not available (device changing states)
    /// - 714: Illegal seek target (previous source still loading)
    /// - 716: Resource not found (device busy initializing)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SoapError::Fault { code, description } => {
                matches!(code.as_str(), "701" | "714" | "716")
                    || description.to_lowercase().contains("transition")
            }
            SoapError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns the UPnP fault code if this is a SOAP fault.
    #[must_use]
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            SoapError::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Output arguments of a successful action, keyed by element name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapResponse {
    values: HashMap<String, String>,
}

impl SoapResponse {
    /// Returns the raw value of an output argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns an output argument, failing with [`SoapError::Parse`] when absent.
    pub fn require(&self, key: &str) -> SoapResult<&str> {
        self.get(key).ok_or(SoapError::Parse)
    }

    /// Parses an output argument into `T`.
    pub fn parse<T: FromStr>(&self, key: &str) -> SoapResult<T> {
        self.require(key)?.trim().parse().map_err(|_| SoapError::Parse)
    }

    /// Number of output arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the action returned no output arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the response and returns the underlying map.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, String> {
        self.values
    }
}

impl From<HashMap<String, String>> for SoapResponse {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the SOAP 1.1 envelope for an action.
///
/// Must be a single line with no leading whitespace; Sonos rejects XML with
/// whitespace before the root element.
pub(crate) fn build_envelope(service: SonosService, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action,
        service.urn()
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!(r#"</u:{}></s:Body></s:Envelope>"#, action));
    body
}

/// Sends a SOAP request to a Sonos speaker and parses the action response.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `base_url` - Device base URL (e.g., "http://192.168.1.100:1400")
/// * `service` - The UPnP service exposing the action
/// * `action` - The SOAP action name (e.g., "Play", "GetVolume")
/// * `args` - Key-value pairs for action arguments (order is preserved)
///
/// # Errors
/// - [`SoapError::Http`] on network failure
/// - [`SoapError::Fault`] when the device answers with a well-formed SOAP fault
/// - [`SoapError::HttpStatus`] for any other non-2xx response (raw body kept)
/// - [`SoapError::Parse`] when a 2xx body lacks `{action}Response`
pub async fn invoke(
    client: &Client,
    base_url: &str,
    service: SonosService,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<SoapResponse> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), service.control_path());
    let body = build_envelope(service, action, args);

    log::info!("[SOAP] {} -> {} (body: {} bytes)", action, url, body.len());
    log::debug!("[SOAP] Request body: {}", body);

    let start = std::time::Instant::now();
    let res = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{}#{}\"", service.urn(), action))
        .body(body)
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .send()
        .await;

    log::debug!(
        "[SOAP] {} completed in {:?}: {:?}",
        action,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let response_text = res.text().await?;

    if !status.is_success() {
        if let Some((code, description)) = parse_fault(&response_text) {
            log::warn!("[SOAP] {} fault {}: {}", action, code, description);
            return Err(SoapError::Fault { code, description });
        }
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    parse_action_response(&response_text, action)
}

/// Extracts the output arguments of `{action}Response` from a SOAP body.
///
/// The namespace declaration on the response element is dropped; every child
/// element becomes one entry with its entity-decoded text.
pub(crate) fn parse_action_response(xml: &str, action: &str) -> SoapResult<SoapResponse> {
    let response_name = format!("{}Response", action);
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut in_body = false;
    let mut in_response = false;
    let mut values = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                if !in_body {
                    in_body = local.as_ref() == b"Body";
                } else if !in_response {
                    in_response = local.as_ref() == response_name.as_bytes();
                } else {
                    let key = String::from_utf8_lossy(local.as_ref()).into_owned();
                    let text = reader.read_text(e.name()).map_err(|_| SoapError::Parse)?;
                    let decoded = html_escape::decode_html_entities(&text).into_owned();
                    values.insert(key, decoded);
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                if in_response {
                    let key = String::from_utf8_lossy(local.as_ref()).into_owned();
                    values.insert(key, String::new());
                } else if in_body && local.as_ref() == response_name.as_bytes() {
                    return Ok(SoapResponse::default());
                }
            }
            Ok(Event::End(ref e)) if in_response => {
                if e.local_name().as_ref() == response_name.as_bytes() {
                    return Ok(SoapResponse { values });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("[SOAP] XML parse error in {} response: {}", action, e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Err(SoapError::Parse)
}

/// Parses a SOAP fault body into `(code, description)`.
///
/// Returns `None` unless the body is well-formed XML containing a `Fault`
/// element with a code. The UPnP `errorCode`/`errorDescription` detail wins
/// over the generic `faultcode`/`faultstring`.
pub(crate) fn parse_fault(xml: &str) -> Option<(String, String)> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut saw_fault = false;
    let mut fields: HashMap<&'static str, String> = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let key = match e.local_name().as_ref() {
                    b"Fault" => {
                        saw_fault = true;
                        None
                    }
                    b"faultcode" => Some("faultcode"),
                    b"faultstring" => Some("faultstring"),
                    b"errorCode" => Some("errorCode"),
                    b"errorDescription" => Some("errorDescription"),
                    _ => None,
                };
                if let Some(key) = key {
                    let text = reader.read_text(e.name()).ok()?;
                    fields.insert(key, html_escape::decode_html_entities(&text).trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    if !saw_fault {
        return None;
    }

    let code = fields
        .get("errorCode")
        .or_else(|| fields.get("faultcode"))
        .filter(|c| !c.is_empty())?
        .clone();
    let description = fields
        .get("errorDescription")
        .or_else(|| fields.get("faultstring"))
        .cloned()
        .unwrap_or_default();

    Some((code, description))
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests to Sonos speakers.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, "http://192.168.1.100:1400")
///     .service(SonosService::AVTransport)
///     .action("Play")
///     .instance_id()
///     .arg("Speed", "1")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    base_url: &'a str,
    service: Option<SonosService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder.
    ///
    /// # Arguments
    /// * `client` - The HTTP client to use for the request
    /// * `base_url` - Device base URL (scheme, host and port)
    #[must_use]
    pub fn new(client: &'a Client, base_url: &'a str) -> Self {
        Self {
            client,
            base_url,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the Sonos service for this request.
    #[must_use]
    pub fn service(mut self, service: SonosService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by most Sonos actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sends the SOAP request and returns the parsed output arguments.
    ///
    /// # Errors
    /// Returns `SoapError` if the service or action is not set, or if the
    /// request fails.
    pub async fn send(self) -> SoapResult<SoapResponse> {
        let service = self
            .service
            .ok_or(SoapError::InvalidRequest("service not set"))?;
        let action = self
            .action
            .ok_or(SoapError::InvalidRequest("action not set"))?;

        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        invoke(self.client, self.base_url, service, action, &args).await
    }

    /// Returns the request parts without sending (for testing).
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(SonosService, &'a str, Vec<(&'a str, String)>)> {
        let service = self.service?;
        let action = self.action?;
        Some((service, action, self.args))
    }
}
