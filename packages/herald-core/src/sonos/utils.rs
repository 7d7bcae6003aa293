//! Shared helpers for XML handling, time formatting, and URI classification.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::protocol_constants::{LINE_IN_MARKERS, LIVE_SOURCE_MARKERS};

// ─────────────────────────────────────────────────────────────────────────────
// XML Parsing Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts text content from the first occurrence of an XML element.
///
/// Searches by local name (ignoring namespace prefixes) and returns the
/// entity-decoded text.
///
/// # Example
/// ```ignore
/// let xml = r#"<u:CurrentVolume>42</u:CurrentVolume>"#;
/// assert_eq!(extract_xml_text(xml, "CurrentVolume"), Some("42".to_string()));
/// ```
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target_bytes = element_name.as_bytes();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target_bytes => {
                if let Ok(text) = reader.read_text(e.name()) {
                    let decoded = html_escape::decode_html_entities(&text);
                    return Some(decoded.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

/// Gets an attribute value from an XML element, entity-decoded.
pub fn get_xml_attr(elem: &BytesStart, attr_name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == attr_name)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            html_escape::decode_html_entities(&raw).into_owned()
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters for embedding in XML content.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ─────────────────────────────────────────────────────────────────────────────
// URLs
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the base URL of a device's HTTP endpoint.
#[must_use]
pub fn build_base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Extracts host and port from a UPnP Location URL.
///
/// `"http://192.168.1.100:1400/xml/device_description.xml"` yields
/// `("192.168.1.100", 1400)`.
pub fn extract_host_port(location: &str) -> Option<(String, u16)> {
    let stripped = location.strip_prefix("http://")?;
    let authority = stripped.split('/').next()?;
    let (host, port) = authority.split_once(':')?;
    Some((host.to_string(), port.parse().ok()?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Time Formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Formats seconds as the zero-padded `HH:MM:SS` used by `Seek` REL_TIME.
#[must_use]
pub fn format_hms(seconds: u32) -> String {
    let hh = seconds / 3600;
    let mm = (seconds % 3600) / 60;
    let ss = seconds % 60;
    format!("{:02}:{:02}:{:02}", hh, mm, ss)
}

/// Parses a `H:MM:SS` duration string into whole seconds.
///
/// Fractional seconds (`0:01:02.500`) are truncated. Returns `None` for
/// `NOT_IMPLEMENTED` and other non-time values.
#[must_use]
pub fn parse_hms(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let h: u32 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next()?.parse().ok()?;
    let s_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let s: u32 = s_part.split('.').next()?.parse().ok()?;
    Some(h * 3600 + m * 60 + s)
}

// ─────────────────────────────────────────────────────────────────────────────
// URI Classification
// ─────────────────────────────────────────────────────────────────────────────

/// True for continuous sources (radio, line-in, TV) that have no queue position.
#[must_use]
pub fn is_live_source(uri: &str) -> bool {
    LIVE_SOURCE_MARKERS.iter().any(|m| uri.contains(m))
}

/// True for line-in and TV audio return sources.
#[must_use]
pub fn is_line_in(uri: &str) -> bool {
    LINE_IN_MARKERS.iter().any(|m| uri.contains(m))
}
