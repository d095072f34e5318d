//! Shared XML and URL helpers for the Sonos protocol layer.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

// ─────────────────────────────────────────────────────────────────────────────
// XML Parsing Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts text content from the first occurrence of an XML element.
///
/// Searches for an element by its local name (ignoring namespace prefixes)
/// and returns its decoded text content.
///
/// # Example
/// ```ignore
/// let xml = r#"<u:NewVolume>42</u:NewVolume>"#;
/// assert_eq!(extract_xml_text(xml, "NewVolume"), Some("42".to_string()));
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

/// Extracts `val` attributes from empty XML elements.
///
/// UPnP `LastChange` documents convey state as empty elements:
/// ```xml
/// <TransportState val="PLAYING"/>
/// ```
///
/// Returns a map from element name to its `val` attribute value. Only
/// elements that exist and carry a `val` attribute are included.
pub fn extract_empty_val_attrs(xml: &str, element_names: &[&str]) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                if let Some(&name) = element_names
                    .iter()
                    .find(|name| name.as_bytes() == local.as_ref())
                {
                    if let Some(val) = get_xml_attr(e, b"val") {
                        result.insert(name.to_string(), val);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    result
}

/// Gets an attribute value from an XML element.
///
/// # Arguments
/// * `elem` - The XML element to search
/// * `attr_name` - The attribute name as bytes (e.g., `b"ZoneName"`)
pub fn get_xml_attr(elem: &BytesStart, attr_name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == attr_name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters for embedding in SOAP arguments.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Reduces a UPnP Location URL to its `scheme://host[:port]` prefix.
///
/// # Example
/// ```ignore
/// let host = host_endpoint_from_location("http://192.168.1.10:1400/xml/device_description.xml");
/// assert_eq!(host, Some("http://192.168.1.10:1400".to_string()));
/// ```
pub fn host_endpoint_from_location(location: &str) -> Option<String> {
    let location = location.trim();
    let (scheme, rest) = location.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() || authority.starts_with(':') {
        return None;
    }

    Some(format!("{}://{}", scheme.to_ascii_lowercase(), authority))
}
