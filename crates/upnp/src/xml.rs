//! Tag-scoped string extraction over raw XML
//!
//! UPnP descriptions and SOAP responses are small and flat enough that the
//! fields we need can be pulled out by substring search. Nested or
//! namespace-prefixed duplicates of a tag are not told apart: the first
//! `<tag>` wins.

use quick_xml::escape::{escape, unescape};

/// Text between the first `<tag>` and the next `</tag>`, trimmed
pub fn extract_xml_tag(xml: &str, tag: &str) -> Option<String> {
    extract_xml_tag_from(xml, tag, 0).map(|(value, _)| value)
}

/// Like [`extract_xml_tag`], searching from byte offset `from`
///
/// Also returns the offset just past the closing tag.
pub fn extract_xml_tag_from(xml: &str, tag: &str, from: usize) -> Option<(String, usize)> {
    let start_tag = format!("<{}>", tag);
    let end_tag = format!("</{}>", tag);

    let haystack = xml.get(from..)?;
    let start = from + haystack.find(&start_tag)? + start_tag.len();
    let end = start + xml[start..].find(&end_tag)?;

    Some((xml[start..end].trim().to_string(), end + end_tag.len()))
}

/// Escape the five XML special characters
pub fn escape_xml(s: &str) -> String {
    escape(s).into_owned()
}

/// Decode XML entities, returning the input unchanged if it holds a malformed one
pub fn unescape_xml(s: &str) -> String {
    match unescape(s) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => s.to_string(),
    }
}
