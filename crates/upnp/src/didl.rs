/// DIDL-Lite metadata for SetAVTransportURI
///
/// Many TVs refuse SetAVTransportURI without CurrentURIMetaData, so a minimal
/// single-item document is always sent.
use crate::xml::escape_xml;

/// `protocolInfo` announced for every stream, whatever its real type
pub const VIDEO_PROTOCOL_INFO: &str =
    "http-get:*:video/mp4:DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS=01700000000000000000000000000000";

pub const VIDEO_ITEM_CLASS: &str = "object.item.videoItem";

/// Build a DIDL-Lite document describing one video item
///
/// Title and URL are escaped; the returned document is plain XML.
pub fn build_didl_lite(media_url: &str, title: &str) -> String {
    let mut didl = String::new();

    didl.push_str(r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" "#);
    didl.push_str(r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#);
    didl.push_str(r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" "#);
    didl.push_str(r#"xmlns:dlna="urn:schemas-dlna-org:metadata-1-0/">"#);

    didl.push_str(r#"<item id="1" parentID="0" restricted="1">"#);
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(title)));
    didl.push_str(&format!("<upnp:class>{}</upnp:class>", VIDEO_ITEM_CLASS));
    didl.push_str(&format!(
        r#"<res protocolInfo="{}">{}</res>"#,
        VIDEO_PROTOCOL_INFO,
        escape_xml(media_url)
    ));
    didl.push_str("</item>");
    didl.push_str("</DIDL-Lite>");

    didl
}

/// DIDL-Lite document escaped for embedding as text in `CurrentURIMetaData`
pub fn didl_metadata(media_url: &str, title: &str) -> String {
    escape_xml(&build_didl_lite(media_url, title))
}
