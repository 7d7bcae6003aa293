//! DIDL-Lite metadata generation and parsing.
//!
//! Sonos needs DIDL-Lite alongside most transport URIs to know which music
//! service owns the content. [`generate_metadata`] maps a URI scheme to the
//! URI and metadata the player expects; the parse functions read the DIDL
//! returned by `GetPositionInfo` and `Browse`.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::types::{MediaItem, TrackMetadata, TransportUri};
use super::utils::{escape_xml, get_xml_attr};

const DIDL_OPEN: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#;

/// Service descriptor for TuneIn radio.
const TUNEIN_DESCRIPTOR: &str = "SA_RINCON65031_";

/// Default Spotify region (Europe).
pub const DEFAULT_SPOTIFY_REGION: &str = "2311";

// ─────────────────────────────────────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────────────────────────────────────

fn service_item(id: &str, title: &str, class: &str, descriptor: &str) -> String {
    format!(
        r#"{DIDL_OPEN}<item id="{}" restricted="true"><dc:title>{}</dc:title><upnp:class>{}</upnp:class><desc id="cdudn" nameSpace="urn:schemas-rinconnetworks-com:metadata-1-0/">{}</desc></item></DIDL-Lite>"#,
        escape_xml(id),
        escape_xml(title),
        class,
        descriptor
    )
}

/// Minimal item for files and plain streams the player can fetch itself.
fn local_item(uri: &str, title: &str) -> String {
    let title = if title.is_empty() {
        uri.rsplit('/').next().unwrap_or(uri)
    } else {
        title
    };
    format!(
        r#"{DIDL_OPEN}<item id="-1" parentID="-1" restricted="true"><res protocolInfo="http-get:*:audio/mpeg:*">{}</res><dc:title>{}</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class></item></DIDL-Lite>"#,
        escape_xml(uri),
        escape_xml(title)
    )
}

/// Maps a URI to the transport URI and DIDL-Lite metadata Sonos expects.
///
/// Handles:
/// - `radio:{id}` → TuneIn `x-sonosapi-stream:{id}` with broadcast metadata
/// - `x-sonosapi-stream:{id}` → unchanged URI with broadcast metadata
/// - `spotify:track|album|artistTopTracks|playlist|user|artistRadio:...`
/// - anything else (`x-file-cifs:`, `http(s)://`, `x-rincon-*`) → unchanged
///   URI with a minimal music-track item
#[must_use]
pub fn generate_metadata(uri: &str, title: &str, spotify_region: &str) -> TransportUri {
    let parts: Vec<&str> = uri.split(':').collect();

    match parts.as_slice() {
        ["radio", station] => {
            let title = if title.is_empty() { "TuneIn Radio" } else { title };
            TransportUri::new(format!("x-sonosapi-stream:{}?sid=254&flags=8224&sn=0", station))
                .with_metadata(service_item(
                    &format!("F00092020{}", station),
                    title,
                    "object.item.audioItem.audioBroadcast",
                    TUNEIN_DESCRIPTOR,
                ))
        }
        ["x-sonosapi-stream", rest] => {
            let station = rest.split('?').next().unwrap_or(rest);
            let title = if title.is_empty() { "TuneIn Radio" } else { title };
            TransportUri::new(uri).with_metadata(service_item(
                &format!("F00092020{}", station),
                title,
                "object.item.audioItem.audioBroadcast",
                TUNEIN_DESCRIPTOR,
            ))
        }
        ["spotify", kind, ..] if parts.len() >= 3 => {
            spotify_metadata(uri, kind, title, spotify_region)
        }
        _ => TransportUri::new(uri).with_metadata(local_item(uri, title)),
    }
}

fn spotify_metadata(uri: &str, kind: &str, title: &str, region: &str) -> TransportUri {
    let encoded = urlencoding::encode(uri).into_owned();
    let descriptor = format!("SA_RINCON{}_X_#Svc{}-0-Token", region, region);

    let (transport, id, class) = match kind {
        "track" => (
            format!("x-sonos-spotify:{}?sid=9&flags=8224&sn=7", encoded),
            format!("00032020{}", encoded),
            "object.item.audioItem.musicTrack",
        ),
        "album" => (
            format!("x-rincon-cpcontainer:0004206c{}", encoded),
            format!("0004206c{}", encoded),
            "object.container.album.musicAlbum",
        ),
        "artistTopTracks" => (
            format!("x-rincon-cpcontainer:000e206c{}", encoded),
            format!("000e206c{}", encoded),
            "object.container.playlistContainer",
        ),
        "artistRadio" => (
            format!("x-sonosapi-radio:{}?sid=12&flags=8300&sn=5", encoded),
            format!("100c206c{}", encoded),
            "object.item.audioItem.audioBroadcast.#artistRadio",
        ),
        "playlist" | "user" => (
            format!("x-rincon-cpcontainer:1006206c{}", encoded),
            format!("1006206c{}", encoded),
            "object.container.playlistContainer",
        ),
        _ => return TransportUri::new(uri).with_metadata(local_item(uri, title)),
    };

    let title = if title.is_empty() { "Spotify" } else { title };
    TransportUri::new(transport).with_metadata(service_item(&id, title, class, &descriptor))
}

/// Normalizes bare Spotify playlist URIs to the `spotify:user:` form Sonos accepts.
#[must_use]
pub fn normalize_spotify_playlist(uri: &str) -> String {
    if uri.contains("spotify:playlist:") && !uri.contains("spotify:user:spotify:playlist:") {
        format!("spotify:user:{}", uri)
    } else {
        uri.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parses every `<item>`/`<container>` in a DIDL-Lite document.
pub fn parse_didl_items(xml: &str) -> Vec<MediaItem> {
    let mut items = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut current: Option<MediaItem> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"item" | b"container" => {
                    current = Some(MediaItem {
                        id: get_xml_attr(e, b"id").unwrap_or_default(),
                        parent_id: get_xml_attr(e, b"parentID").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                name => {
                    if let Some(item) = current.as_mut() {
                        if let Ok(raw) = reader.read_text(e.name()) {
                            let text = html_escape::decode_html_entities(&raw).into_owned();
                            match name {
                                b"title" => item.title = text,
                                b"creator" => item.artist = Some(text),
                                b"album" => item.album = Some(text),
                                b"albumArtURI" => item.album_art_uri = Some(text),
                                b"res" => item.uri = Some(text),
                                b"resMD" => item.metadata = Some(text),
                                _ => {}
                            }
                        }
                    }
                }
            },
            Ok(Event::End(ref e))
                if matches!(e.local_name().as_ref(), b"item" | b"container") =>
            {
                if let Some(item) = current.take() {
                    items.push(item);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("[DIDL] XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    items
}

/// Parses the display metadata of the first DIDL-Lite item.
///
/// Returns `None` for empty metadata or `NOT_IMPLEMENTED`.
pub fn parse_track_metadata(xml: &str) -> Option<TrackMetadata> {
    if xml.trim().is_empty() || xml == "NOT_IMPLEMENTED" {
        return None;
    }
    let item = parse_didl_items(xml).into_iter().next()?;
    Some(TrackMetadata {
        title: Some(item.title).filter(|t| !t.is_empty()),
        artist: item.artist,
        album: item.album,
        album_art_uri: item.album_art_uri,
    })
}
