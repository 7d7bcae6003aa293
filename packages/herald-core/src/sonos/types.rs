//! Domain types returned by the device facade.

use serde::Serialize;
use thiserror::Error;

use super::utils::{is_line_in, is_live_source};
use crate::protocol_constants::{RADIO_SHOWS_OBJECT_ID, RADIO_STATIONS_OBJECT_ID};

// ─────────────────────────────────────────────────────────────────────────────
// Transport State
// ─────────────────────────────────────────────────────────────────────────────

/// Playback status reported by AVTransport `GetTransportInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
    Transitioning,
    NoMedia,
}

impl TransportState {
    /// True when the device is producing (or about to produce) sound.
    ///
    /// A transitioning device counts as playing: it is mid-way to `PLAYING`
    /// after a Play or track change.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Transitioning)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Transitioning => write!(f, "transitioning"),
            Self::NoMedia => write!(f, "no_media"),
        }
    }
}

/// Error returned when parsing an unknown transport state string.
#[derive(Debug, Clone, Error)]
#[error("unknown transport state: {0}")]
pub struct ParseTransportStateError(pub String);

impl std::str::FromStr for TransportState {
    type Err = ParseTransportStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "TRANSITIONING" => Ok(Self::Transitioning),
            "NO_MEDIA_PRESENT" => Ok(Self::NoMedia),
            other => Err(ParseTransportStateError(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracks & Transport URIs
// ─────────────────────────────────────────────────────────────────────────────

/// Display metadata parsed from a DIDL-Lite item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
}

/// The track a device is currently positioned on (`GetPositionInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    /// Track URI. Empty when nothing is loaded.
    pub uri: String,
    /// 1-based position in the queue (0 for non-queue sources).
    pub queue_position: u32,
    /// Elapsed time in seconds.
    pub position: u32,
    /// Track length in seconds, when the device reports one.
    pub duration: Option<u32>,
    /// Parsed DIDL-Lite metadata, when present.
    pub metadata: Option<TrackMetadata>,
    /// Raw DIDL-Lite as reported by the device.
    #[serde(skip)]
    pub raw_metadata: String,
}

impl TrackInfo {
    /// True for continuous sources (radio, line-in, TV) with no queue semantics.
    #[must_use]
    pub fn is_live_source(&self) -> bool {
        is_live_source(&self.uri)
    }

    /// True for line-in or TV audio return.
    #[must_use]
    pub fn is_line_in(&self) -> bool {
        is_line_in(&self.uri)
    }

    /// True for a track addressable by queue position and seek time.
    #[must_use]
    pub fn is_queue_backed(&self) -> bool {
        !self.uri.is_empty() && !self.is_live_source()
    }
}

/// Current media summary (`GetMediaInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub nr_tracks: u32,
    pub current_uri: String,
    pub current_uri_metadata: String,
    pub play_medium: String,
}

/// Arguments for `SetAVTransportURI`.
///
/// Built from a raw URI (metadata generated on send) or explicitly with
/// metadata. Play is issued after the URI is set unless `only_set_uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportUri {
    pub uri: String,
    pub metadata: Option<String>,
    pub only_set_uri: bool,
}

impl TransportUri {
    /// A URI that starts playing once set.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            metadata: None,
            only_set_uri: false,
        }
    }

    /// Attaches explicit DIDL-Lite metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Sets the URI without issuing Play.
    #[must_use]
    pub fn only_set(mut self) -> Self {
        self.only_set_uri = true;
        self
    }
}

impl From<&str> for TransportUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for TransportUri {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

/// Result of `AddURIToQueue`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResult {
    pub first_track_number_enqueued: u32,
    pub num_tracks_added: u32,
    pub new_queue_length: u32,
}

/// Result of saved-queue (Sonos playlist) edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEditResult {
    pub num_tracks_added: u32,
    pub new_queue_length: u32,
    pub new_update_id: u32,
    /// Object ID of a newly created playlist (`SQ:{n}`).
    pub assigned_object_id: Option<String>,
}

/// Sonos play modes accepted by `SetPlayMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayMode {
    Normal,
    RepeatOne,
    RepeatAll,
    Shuffle,
    ShuffleNorepeat,
    ShuffleRepeatOne,
}

impl PlayMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::RepeatOne => "REPEAT_ONE",
            Self::RepeatAll => "REPEAT_ALL",
            Self::Shuffle => "SHUFFLE",
            Self::ShuffleNorepeat => "SHUFFLE_NOREPEAT",
            Self::ShuffleRepeatOne => "SHUFFLE_REPEAT_ONE",
        }
    }
}

/// Error returned when parsing an unknown play mode string.
#[derive(Debug, Clone, Error)]
#[error("invalid play mode: {0} (available: NORMAL, REPEAT_ONE, REPEAT_ALL, SHUFFLE, SHUFFLE_NOREPEAT, SHUFFLE_REPEAT_ONE)")]
pub struct ParsePlayModeError(pub String);

impl std::str::FromStr for PlayMode {
    type Err = ParsePlayModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "REPEAT_ONE" => Ok(Self::RepeatOne),
            "REPEAT_ALL" => Ok(Self::RepeatAll),
            "SHUFFLE" => Ok(Self::Shuffle),
            "SHUFFLE_NOREPEAT" => Ok(Self::ShuffleNorepeat),
            "SHUFFLE_REPEAT_ONE" => Ok(Self::ShuffleRepeatOne),
            _ => Err(ParsePlayModeError(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content Directory
// ─────────────────────────────────────────────────────────────────────────────

/// A DIDL-Lite item or container returned by `Browse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub uri: Option<String>,
    /// Protocol-specific metadata from `<r:resMD>` (favorites only).
    pub metadata: Option<String>,
}

/// A page of `Browse` results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseResult {
    pub returned: u32,
    pub total: u32,
    pub update_id: u32,
    pub items: Vec<MediaItem>,
}

impl BrowseResult {
    /// True when the page holds at least one item.
    #[must_use]
    pub fn has_items(&self) -> bool {
        self.returned > 0 && !self.items.is_empty()
    }
}

/// Paging for `Browse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowseOptions {
    pub start: u32,
    pub count: u32,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            start: 0,
            count: crate::protocol_constants::DEFAULT_BROWSE_COUNT,
        }
    }
}

/// Music library categories with their ContentDirectory object-ID prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Artists,
    AlbumArtists,
    Albums,
    Genres,
    Composers,
    Tracks,
    Playlists,
    SonosPlaylists,
    Share,
}

impl SearchType {
    /// ContentDirectory object-ID prefix for this category.
    #[must_use]
    pub fn object_id_prefix(&self) -> &'static str {
        match self {
            Self::Artists => "A:ARTIST",
            Self::AlbumArtists => "A:ALBUMARTIST",
            Self::Albums => "A:ALBUM",
            Self::Genres => "A:GENRE",
            Self::Composers => "A:COMPOSER",
            Self::Tracks => "A:TRACKS",
            Self::Playlists => "A:PLAYLISTS",
            Self::SonosPlaylists => "SQ",
            Self::Share => "S",
        }
    }

    /// Builds the object ID for a browse or search.
    ///
    /// The term is percent-encoded as a URI component, except for shares
    /// whose terms are already paths.
    #[must_use]
    pub fn object_id(&self, term: Option<&str>, separator: char) -> String {
        let mut id = format!("{}{}", self.object_id_prefix(), separator);
        match term {
            Some(term) if !term.is_empty() => {
                if *self == Self::Share {
                    id.push_str(term);
                } else {
                    id.push_str(&encode_component(term));
                }
            }
            _ => {}
        }
        id
    }
}

/// Percent-encodes a URI component, leaving `!'()*` literal as players
/// expect.
fn encode_component(term: &str) -> String {
    urlencoding::encode(term)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// Error returned when parsing an unknown search type.
#[derive(Debug, Clone, Error)]
#[error("unknown search type: {0}")]
pub struct ParseSearchTypeError(pub String);

impl std::str::FromStr for SearchType {
    type Err = ParseSearchTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artists" => Ok(Self::Artists),
            "albumArtists" | "album_artists" => Ok(Self::AlbumArtists),
            "albums" => Ok(Self::Albums),
            "genres" => Ok(Self::Genres),
            "composers" => Ok(Self::Composers),
            "tracks" => Ok(Self::Tracks),
            "playlists" => Ok(Self::Playlists),
            "sonos_playlists" => Ok(Self::SonosPlaylists),
            "share" => Ok(Self::Share),
            other => Err(ParseSearchTypeError(other.to_string())),
        }
    }
}

/// Favorite radio containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteRadioType {
    Stations,
    Shows,
}

impl FavoriteRadioType {
    #[must_use]
    pub fn object_id(&self) -> &'static str {
        match self {
            Self::Stations => RADIO_STATIONS_OBJECT_ID,
            Self::Shows => RADIO_SHOWS_OBJECT_ID,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device Properties
// ─────────────────────────────────────────────────────────────────────────────

/// Network identity from `GetZoneInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    pub mac_address: String,
    pub serial_number: String,
    pub software_version: String,
    pub ip_address: String,
}

/// Zone name and icon from `GetZoneAttributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAttributes {
    pub zone_name: String,
    pub icon: String,
}

/// Identity parsed from `/xml/device_description.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub room_name: String,
    pub display_name: String,
    pub udn: String,
    pub model_name: String,
    pub model_number: String,
    pub serial_num: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone Groups
// ─────────────────────────────────────────────────────────────────────────────

/// A speaker within a Sonos zone group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroupMember {
    /// Unique identifier in RINCON_xxxxx format.
    pub uuid: String,
    pub host: String,
    pub port: u16,
    /// User-configured room name.
    pub zone_name: String,
}

/// A Sonos zone group (speakers playing in sync).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroup {
    pub id: String,
    /// Coordinator's zone name, suffixed with ` + N` when grouped.
    pub name: String,
    pub coordinator_uuid: String,
    pub coordinator_host: String,
    pub coordinator_port: u16,
    pub members: Vec<ZoneGroupMember>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_state_from_vendor_strings() {
        assert_eq!("PLAYING".parse::<TransportState>().unwrap(), TransportState::Playing);
        assert_eq!(
            "PAUSED_PLAYBACK".parse::<TransportState>().unwrap(),
            TransportState::Paused
        );
        assert_eq!(
            "NO_MEDIA_PRESENT".parse::<TransportState>().unwrap(),
            TransportState::NoMedia
        );
        assert!("BUFFERING".parse::<TransportState>().is_err());
    }

    #[test]
    fn transitioning_counts_as_active() {
        assert!(TransportState::Playing.is_active());
        assert!(TransportState::Transitioning.is_active());
        assert!(!TransportState::Paused.is_active());
        assert!(!TransportState::Stopped.is_active());
    }

    #[test]
    fn sonos_playlist_object_id() {
        assert_eq!(SearchType::SonosPlaylists.object_id(Some("12"), ':'), "SQ:12");
        assert_eq!(SearchType::SonosPlaylists.object_id(None, ':'), "SQ:");
    }

    #[test]
    fn search_term_is_url_encoded_except_for_shares() {
        assert_eq!(
            SearchType::Artists.object_id(Some("Daft Punk"), ':'),
            "A:ARTIST:Daft%20Punk"
        );
        assert_eq!(
            SearchType::Share.object_id(Some("//nas/music"), ':'),
            "S://nas/music"
        );
        assert_eq!(SearchType::Albums.object_id(Some("x"), '/'), "A:ALBUM/x");
    }

    #[test]
    fn search_term_keeps_component_safe_marks() {
        assert_eq!(
            SearchType::Artists.object_id(Some("Guns N' Roses"), ':'),
            "A:ARTIST:Guns%20N'%20Roses"
        );
        assert_eq!(
            SearchType::Tracks.object_id(Some("Help! (Remastered) *"), ':'),
            "A:TRACKS:Help!%20(Remastered)%20*"
        );
        assert_eq!(
            SearchType::Albums.object_id(Some("AC/DC & Co"), ':'),
            "A:ALBUM:AC%2FDC%20%26%20Co"
        );
    }

    #[test]
    fn search_type_parses_both_spellings() {
        assert_eq!(
            "albumArtists".parse::<SearchType>().unwrap(),
            SearchType::AlbumArtists
        );
        assert_eq!(
            "sonos_playlists".parse::<SearchType>().unwrap(),
            SearchType::SonosPlaylists
        );
        assert!("podcasts".parse::<SearchType>().is_err());
    }

    #[test]
    fn play_mode_rejects_unknown() {
        assert_eq!("shuffle_norepeat".parse::<PlayMode>().unwrap(), PlayMode::ShuffleNorepeat);
        assert!("PARTY".parse::<PlayMode>().is_err());
    }

    #[test]
    fn track_classification() {
        let queued = TrackInfo {
            uri: "x-file-cifs://nas/a.mp3".into(),
            ..Default::default()
        };
        let radio = TrackInfo {
            uri: "x-sonosapi-stream:s1?sid=254".into(),
            ..Default::default()
        };
        assert!(queued.is_queue_backed());
        assert!(radio.is_live_source());
        assert!(!radio.is_queue_backed());
        assert!(!TrackInfo::default().is_queue_backed());
    }

    #[test]
    fn browse_result_emptiness() {
        let empty = BrowseResult::default();
        assert!(!empty.has_items());

        let one = BrowseResult {
            returned: 1,
            total: 1,
            update_id: 3,
            items: vec![MediaItem::default()],
        };
        assert!(one.has_items());
    }
}
