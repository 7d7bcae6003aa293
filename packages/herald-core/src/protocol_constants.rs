//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the UPnP AV specifications and Sonos firmware
//! conventions. Changing them would break interoperability with real devices.

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for SOAP HTTP requests (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const SOAP_TIMEOUT_SECS: u64 = 10;

/// Default Sonos speaker control port.
pub const SONOS_PORT: u16 = 1400;

/// Path of the device description document served by every player.
pub const DEVICE_DESCRIPTION_PATH: &str = "/xml/device_description.xml";

/// Default rendering channel for volume and mute actions.
pub const MASTER_CHANNEL: &str = "Master";

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP eventing)
// ─────────────────────────────────────────────────────────────────────────────

/// GENA subscription timeout requested from speaker (seconds).
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 3600;

// ─────────────────────────────────────────────────────────────────────────────
// ContentDirectory object IDs
// ─────────────────────────────────────────────────────────────────────────────

/// The player's current queue.
pub const QUEUE_OBJECT_ID: &str = "Q:0";

/// Sonos favorites container.
pub const FAVORITES_OBJECT_ID: &str = "FV:2";

/// Favorite radio stations container.
pub const RADIO_STATIONS_OBJECT_ID: &str = "R:0/0";

/// Favorite radio shows container.
pub const RADIO_SHOWS_OBJECT_ID: &str = "R:0/1";

/// Page size used when browsing the queue.
pub const QUEUE_BROWSE_COUNT: u32 = 1000;

/// Default page size for library and favorites browsing.
pub const DEFAULT_BROWSE_COUNT: u32 = 100;

/// `AddAtIndex` value meaning "append to the end of the saved queue".
pub const APPEND_AT_END: u32 = u32::MAX;

// ─────────────────────────────────────────────────────────────────────────────
// Transport URI schemes
// ─────────────────────────────────────────────────────────────────────────────

/// URI fragments identifying continuous sources with no queue semantics.
///
/// Matched anywhere in the URI, since radio URIs are sometimes wrapped
/// (e.g. `aac://...x-sonosapi-stream:...`).
pub const LIVE_SOURCE_MARKERS: [&str; 5] = [
    "x-sonosapi-stream:",
    "x-rincon-stream:",
    "x-sonos-htastream:",
    "x-rincon-mp3radio:",
    "mp3radio:",
];

/// URI fragments identifying line-in or TV audio return.
pub const LINE_IN_MARKERS: [&str; 2] = ["x-rincon-stream:", "x-sonos-htastream:"];

/// Scheme of a home-theater bar's TV input (`x-sonos-htastream:RINCON_...:spdif`).
pub const HTASTREAM_SCHEME: &str = "x-sonos-htastream:";

/// Suffix selecting the optical (S/PDIF) TV input.
pub const SPDIF_SUFFIX: &str = ":spdif";

/// Scheme for files served from an SMB/CIFS share.
pub const CIFS_SCHEME: &str = "x-file-cifs:";

/// Display name reported by home-theater bars that absorb a room's renderers.
pub const HOME_THEATER_BAR: &str = "Playbar";
