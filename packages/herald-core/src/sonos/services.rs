//! Sonos UPnP service definitions.
//!
//! Single source of truth for service URNs, control paths, and event paths
//! used by SOAP commands and GENA subscriptions.

use serde::Serialize;

/// Sonos UPnP services used by the device facade.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SonosService {
    /// Audio/Video transport control (play, pause, seek, queue).
    AVTransport,
    /// Per-speaker volume and mute control.
    RenderingControl,
    /// Queue, favorites, and music library browsing.
    ContentDirectory,
    /// Zone identity (MAC address, zone name).
    DeviceProperties,
    /// Zone group topology and membership information.
    ZoneGroupTopology,
}

impl SonosService {
    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
            Self::DeviceProperties => "urn:schemas-upnp-org:service:DeviceProperties:1",
            Self::ZoneGroupTopology => "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
        }
    }

    /// Returns the UPnP control endpoint path for SOAP requests.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Control",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Control",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Control",
            Self::DeviceProperties => "/DeviceProperties/Control",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Control",
        }
    }

    /// Returns the UPnP event endpoint path for GENA subscriptions.
    #[must_use]
    pub fn event_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Event",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Event",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Event",
            Self::DeviceProperties => "/DeviceProperties/Event",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Event",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::ContentDirectory => "ContentDirectory",
            Self::DeviceProperties => "DeviceProperties",
            Self::ZoneGroupTopology => "ZoneGroupTopology",
        }
    }
}
