//! Sonos speaker control over UPnP/SOAP.
//!
//! # Module Structure
//!
//! - `soap` - Low-level SOAP protocol implementation
//! - `services` - UPnP service definitions (URNs, paths)
//! - `traits` - One trait per UPnP service plus the combined [`SonosDevice`]
//! - `client` - `SonosDeviceImpl` concrete trait implementation
//! - `types` - Domain types returned by the facade
//! - `didl` - DIDL-Lite metadata generation and parsing
//! - `playback` - AVTransport actions
//! - `volume` - RenderingControl volume/mute actions
//! - `content` - ContentDirectory browse and playlist removal
//! - `device_properties` - Zone info and the device description document
//! - `zone_groups` - Zone group topology parsing and retrieval
//! - `subscription` - GENA SUBSCRIBE/UNSUBSCRIBE
//! - `discovery` - Consumption of a discovered-device feed
//! - `utils` - Shared utility functions

pub mod client;
pub mod content;
pub mod device_properties;
pub mod didl;
pub mod discovery;
pub mod playback;
pub(crate) mod retry;
pub mod services;
pub mod soap;
pub mod subscription;
pub mod traits;
pub mod types;
pub mod utils;
pub mod volume;
pub mod zone_groups;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export domain types
pub use services::SonosService;
pub use types::{TrackInfo, TransportState, TransportUri};

// Re-export trait abstractions
pub use traits::{
    AvTransport, ContentDirectory, DeviceEndpoint, DeviceProperties, EventSubscription,
    RenderingControl, SonosDevice, ZoneGroupTopology,
};

// Re-export concrete implementation
pub use client::SonosDeviceImpl;
pub use discovery::DeviceDescriptor;
