//! Trait abstractions for Sonos operations.
//!
//! One small trait per UPnP service, each exposing only the actions Herald
//! uses. Services depend on [`SonosDevice`] rather than the concrete
//! [`SonosDeviceImpl`](super::client::SonosDeviceImpl) so tests can drive
//! them with fake devices.

use async_trait::async_trait;

use crate::error::{GenaResult, SoapResult};
use crate::protocol_constants::{
    FAVORITES_OBJECT_ID, MASTER_CHANNEL, QUEUE_BROWSE_COUNT, QUEUE_OBJECT_ID,
};
use crate::sonos::services::SonosService;
use crate::sonos::subscription::SubscribeResponse;
use crate::sonos::types::{
    BrowseOptions, BrowseResult, DeviceDescription, EnqueueResult, FavoriteRadioType, MediaInfo,
    PlayMode, PlaylistEditResult, SearchType, TrackInfo, TransportState, TransportUri,
    ZoneAttributes, ZoneGroup, ZoneInfo,
};

/// Network identity of a device.
pub trait DeviceEndpoint: Send + Sync {
    /// Host name or IP address of the device.
    fn host(&self) -> &str;

    /// HTTP port of the device (1400 for Sonos).
    fn port(&self) -> u16;
}

/// AVTransport service: transport state, current source and queue.
#[async_trait]
pub trait AvTransport: Send + Sync {
    /// Reads the transport state (GetTransportInfo).
    async fn get_current_state(&self) -> SoapResult<TransportState>;

    /// Reads the current track, position and parsed metadata (GetPositionInfo).
    async fn current_track(&self) -> SoapResult<TrackInfo>;

    /// Reads the current source of the transport (GetMediaInfo).
    async fn get_media_info(&self) -> SoapResult<MediaInfo>;

    /// Sets the transport URI, generating DIDL-Lite metadata when absent.
    ///
    /// Issues Play afterwards unless `target.only_set_uri` is set.
    async fn set_av_transport_uri(&self, target: TransportUri) -> SoapResult<()>;

    async fn play(&self) -> SoapResult<()>;

    async fn pause(&self) -> SoapResult<()>;

    async fn stop(&self) -> SoapResult<()>;

    async fn next(&self) -> SoapResult<()>;

    async fn previous(&self) -> SoapResult<()>;

    /// Seeks within the current track to `seconds` (REL_TIME).
    async fn seek(&self, seconds: u32) -> SoapResult<()>;

    /// Selects a queue entry by 1-based index (TRACK_NR).
    async fn select_track(&self, track: u32) -> SoapResult<()>;

    /// Removes every track from the queue.
    async fn flush(&self) -> SoapResult<()>;

    /// Adds a URI to the queue.
    ///
    /// `position` is the desired 1-based index; `0` appends at the end.
    async fn add_uri_to_queue(&self, uri: &str, position: u32) -> SoapResult<EnqueueResult>;

    /// Switches the transport source back to this device's queue.
    async fn select_queue(&self) -> SoapResult<()>;

    /// Enqueues `uri` right after the current track and starts playing it.
    async fn play_uri(&self, uri: &str) -> SoapResult<()>;

    async fn get_play_mode(&self) -> SoapResult<PlayMode>;

    async fn set_play_mode(&self, mode: PlayMode) -> SoapResult<()>;

    /// Creates an empty Sonos playlist and returns its assigned object ID.
    async fn create_playlist(&self, title: &str) -> SoapResult<PlaylistEditResult>;

    /// Appends `uri` to the Sonos playlist `playlist_id` (the part after `SQ:`).
    async fn add_to_playlist(&self, playlist_id: &str, uri: &str)
        -> SoapResult<PlaylistEditResult>;

    /// Leaves the current group and becomes a standalone coordinator.
    async fn leave_group(&self) -> SoapResult<()>;
}

/// RenderingControl service: per-speaker volume and mute.
///
/// Every action takes a channel. The provided methods address `Master`.
#[async_trait]
pub trait RenderingControl: Send + Sync {
    async fn get_channel_volume(&self, channel: &str) -> SoapResult<u8>;

    /// Sets the volume of `channel`; values above 100 are clamped.
    async fn set_channel_volume(&self, channel: &str, volume: u8) -> SoapResult<()>;

    async fn get_channel_mute(&self, channel: &str) -> SoapResult<bool>;

    async fn set_channel_mute(&self, channel: &str, muted: bool) -> SoapResult<()>;

    /// Shifts the volume of `channel` by `delta` and returns the new volume.
    async fn adjust_channel_volume(&self, channel: &str, delta: i32) -> SoapResult<u8>;

    async fn get_volume(&self) -> SoapResult<u8> {
        self.get_channel_volume(MASTER_CHANNEL).await
    }

    async fn set_volume(&self, volume: u8) -> SoapResult<()> {
        self.set_channel_volume(MASTER_CHANNEL, volume).await
    }

    async fn get_muted(&self) -> SoapResult<bool> {
        self.get_channel_mute(MASTER_CHANNEL).await
    }

    async fn set_muted(&self, muted: bool) -> SoapResult<()> {
        self.set_channel_mute(MASTER_CHANNEL, muted).await
    }

    async fn adjust_volume(&self, delta: i32) -> SoapResult<u8> {
        self.adjust_channel_volume(MASTER_CHANNEL, delta).await
    }
}

/// ContentDirectory service: queue, favorites, library and playlists.
#[async_trait]
pub trait ContentDirectory: Send + Sync {
    /// Browses the direct children of `object_id`.
    async fn browse(&self, object_id: &str, options: BrowseOptions) -> SoapResult<BrowseResult>;

    /// Deletes a Sonos playlist (DestroyObject `SQ:{id}`).
    async fn delete_playlist(&self, playlist_id: &str) -> SoapResult<()>;

    async fn get_queue(&self) -> SoapResult<BrowseResult> {
        self.browse(
            QUEUE_OBJECT_ID,
            BrowseOptions {
                start: 0,
                count: QUEUE_BROWSE_COUNT,
            },
        )
        .await
    }

    async fn get_favorites(&self) -> SoapResult<BrowseResult> {
        self.browse(FAVORITES_OBJECT_ID, BrowseOptions::default()).await
    }

    async fn get_favorite_radio(&self, kind: FavoriteRadioType) -> SoapResult<BrowseResult> {
        self.browse(kind.object_id(), BrowseOptions::default()).await
    }

    async fn get_music_library(
        &self,
        kind: SearchType,
        options: BrowseOptions,
    ) -> SoapResult<BrowseResult> {
        self.browse(&kind.object_id(None, ':'), options).await
    }

    async fn search_music_library(
        &self,
        kind: SearchType,
        term: &str,
        options: BrowseOptions,
    ) -> SoapResult<BrowseResult> {
        self.browse(&kind.object_id(Some(term), ':'), options).await
    }

    /// Browses the tracks of the Sonos playlist `playlist_id`.
    async fn get_playlist(&self, playlist_id: &str) -> SoapResult<BrowseResult> {
        self.browse(
            &SearchType::SonosPlaylists.object_id(Some(playlist_id), ':'),
            BrowseOptions::default(),
        )
        .await
    }
}

/// DeviceProperties service plus the device description document.
#[async_trait]
pub trait DeviceProperties: Send + Sync {
    async fn get_zone_info(&self) -> SoapResult<ZoneInfo>;

    async fn get_zone_attrs(&self) -> SoapResult<ZoneAttributes>;

    /// Fetches and parses `/xml/device_description.xml`.
    async fn device_description(&self) -> SoapResult<DeviceDescription>;
}

/// ZoneGroupTopology service.
#[async_trait]
pub trait ZoneGroupTopology: Send + Sync {
    async fn get_all_groups(&self) -> SoapResult<Vec<ZoneGroup>>;
}

/// GENA event subscriptions.
#[async_trait]
pub trait EventSubscription: Send + Sync {
    /// Subscribes `callback_url` to NOTIFY events of `service`.
    async fn subscribe(
        &self,
        service: SonosService,
        callback_url: &str,
    ) -> GenaResult<SubscribeResponse>;

    /// Cancels a subscription. Returns `false` if the device rejected it.
    async fn unsubscribe(&self, service: SonosService, sid: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Trait (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for everything a registered device can do.
///
/// Used by the device registry to hold `Arc<dyn SonosDevice>`.
pub trait SonosDevice:
    DeviceEndpoint
    + AvTransport
    + RenderingControl
    + ContentDirectory
    + DeviceProperties
    + ZoneGroupTopology
    + EventSubscription
{
}

/// Blanket implementation for any type implementing all service traits.
impl<T> SonosDevice for T where
    T: DeviceEndpoint
        + AvTransport
        + RenderingControl
        + ContentDirectory
        + DeviceProperties
        + ZoneGroupTopology
        + EventSubscription
{
}
