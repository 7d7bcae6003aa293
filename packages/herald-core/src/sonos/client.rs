//! Concrete Sonos device facade.
//!
//! [`SonosDeviceImpl`] binds one device's address to a shared HTTP client
//! and implements every service trait by delegating to the per-service
//! command modules.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{GenaResult, SoapResult};
use crate::sonos::didl::{generate_metadata, normalize_spotify_playlist, DEFAULT_SPOTIFY_REGION};
use crate::sonos::services::SonosService;
use crate::sonos::subscription::{self, SubscribeResponse};
use crate::sonos::traits::{
    AvTransport, ContentDirectory, DeviceEndpoint, DeviceProperties, EventSubscription,
    RenderingControl, ZoneGroupTopology,
};
use crate::sonos::types::{
    BrowseOptions, BrowseResult, DeviceDescription, EnqueueResult, MediaInfo, PlayMode,
    PlaylistEditResult, SearchType, TrackInfo, TransportState, TransportUri, ZoneAttributes,
    ZoneGroup, ZoneInfo,
};
use crate::sonos::utils::build_base_url;
use crate::sonos::{content, device_properties, playback, volume, zone_groups};

/// A single Sonos player reachable at `host:port`.
///
/// Cheap to clone; the underlying `reqwest::Client` shares its pool.
#[derive(Clone)]
pub struct SonosDeviceImpl {
    client: Client,
    host: String,
    port: u16,
    base_url: String,
    spotify_region: String,
}

impl SonosDeviceImpl {
    /// Creates a facade for the device at `host:port`.
    #[must_use]
    pub fn new(client: Client, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            base_url: build_base_url(&host, port),
            client,
            host,
            port,
            spotify_region: DEFAULT_SPOTIFY_REGION.to_string(),
        }
    }

    /// Creates a facade for a device at an explicit base URL.
    ///
    /// Used when the device sits behind a proxy or in tests against a local
    /// HTTP server.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let (host, port) = crate::sonos::utils::extract_host_port(&base_url)
            .unwrap_or_else(|| (base_url.clone(), crate::protocol_constants::SONOS_PORT));
        Self {
            client,
            host,
            port,
            base_url,
            spotify_region: DEFAULT_SPOTIFY_REGION.to_string(),
        }
    }

    /// Overrides the Spotify region used when generating metadata.
    #[must_use]
    pub fn with_spotify_region(mut self, region: impl Into<String>) -> Self {
        self.spotify_region = region.into();
        self
    }

    /// Base URL of the device's HTTP endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn metadata_for(&self, uri: &str) -> TransportUri {
        generate_metadata(&normalize_spotify_playlist(uri), "", &self.spotify_region)
    }
}

impl std::fmt::Debug for SonosDeviceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonosDeviceImpl")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DeviceEndpoint for SonosDeviceImpl {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl AvTransport for SonosDeviceImpl {
    async fn get_current_state(&self) -> SoapResult<TransportState> {
        playback::get_transport_state(&self.client, &self.base_url).await
    }

    async fn current_track(&self) -> SoapResult<TrackInfo> {
        playback::get_position_info(&self.client, &self.base_url).await
    }

    async fn get_media_info(&self) -> SoapResult<MediaInfo> {
        playback::get_media_info(&self.client, &self.base_url).await
    }

    async fn set_av_transport_uri(&self, target: TransportUri) -> SoapResult<()> {
        playback::set_av_transport_uri(&self.client, &self.base_url, &target, &self.spotify_region)
            .await
    }

    async fn play(&self) -> SoapResult<()> {
        playback::play(&self.client, &self.base_url).await
    }

    async fn pause(&self) -> SoapResult<()> {
        playback::pause(&self.client, &self.base_url).await
    }

    async fn stop(&self) -> SoapResult<()> {
        playback::stop(&self.client, &self.base_url).await
    }

    async fn next(&self) -> SoapResult<()> {
        playback::next(&self.client, &self.base_url).await
    }

    async fn previous(&self) -> SoapResult<()> {
        playback::previous(&self.client, &self.base_url).await
    }

    async fn seek(&self, seconds: u32) -> SoapResult<()> {
        playback::seek(&self.client, &self.base_url, seconds).await
    }

    async fn select_track(&self, track: u32) -> SoapResult<()> {
        playback::select_track(&self.client, &self.base_url, track).await
    }

    async fn flush(&self) -> SoapResult<()> {
        playback::flush(&self.client, &self.base_url).await
    }

    async fn add_uri_to_queue(&self, uri: &str, position: u32) -> SoapResult<EnqueueResult> {
        let target = self.metadata_for(uri);
        playback::add_uri_to_queue(&self.client, &self.base_url, &target, position, false).await
    }

    async fn select_queue(&self) -> SoapResult<()> {
        let zone = device_properties::get_zone_info(&self.client, &self.base_url).await?;
        let queue = TransportUri::new(playback::queue_uri(&zone.mac_address, self.port))
            .with_metadata("");
        playback::set_av_transport_uri(&self.client, &self.base_url, &queue, &self.spotify_region)
            .await
    }

    async fn play_uri(&self, uri: &str) -> SoapResult<()> {
        let target = self.metadata_for(uri);
        let enqueued = playback::add_uri_to_queue(
            &self.client,
            &self.base_url,
            &target,
            0,
            true,
        )
        .await?;

        let zone = device_properties::get_zone_info(&self.client, &self.base_url).await?;
        let queue = TransportUri::new(playback::queue_uri(&zone.mac_address, self.port))
            .with_metadata("")
            .only_set();
        playback::set_av_transport_uri(&self.client, &self.base_url, &queue, &self.spotify_region)
            .await?;

        playback::select_track(
            &self.client,
            &self.base_url,
            enqueued.first_track_number_enqueued,
        )
        .await?;
        playback::play(&self.client, &self.base_url).await
    }

    async fn get_play_mode(&self) -> SoapResult<PlayMode> {
        playback::get_play_mode(&self.client, &self.base_url).await
    }

    async fn set_play_mode(&self, mode: PlayMode) -> SoapResult<()> {
        playback::set_play_mode(&self.client, &self.base_url, mode).await
    }

    async fn create_playlist(&self, title: &str) -> SoapResult<PlaylistEditResult> {
        playback::create_saved_queue(&self.client, &self.base_url, title).await
    }

    async fn add_to_playlist(
        &self,
        playlist_id: &str,
        uri: &str,
    ) -> SoapResult<PlaylistEditResult> {
        let playlist = self.get_playlist(playlist_id).await?;
        let object_id = SearchType::SonosPlaylists.object_id(Some(playlist_id), ':');
        let target = self.metadata_for(uri);
        playback::add_uri_to_saved_queue(
            &self.client,
            &self.base_url,
            &object_id,
            playlist.update_id,
            &target,
        )
        .await
    }

    async fn leave_group(&self) -> SoapResult<()> {
        playback::leave_group(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl RenderingControl for SonosDeviceImpl {
    async fn get_channel_volume(&self, channel: &str) -> SoapResult<u8> {
        volume::get_volume(&self.client, &self.base_url, channel).await
    }

    async fn set_channel_volume(&self, channel: &str, level: u8) -> SoapResult<()> {
        volume::set_volume(&self.client, &self.base_url, channel, level).await
    }

    async fn get_channel_mute(&self, channel: &str) -> SoapResult<bool> {
        volume::get_mute(&self.client, &self.base_url, channel).await
    }

    async fn set_channel_mute(&self, channel: &str, muted: bool) -> SoapResult<()> {
        volume::set_mute(&self.client, &self.base_url, channel, muted).await
    }

    async fn adjust_channel_volume(&self, channel: &str, delta: i32) -> SoapResult<u8> {
        volume::set_relative_volume(&self.client, &self.base_url, channel, delta).await
    }
}

#[async_trait]
impl ContentDirectory for SonosDeviceImpl {
    async fn browse(&self, object_id: &str, options: BrowseOptions) -> SoapResult<BrowseResult> {
        content::browse(&self.client, &self.base_url, object_id, options).await
    }

    async fn delete_playlist(&self, playlist_id: &str) -> SoapResult<()> {
        let object_id = SearchType::SonosPlaylists.object_id(Some(playlist_id), ':');
        content::destroy_object(&self.client, &self.base_url, &object_id).await
    }
}

#[async_trait]
impl DeviceProperties for SonosDeviceImpl {
    async fn get_zone_info(&self) -> SoapResult<ZoneInfo> {
        device_properties::get_zone_info(&self.client, &self.base_url).await
    }

    async fn get_zone_attrs(&self) -> SoapResult<ZoneAttributes> {
        device_properties::get_zone_attributes(&self.client, &self.base_url).await
    }

    async fn device_description(&self) -> SoapResult<DeviceDescription> {
        device_properties::fetch_device_description(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl ZoneGroupTopology for SonosDeviceImpl {
    async fn get_all_groups(&self) -> SoapResult<Vec<ZoneGroup>> {
        zone_groups::get_zone_groups(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl EventSubscription for SonosDeviceImpl {
    async fn subscribe(
        &self,
        service: SonosService,
        callback_url: &str,
    ) -> GenaResult<SubscribeResponse> {
        subscription::subscribe(&self.client, &self.base_url, service, callback_url).await
    }

    async fn unsubscribe(&self, service: SonosService, sid: &str) -> bool {
        subscription::unsubscribe(&self.client, &self.base_url, service, sid).await
    }
}
