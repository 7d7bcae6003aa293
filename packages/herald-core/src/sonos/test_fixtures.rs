//! Shared test fixtures: an in-memory Sonos player and a recording emitter.
//!
//! [`FakeSonosDevice`] mutates its state the way a real player does for the
//! actions Herald issues, and records every state-changing call in order.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{GenaResult, SoapResult};
use crate::events::{DeviceEvent, EventEmitter, SessionEvent};
use crate::sonos::discovery::DeviceDescriptor;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapError;
use crate::sonos::subscription::SubscribeResponse;
use crate::sonos::traits::{
    AvTransport, ContentDirectory, DeviceEndpoint, DeviceProperties, EventSubscription,
    RenderingControl, ZoneGroupTopology,
};
use crate::sonos::types::{
    BrowseOptions, BrowseResult, DeviceDescription, EnqueueResult, MediaInfo, MediaItem,
    PlayMode, PlaylistEditResult, TrackInfo, TransportState, TransportUri, ZoneAttributes,
    ZoneGroup, ZoneInfo,
};
use crate::sonos::volume::apply_volume_delta;

/// Observable player state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeState {
    pub transport: TransportState,
    pub track: TrackInfo,
    pub volume: u8,
    pub muted: bool,
    pub queue: Vec<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            transport: TransportState::Stopped,
            track: TrackInfo::default(),
            volume: 20,
            muted: false,
            queue: Vec::new(),
        }
    }
}

/// In-memory player implementing every service trait.
pub struct FakeSonosDevice {
    host: String,
    room: String,
    pub state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    pub fail_state: AtomicBool,
    pub fail_track: AtomicBool,
    pub fail_set_uri: AtomicBool,
    pub fail_seek: AtomicBool,
}

/// Descriptor for a plain (non home-theater) player in `room`.
pub fn descriptor(room: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        room_name: room.to_string(),
        display_name: "One".to_string(),
        udn: format!("uuid:RINCON_{}", room.to_uppercase().replace(' ', "_")),
        host: "192.168.1.50".to_string(),
        port: 1400,
    }
}

fn fault(action: &str) -> SoapError {
    SoapError::Fault {
        code: "402".to_string(),
        description: format!("{} rejected", action),
    }
}

fn queue_track(queue: &[String], position: u32) -> TrackInfo {
    let uri = queue
        .get(position.saturating_sub(1) as usize)
        .cloned()
        .unwrap_or_default();
    TrackInfo {
        uri,
        queue_position: position,
        ..Default::default()
    }
}

impl FakeSonosDevice {
    pub fn new(room: &str, host: &str) -> Self {
        Self {
            host: host.to_string(),
            room: room.to_string(),
            state: Mutex::new(FakeState::default()),
            calls: Mutex::new(Vec::new()),
            fail_state: AtomicBool::new(false),
            fail_track: AtomicBool::new(false),
            fail_set_uri: AtomicBool::new(false),
            fail_seek: AtomicBool::new(false),
        }
    }

    /// A player streaming `uri` (radio, line-in, TV).
    pub fn streaming(room: &str, uri: &str, transport: TransportState) -> Self {
        let device = Self::new(room, "192.168.1.50");
        {
            let mut state = device.state.lock();
            state.transport = transport;
            state.track = TrackInfo {
                uri: uri.to_string(),
                raw_metadata: "<DIDL-Lite>radio</DIDL-Lite>".to_string(),
                ..Default::default()
            };
        }
        device
    }

    /// A player positioned in its queue.
    pub fn queued(
        room: &str,
        transport: TransportState,
        queue_len: u32,
        position: u32,
        elapsed: u32,
    ) -> Self {
        let device = Self::new(room, "192.168.1.51");
        {
            let mut state = device.state.lock();
            state.queue = (1..=queue_len)
                .map(|n| format!("x-file-cifs://nas/music/{:02}.flac", n))
                .collect();
            state.track = queue_track(&state.queue, position);
            state.track.position = elapsed;
            state.track.duration = Some(240);
            state.transport = transport;
        }
        device
    }

    pub fn with_volume(self, volume: u8, muted: bool) -> Self {
        {
            let mut state = self.state.lock();
            state.volume = volume;
            state.muted = muted;
        }
        self
    }

    pub fn snapshot(&self) -> FakeState {
        self.state.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

impl DeviceEndpoint for FakeSonosDevice {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        1400
    }
}

#[async_trait]
impl AvTransport for FakeSonosDevice {
    async fn get_current_state(&self) -> SoapResult<TransportState> {
        if self.fail_state.load(Ordering::SeqCst) {
            return Err(fault("GetTransportInfo"));
        }
        Ok(self.state.lock().transport)
    }

    async fn current_track(&self) -> SoapResult<TrackInfo> {
        if self.fail_track.load(Ordering::SeqCst) {
            return Err(fault("GetPositionInfo"));
        }
        Ok(self.state.lock().track.clone())
    }

    async fn get_media_info(&self) -> SoapResult<MediaInfo> {
        let state = self.state.lock();
        Ok(MediaInfo {
            nr_tracks: state.queue.len() as u32,
            current_uri: state.track.uri.clone(),
            ..Default::default()
        })
    }

    async fn set_av_transport_uri(&self, target: TransportUri) -> SoapResult<()> {
        self.record(format!(
            "set_uri({}, only_set={})",
            target.uri, target.only_set_uri
        ));
        if self.fail_set_uri.load(Ordering::SeqCst) {
            return Err(fault("SetAVTransportURI"));
        }
        let mut state = self.state.lock();
        state.track = TrackInfo {
            uri: target.uri,
            raw_metadata: target.metadata.unwrap_or_default(),
            ..Default::default()
        };
        state.transport = if target.only_set_uri {
            TransportState::Stopped
        } else {
            TransportState::Playing
        };
        Ok(())
    }

    async fn play(&self) -> SoapResult<()> {
        self.record("play");
        self.state.lock().transport = TransportState::Playing;
        Ok(())
    }

    async fn pause(&self) -> SoapResult<()> {
        self.record("pause");
        self.state.lock().transport = TransportState::Paused;
        Ok(())
    }

    async fn stop(&self) -> SoapResult<()> {
        self.record("stop");
        self.state.lock().transport = TransportState::Stopped;
        Ok(())
    }

    async fn next(&self) -> SoapResult<()> {
        self.record("next");
        let mut state = self.state.lock();
        let position = state.track.queue_position + 1;
        state.track = queue_track(&state.queue, position);
        Ok(())
    }

    async fn previous(&self) -> SoapResult<()> {
        self.record("previous");
        let mut state = self.state.lock();
        let position = state.track.queue_position.saturating_sub(1).max(1);
        state.track = queue_track(&state.queue, position);
        Ok(())
    }

    async fn seek(&self, seconds: u32) -> SoapResult<()> {
        self.record(format!("seek({})", seconds));
        if self.fail_seek.load(Ordering::SeqCst) {
            return Err(fault("Seek"));
        }
        self.state.lock().track.position = seconds;
        Ok(())
    }

    async fn select_track(&self, track: u32) -> SoapResult<()> {
        self.record(format!("select_track({})", track));
        let mut state = self.state.lock();
        state.track = queue_track(&state.queue, track);
        Ok(())
    }

    async fn flush(&self) -> SoapResult<()> {
        self.record("flush");
        self.state.lock().queue.clear();
        Ok(())
    }

    async fn add_uri_to_queue(&self, uri: &str, _position: u32) -> SoapResult<EnqueueResult> {
        self.record(format!("add_uri_to_queue({})", uri));
        let mut state = self.state.lock();
        state.queue.push(uri.to_string());
        let len = state.queue.len() as u32;
        Ok(EnqueueResult {
            first_track_number_enqueued: len,
            num_tracks_added: 1,
            new_queue_length: len,
        })
    }

    async fn select_queue(&self) -> SoapResult<()> {
        self.record("select_queue");
        let mut state = self.state.lock();
        state.track = queue_track(&state.queue, 1);
        state.transport = TransportState::Playing;
        Ok(())
    }

    async fn play_uri(&self, uri: &str) -> SoapResult<()> {
        self.record(format!("play_uri({})", uri));
        Ok(())
    }

    async fn get_play_mode(&self) -> SoapResult<PlayMode> {
        Ok(PlayMode::Normal)
    }

    async fn set_play_mode(&self, mode: PlayMode) -> SoapResult<()> {
        self.record(format!("set_play_mode({})", mode.as_str()));
        Ok(())
    }

    async fn create_playlist(&self, title: &str) -> SoapResult<PlaylistEditResult> {
        self.record(format!("create_playlist({})", title));
        Ok(PlaylistEditResult {
            assigned_object_id: Some("SQ:1".to_string()),
            ..Default::default()
        })
    }

    async fn add_to_playlist(
        &self,
        playlist_id: &str,
        uri: &str,
    ) -> SoapResult<PlaylistEditResult> {
        self.record(format!("add_to_playlist({}, {})", playlist_id, uri));
        Ok(PlaylistEditResult::default())
    }

    async fn leave_group(&self) -> SoapResult<()> {
        self.record("leave_group");
        Ok(())
    }
}

#[async_trait]
impl RenderingControl for FakeSonosDevice {
    async fn get_channel_volume(&self, _channel: &str) -> SoapResult<u8> {
        Ok(self.state.lock().volume)
    }

    async fn set_channel_volume(&self, _channel: &str, volume: u8) -> SoapResult<()> {
        let volume = volume.min(100);
        self.record(format!("set_volume({})", volume));
        self.state.lock().volume = volume;
        Ok(())
    }

    async fn get_channel_mute(&self, _channel: &str) -> SoapResult<bool> {
        Ok(self.state.lock().muted)
    }

    async fn set_channel_mute(&self, _channel: &str, muted: bool) -> SoapResult<()> {
        self.record(format!("set_muted({})", muted));
        self.state.lock().muted = muted;
        Ok(())
    }

    async fn adjust_channel_volume(&self, _channel: &str, delta: i32) -> SoapResult<u8> {
        self.record(format!("adjust_volume({})", delta));
        let mut state = self.state.lock();
        state.volume = apply_volume_delta(state.volume, delta);
        Ok(state.volume)
    }
}

#[async_trait]
impl ContentDirectory for FakeSonosDevice {
    async fn browse(&self, object_id: &str, _options: BrowseOptions) -> SoapResult<BrowseResult> {
        if object_id != "Q:0" {
            return Ok(BrowseResult::default());
        }
        let state = self.state.lock();
        let items: Vec<MediaItem> = state
            .queue
            .iter()
            .enumerate()
            .map(|(i, uri)| MediaItem {
                id: format!("Q:0/{}", i + 1),
                parent_id: "Q:0".to_string(),
                title: format!("Track {}", i + 1),
                uri: Some(uri.clone()),
                ..Default::default()
            })
            .collect();
        Ok(BrowseResult {
            returned: items.len() as u32,
            total: items.len() as u32,
            update_id: 1,
            items,
        })
    }

    async fn delete_playlist(&self, playlist_id: &str) -> SoapResult<()> {
        self.record(format!("delete_playlist({})", playlist_id));
        Ok(())
    }
}

#[async_trait]
impl DeviceProperties for FakeSonosDevice {
    async fn get_zone_info(&self) -> SoapResult<ZoneInfo> {
        Ok(ZoneInfo {
            mac_address: "00:0E:58:A0:12:34".to_string(),
            ip_address: self.host.clone(),
            ..Default::default()
        })
    }

    async fn get_zone_attrs(&self) -> SoapResult<ZoneAttributes> {
        Ok(ZoneAttributes {
            zone_name: self.room.clone(),
            icon: String::new(),
        })
    }

    async fn device_description(&self) -> SoapResult<DeviceDescription> {
        Ok(DeviceDescription {
            room_name: self.room.clone(),
            display_name: "One".to_string(),
            udn: "uuid:RINCON_000E58A0123401400".to_string(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ZoneGroupTopology for FakeSonosDevice {
    async fn get_all_groups(&self) -> SoapResult<Vec<ZoneGroup>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl EventSubscription for FakeSonosDevice {
    async fn subscribe(
        &self,
        _service: SonosService,
        _callback_url: &str,
    ) -> GenaResult<SubscribeResponse> {
        Ok(SubscribeResponse {
            sid: "uuid:fake-sub".to_string(),
            timeout_secs: 3600,
        })
    }

    async fn unsubscribe(&self, _service: SonosService, _sid: &str) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording emitter
// ─────────────────────────────────────────────────────────────────────────────

/// Emitter that keeps every event with the (tokio) instant it was emitted.
#[derive(Default)]
pub struct RecordingEmitter {
    sessions: Mutex<Vec<(SessionEvent, Instant)>>,
    devices: Mutex<Vec<DeviceEvent>>,
}

impl RecordingEmitter {
    pub fn session_events(&self) -> Vec<SessionEvent> {
        self.sessions.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn timed_session_events(&self) -> Vec<(SessionEvent, Instant)> {
        self.sessions.lock().clone()
    }

    pub fn device_events(&self) -> Vec<DeviceEvent> {
        self.devices.lock().clone()
    }

    /// Number of `ListeningEnded` events for `room`.
    pub fn listening_ended(&self, room: &str) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|(e, _)| matches!(e, SessionEvent::ListeningEnded { room: r, .. } if r == room))
            .count()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit_session(&self, event: SessionEvent) {
        self.sessions.lock().push((event, Instant::now()));
    }

    fn emit_device(&self, event: DeviceEvent) {
        self.devices.lock().push(event);
    }
}

/// Writes a silent 8 kHz mono 16-bit PCM WAV file of `seconds` length.
pub fn write_wav(path: &Path, seconds: u32) {
    let sample_rate: u32 = 8000;
    let channels: u16 = 1;
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = byte_rate * seconds;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}
