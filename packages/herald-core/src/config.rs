//! Runtime configuration for Herald services.
//!
//! All fields have defaults so a partial file deserializes. Loading from
//! disk and environment overrides belong to the binary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sonos::didl::DEFAULT_SPOTIFY_REGION;
use crate::utils::room_key;

/// Speech engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngineKind {
    /// `say` on macOS, `espeak` elsewhere.
    #[default]
    Auto,
    Espeak,
    Say,
    /// The program and arguments in [`TtsConfig::command`].
    Command,
}

/// Text-to-speech settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub engine: TtsEngineKind,

    /// Engine voice name (e.g. `fr`, `en-us`, `Thomas`).
    pub voice: Option<String>,

    /// Speaking rate in words per minute.
    pub speed: u32,

    /// Program for [`TtsEngineKind::Command`].
    ///
    /// Arguments may contain `{text}`, `{voice}`, `{speed}` and `{output}`.
    pub command: Option<String>,
    pub args: Vec<String>,

    /// Longest a synthesis may run before it is abandoned (seconds).
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: TtsEngineKind::Auto,
            voice: None,
            speed: 160,
            command: None,
            args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl TtsConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for Herald.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    // Shared folder
    /// Local path of the folder the players read announcements from.
    pub shared_folder: PathBuf,

    /// Network alias of `shared_folder` as `HOST/share`.
    ///
    /// `x-file-cifs://{share}/tts/speech/kitchen/speech.wav`
    pub share: String,

    // Volume
    /// Announcement volume when neither the request nor `volumes` sets one.
    pub default_volume: u8,

    /// Per-room announcement volume.
    pub volumes: HashMap<String, u8>,

    /// Step for volume up/down commands.
    pub volume_step: u8,

    // Timing
    /// Announcement length when the media duration cannot be read (seconds).
    pub default_duration_secs: u64,

    /// Slack added to a probed media duration (milliseconds).
    pub add_duration_ms: u64,

    /// Longest a device may stay armed by a leave-playing session (seconds).
    pub max_armed_secs: u64,

    // Devices
    /// Rooms never registered.
    pub ignore_list: Vec<String>,

    /// Rooms skipped by intercom broadcasts.
    pub intercom_ignore_list: Vec<String>,

    /// Room whose player carries TV audio (home-theater bar).
    pub tv_room: Option<String>,

    /// Spotify region used when generating Spotify metadata.
    pub spotify_region: String,

    pub tts: TtsConfig,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            shared_folder: default_shared_folder(),
            share: "localhost/herald".to_string(),
            default_volume: 20,
            volumes: HashMap::new(),
            volume_step: 5,
            default_duration_secs: 10,
            add_duration_ms: 1000,
            max_armed_secs: 600,
            ignore_list: Vec::new(),
            intercom_ignore_list: Vec::new(),
            tv_room: None,
            spotify_region: DEFAULT_SPOTIFY_REGION.to_string(),
            tts: TtsConfig::default(),
        }
    }
}

#[cfg(windows)]
fn default_shared_folder() -> PathBuf {
    PathBuf::from(r"C:\herald")
}

#[cfg(not(windows))]
fn default_shared_folder() -> PathBuf {
    PathBuf::from("/srv/herald")
}

impl HeraldConfig {
    /// Configured announcement volume for `room`, ignoring case.
    #[must_use]
    pub fn room_volume(&self, room: &str) -> Option<u8> {
        let key = room_key(room);
        self.volumes
            .iter()
            .find(|(name, _)| room_key(name) == key)
            .map(|(_, v)| (*v).min(100))
    }

    /// Resolves the announcement volume: explicit → per room → default.
    #[must_use]
    pub fn resolve_volume(&self, explicit: Option<u8>, room: &str) -> u8 {
        explicit
            .or_else(|| self.room_volume(room))
            .unwrap_or(self.default_volume)
            .min(100)
    }

    #[must_use]
    pub fn is_ignored(&self, room: &str) -> bool {
        contains_room(&self.ignore_list, room)
    }

    #[must_use]
    pub fn is_intercom_ignored(&self, room: &str) -> bool {
        contains_room(&self.intercom_ignore_list, room)
    }

    /// True when `room` is the configured TV room.
    #[must_use]
    pub fn is_tv_room(&self, room: &str) -> bool {
        self.tv_room
            .as_deref()
            .is_some_and(|tv| room_key(tv) == room_key(room))
    }

    #[must_use]
    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_duration_secs)
    }

    #[must_use]
    pub fn add_duration(&self) -> Duration {
        Duration::from_millis(self.add_duration_ms)
    }

    #[must_use]
    pub fn max_armed(&self) -> Duration {
        Duration::from_secs(self.max_armed_secs)
    }
}

pub(crate) fn contains_room(list: &[String], room: &str) -> bool {
    let key = room_key(room);
    list.iter().any(|r| room_key(r) == key)
}
