//! Announcement media: where a file lives and how long it plays.
//!
//! Players fetch announcements from an SMB share, so every file has two
//! names: the network path the player is given (`//HOST/share/...`) and the
//! local path Herald reads to measure its duration.
//!
//! A play request names its file in one of three forms:
//!
//! - `/folder/file.wav` - relative to the configured share
//! - `share:HOST[c:]/folder@@/file.wav` - an explicit share; the optional
//!   bracket is the local drive the share maps to
//! - `12.5@@/intercom/intercom.wav` - relative to the configured share, with
//!   a known duration in seconds
//!
//! Anything starting with a URI scheme (`http://...`, `x-rincon-mp3radio://...`)
//! is handed to the player unchanged, optionally behind a duration prefix.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::prelude::*;
use lofty::probe::Probe;

use crate::config::HeraldConfig;
use crate::error::{HeraldError, HeraldResult};
use crate::protocol_constants::CIFS_SCHEME;

/// Separates a share or duration prefix from the file path.
const PREFIX_SEPARATOR: &str = "@@";

const SHARE_PREFIX: &str = "share:";

/// Folder under the share where synthesized speech is written.
pub const SPEECH_FOLDER: &str = "tts/speech";

/// File name of synthesized speech.
pub const SPEECH_FILE: &str = "speech.wav";

/// Clip played by intercom broadcasts.
pub const INTERCOM_CLIP: &str = "/intercom/intercom.wav";

/// A resolved announcement file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayTarget {
    /// What the player is told to play: `x-file-cifs://HOST/share/file` or a
    /// stream URI passed through.
    pub transport_uri: String,
    /// Where Herald can read the same file; `None` for streams.
    pub local_path: Option<PathBuf>,
    /// Duration supplied with the request.
    pub known_duration: Option<Duration>,
}

impl PlayTarget {
    /// Resolves a play request's file against the configured share.
    pub fn parse(file: &str, config: &HeraldConfig) -> HeraldResult<Self> {
        let file = file.trim();
        if file.is_empty() {
            return Err(HeraldError::InvalidRequest("no file to play".to_string()));
        }

        if has_uri_scheme(file) {
            return Ok(Self::stream(file, None));
        }

        let Some((prefix, path)) = file.split_once(PREFIX_SEPARATOR) else {
            return default_share(file, config, None);
        };
        if path.is_empty() {
            return Err(HeraldError::InvalidRequest(format!("no file after prefix: {}", file)));
        }

        if let Ok(seconds) = prefix.trim().parse::<f64>() {
            let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
                HeraldError::InvalidRequest(format!("invalid duration: {}", prefix))
            })?;
            let path = path.trim();
            if has_uri_scheme(path) {
                return Ok(Self::stream(path, Some(duration)));
            }
            return default_share(path, config, Some(duration));
        }

        if let Some(share) = prefix.trim().strip_prefix(SHARE_PREFIX) {
            return explicit_share(share, path);
        }

        default_share(path, config, None)
    }

    fn stream(uri: &str, known_duration: Option<Duration>) -> Self {
        Self {
            transport_uri: uri.to_string(),
            local_path: None,
            known_duration,
        }
    }

    /// Transport URI for the player.
    #[must_use]
    pub fn uri(&self) -> String {
        self.transport_uri.clone()
    }
}

/// True for `scheme:rest` per RFC 3986. Single letters are drive names and
/// `share:` introduces an explicit share.
fn has_uri_scheme(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    scheme.len() > 1
        && !rest.is_empty()
        && !value.starts_with(SHARE_PREFIX)
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn cifs_uri(network_path: &str) -> String {
    format!("{}{}", CIFS_SCHEME, network_path)
}

fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_share(
    path: &str,
    config: &HeraldConfig,
    known_duration: Option<Duration>,
) -> HeraldResult<PlayTarget> {
    let share = config.share.trim().trim_matches('/');
    if share.is_empty() {
        return Err(HeraldError::Configuration(
            "no network share configured".to_string(),
        ));
    }

    Ok(PlayTarget {
        transport_uri: cifs_uri(&join_path(&format!("//{}", share), path)),
        local_path: Some(config.shared_folder.join(path.trim_start_matches('/'))),
        known_duration,
    })
}

/// `HOST[c:]/folder` + `/file` → `//HOST/folder/file`, `c:/folder/file`.
fn explicit_share(share: &str, path: &str) -> HeraldResult<PlayTarget> {
    let (drive, share) = match (share.find('['), share.find(']')) {
        (Some(open), Some(close)) if open < close => (
            &share[open + 1..close],
            format!("{}{}", &share[..open], &share[close + 1..]),
        ),
        _ => ("", share.to_string()),
    };

    let share = share.trim_matches('/');
    let Some((_host, folder)) = share.split_once('/') else {
        return Err(HeraldError::InvalidRequest(format!(
            "share must be HOST/folder: {}",
            share
        )));
    };
    let folder = folder.split('/').next().unwrap_or_default();

    Ok(PlayTarget {
        transport_uri: cifs_uri(&join_path(&format!("//{}", share), path)),
        local_path: Some(PathBuf::from(join_path(&format!("{}/{}", drive, folder), path))),
        known_duration: None,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Speech files
// ─────────────────────────────────────────────────────────────────────────────

/// Characters removed from text before synthesis.
const SPEECH_STRIPPED: &[char] = &['"', '|', '/', '\\', '>', '<', '(', ')', '#', '@', '{', '}', '`'];

/// Characters removed from a room name to form its speech folder.
const FOLDER_STRIPPED: &[char] = &[
    ' ', '\'', '"', '?', ':', '|', '/', '\\', '>', '<', '!', '.', '(', ')', '{', '}', '[', ']', '#',
    '@', '-', '&', ';', ',', '^', '$', '~', '=', '*', '`', '_',
];

/// Removes characters engines read aloud or shells interpret.
#[must_use]
pub fn sanitize_speech(text: &str) -> String {
    text.chars()
        .filter(|c| !SPEECH_STRIPPED.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Folder name for a room's speech file: ASCII letters and digits only.
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn client_folder(room: &str) -> Option<String> {
    let folder: String = room
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !FOLDER_STRIPPED.contains(c))
        .collect();
    (!folder.is_empty()).then_some(folder)
}

/// Where speech for `folder` is written and how players reach it.
pub fn speech_target(config: &HeraldConfig, folder: &str) -> HeraldResult<PlayTarget> {
    default_share(
        &format!("/{}/{}/{}", SPEECH_FOLDER, folder, SPEECH_FILE),
        config,
        None,
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Duration
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the playing time of an audio file from its headers.
pub fn media_duration(path: &Path) -> HeraldResult<Duration> {
    let tagged = Probe::open(path)
        .map_err(|e| HeraldError::Media(format!("{}: {}", path.display(), e)))?
        .read()
        .map_err(|e| HeraldError::Media(format!("{}: {}", path.display(), e)))?;

    let duration = tagged.properties().duration();
    if duration.is_zero() {
        return Err(HeraldError::Media(format!(
            "{}: no duration in headers",
            path.display()
        )));
    }
    Ok(duration)
}

/// [`media_duration`] off the async runtime. `None` if it cannot be read.
pub async fn probe_duration(path: PathBuf) -> Option<Duration> {
    let result = tokio::task::spawn_blocking(move || media_duration(&path)).await;
    match result {
        Ok(Ok(duration)) => Some(duration),
        Ok(Err(e)) => {
            log::warn!("[Media] {}", e);
            None
        }
        Err(e) => {
            log::warn!("[Media] Duration probe panicked: {}", e);
            None
        }
    }
}
