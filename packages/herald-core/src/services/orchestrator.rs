//! Playback orchestration for interruptions.
//!
//! [`PlaybackOrchestrator::run`] drives one interruption end to end: back up
//! the devices involved, start the announcement at its volume, wait for it
//! to play out and hand the device back. The wait is a timer derived from
//! the announcement's duration; players report no reliable end of track for
//! files served from a share, so restore timing is an approximation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::HeraldConfig;
use crate::error::{HeraldError, HeraldResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::media::{probe_duration, PlayTarget};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::interruption::{Hold, InterruptionService, RestoreOutcome};
use crate::sonos::types::TransportUri;
use crate::utils::{now_millis, room_key};

/// What happens once the announcement has played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndMode {
    /// End the caller's session before playing; nothing is backed up or restored.
    StopImmediately,
    /// Restore the prior state after the timeout.
    #[default]
    RestoreAfterSpeech,
    /// Leave the announcement playing and keep the device armed.
    LeavePlaying,
}

/// One interruption to play.
#[derive(Debug, Clone, PartialEq)]
pub struct InterruptionRequest {
    pub uri: String,
    pub room: String,
    pub end_mode: EndMode,
    /// Overrides the configured announcement volume.
    pub volume: Option<u8>,
    /// Playing time when known up front (intercom clips).
    pub known_duration: Option<Duration>,
    /// Local copy of the announcement, read for its duration.
    pub media_path: Option<PathBuf>,
    /// Room that relayed the request. Its state is captured before the
    /// target's and restored after it. When it differs from `room`, the
    /// relaying entry point ends the caller's listening session itself.
    pub caller: Option<String>,
}

impl InterruptionRequest {
    pub fn new(uri: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            room: room.into(),
            end_mode: EndMode::default(),
            volume: None,
            known_duration: None,
            media_path: None,
            caller: None,
        }
    }

    /// A request playing a resolved announcement file.
    pub fn for_target(target: &PlayTarget, room: impl Into<String>) -> Self {
        Self {
            known_duration: target.known_duration,
            media_path: target.local_path.clone(),
            ..Self::new(target.uri(), room)
        }
    }

    #[must_use]
    pub fn with_end_mode(mut self, end_mode: EndMode) -> Self {
        self.end_mode = end_mode;
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Option<u8>) -> Self {
        self.volume = volume;
        self
    }

    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// The caller when it is a different room than the target.
    fn relaying_caller(&self) -> Option<&str> {
        self.caller
            .as_deref()
            .filter(|caller| room_key(caller) != room_key(&self.room))
    }
}

/// What a finished interruption did.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub room: String,
    /// How long the device was given to play the announcement.
    pub timeout: Duration,
    /// True when the request joined an interruption already in progress.
    pub joined: bool,
    /// Set when this request restored the target.
    pub restore: Option<RestoreOutcome>,
}

/// Plays announcements on top of whatever devices are doing.
pub struct PlaybackOrchestrator {
    interruption: Arc<InterruptionService>,
    config: Arc<HeraldConfig>,
    emitter: Arc<dyn EventEmitter>,
    spawner: TokioSpawner,
}

impl PlaybackOrchestrator {
    pub fn new(
        interruption: Arc<InterruptionService>,
        config: Arc<HeraldConfig>,
        emitter: Arc<dyn EventEmitter>,
        spawner: TokioSpawner,
    ) -> Self {
        Self {
            interruption,
            config,
            emitter,
            spawner,
        }
    }

    #[must_use]
    pub fn interruption(&self) -> &Arc<InterruptionService> {
        &self.interruption
    }

    #[must_use]
    pub fn config(&self) -> &Arc<HeraldConfig> {
        &self.config
    }

    pub(crate) fn end_listening(&self, room: &str) {
        self.emitter.emit_session(SessionEvent::ListeningEnded {
            room: room.to_string(),
            timestamp: now_millis(),
        });
    }

    /// Ends the target's listening session unless a relaying caller owns it.
    fn end_request(&self, request: &InterruptionRequest) {
        if request.relaying_caller().is_none() {
            self.end_listening(&request.room);
        }
    }

    /// Resolves `file` and plays it in `room`.
    pub async fn play(
        &self,
        file: &str,
        room: &str,
        end_mode: EndMode,
        volume: Option<u8>,
    ) -> HeraldResult<PlaybackReport> {
        let target = match PlayTarget::parse(file, &self.config) {
            Ok(target) => target,
            Err(e) => {
                log::error!("[Orchestrator] Cannot play {} in {}: {}", file, room, e);
                self.end_listening(room);
                return Err(e);
            }
        };

        let request = InterruptionRequest::for_target(&target, room)
            .with_end_mode(end_mode)
            .with_volume(volume);
        self.run(request).await
    }

    /// Runs `request` in the background.
    pub fn spawn(self: &Arc<Self>, request: InterruptionRequest) {
        let this = Arc::clone(self);
        self.spawner.spawn(async move {
            if let Err(e) = this.run(request).await {
                log::warn!("[Orchestrator] Interruption failed: {}", e);
            }
        });
    }

    /// Plays one interruption and waits until it is over.
    ///
    /// The caller's listening session is ended on every path.
    pub async fn run(&self, request: InterruptionRequest) -> HeraldResult<PlaybackReport> {
        let Some(device) = self.interruption.registry().find_device(&request.room) else {
            log::error!("[Orchestrator] No player for {}", request.room);
            self.end_request(&request);
            return Err(HeraldError::DeviceNotFound(request.room.clone()));
        };
        let facade = device.facade().clone();
        let volume = self.config.resolve_volume(request.volume, &request.room);

        if request.end_mode == EndMode::StopImmediately {
            self.end_request(&request);
            facade
                .set_av_transport_uri(TransportUri::new(request.uri.as_str()))
                .await?;
            if let Err(e) = facade.set_volume(volume).await {
                log::warn!("[Orchestrator] Failed to set volume in {}: {}", request.room, e);
            }
            return Ok(PlaybackReport {
                room: request.room.clone(),
                timeout: Duration::ZERO,
                joined: false,
                restore: None,
            });
        }

        let caller_hold = match request.relaying_caller() {
            Some(caller) if self.interruption.registry().find_device(caller).is_some() => {
                match self.interruption.backup(caller).await {
                    Ok(hold) => Some(hold),
                    Err(e) => {
                        log::warn!("[Orchestrator] Backup of caller {} failed: {}", caller, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let hold = match self.interruption.backup(&request.room).await {
            Ok(hold) => hold,
            Err(e) => {
                self.release_caller(caller_hold.as_ref()).await;
                self.end_request(&request);
                return Err(e);
            }
        };

        log::info!(
            "[Orchestrator] Playing {} in {} at volume {}",
            request.uri,
            request.room,
            volume
        );
        if let Err(e) = facade
            .set_av_transport_uri(TransportUri::new(request.uri.as_str()))
            .await
        {
            log::error!("[Orchestrator] Cannot play {} in {}: {}", request.uri, request.room, e);
            self.interruption.finish(&hold).await;
            self.release_caller(caller_hold.as_ref()).await;
            self.end_request(&request);
            return Err(e.into());
        }
        if let Err(e) = facade.set_volume(volume).await {
            log::warn!("[Orchestrator] Failed to set volume in {}: {}", request.room, e);
        }

        let timeout = self.timeout_for(&request).await;
        let deadline = self.interruption.extend(&hold, Instant::now() + timeout);
        log::debug!(
            "[Orchestrator] {} released in {:?}",
            request.room,
            deadline.saturating_duration_since(Instant::now())
        );
        tokio::time::sleep_until(deadline).await;

        let restore = match request.end_mode {
            EndMode::LeavePlaying => {
                self.interruption.park(&hold).await;
                None
            }
            _ => self.interruption.finish(&hold).await,
        };
        self.release_caller(caller_hold.as_ref()).await;
        self.end_request(&request);

        Ok(PlaybackReport {
            room: request.room.clone(),
            timeout,
            joined: hold.joined(),
            restore,
        })
    }

    async fn release_caller(&self, hold: Option<&Hold>) {
        if let Some(hold) = hold {
            self.interruption.finish(hold).await;
        }
    }

    /// How long the announcement is given to play.
    ///
    /// Known or probed durations are padded with `add_duration`; without
    /// either the configured default is used.
    async fn timeout_for(&self, request: &InterruptionRequest) -> Duration {
        let duration = match (request.known_duration, &request.media_path) {
            (Some(duration), _) => Some(duration),
            (None, Some(path)) => probe_duration(path.clone()).await,
            (None, None) => None,
        };

        match duration {
            Some(duration) => duration + self.config.add_duration(),
            None => {
                let fallback = self.config.default_duration();
                log::warn!(
                    "[Orchestrator] Duration of {} unknown, using default {:?}",
                    request.uri,
                    fallback
                );
                fallback
            }
        }
    }
}
