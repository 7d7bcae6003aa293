//! Per-device interruption state machine.
//!
//! A device moves Idle → Backing-up → Armed → Restoring → Idle. Backup and
//! restore both run under the device's transition lock, so a device is
//! backed up at most once per armed episode.
//!
//! Every armed episode has an epoch. A request that finds the device armed
//! joins the episode as an extra holder instead of capturing state again.
//! Holders release in any order and only the last one restores. Timers that
//! outlive their episode see a different epoch and do nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::{HeraldError, HeraldResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::device_registry::{Device, DeviceRegistry, Preset};
use crate::sonos::soap::SoapResult;
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::{TrackInfo, TransportUri};
use crate::utils::{now_millis, room_key};

/// A request's claim on an armed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    room: String,
    epoch: u64,
    joined: bool,
}

impl Hold {
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when the request joined an episode armed by someone else.
    #[must_use]
    pub fn joined(&self) -> bool {
        self.joined
    }
}

/// Result of giving up a [`Hold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The episode already ended.
    Stale,
    /// Other holders remain.
    Deferred { holders: u32 },
    /// This was the last holder.
    Last,
}

/// What a restore did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub room: String,
    /// False when the device was not armed and nothing was written.
    pub restored: bool,
    /// Failed steps, in order. The preset is reset regardless.
    pub errors: Vec<String>,
}

impl RestoreOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ArmedSession {
    epoch: u64,
    holders: u32,
    release_at: Option<Instant>,
    parked_until: Option<Instant>,
}

/// Captures, arms and restores device state around interruptions.
pub struct InterruptionService {
    registry: Arc<DeviceRegistry>,
    emitter: Arc<dyn EventEmitter>,
    sessions: DashMap<String, ArmedSession>,
    epochs: AtomicU64,
    max_armed: Duration,
    spawner: TokioSpawner,
}

impl InterruptionService {
    /// # Arguments
    /// * `max_armed` - How long a parked (leave-playing) episode stays armed
    pub fn new(
        registry: Arc<DeviceRegistry>,
        emitter: Arc<dyn EventEmitter>,
        max_armed: Duration,
        spawner: TokioSpawner,
    ) -> Self {
        Self {
            registry,
            emitter,
            sessions: DashMap::new(),
            epochs: AtomicU64::new(0),
            max_armed,
            spawner,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// True while the room has an armed episode.
    #[must_use]
    pub fn is_armed(&self, room: &str) -> bool {
        self.registry.is_preset(room)
    }

    /// Number of requests holding the room's episode.
    #[must_use]
    pub fn holders(&self, room: &str) -> u32 {
        self.sessions
            .get(&room_key(room))
            .map_or(0, |session| session.holders)
    }

    fn device(&self, room: &str) -> HeraldResult<Arc<Device>> {
        self.registry
            .find_device(room)
            .ok_or_else(|| HeraldError::DeviceNotFound(room.to_string()))
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Backup
    // ─────────────────────────────────────────────────────────────────────────

    /// Captures the room's state and arms it, or joins the armed episode.
    ///
    /// Either way the device ends up unmuted.
    pub async fn backup(&self, room: &str) -> HeraldResult<Hold> {
        let device = self.device(room)?;
        let _transition = device.transition_lock().lock().await;
        let facade = device.facade();
        let key = room_key(room);
        let room = device.room_name().to_string();

        if device.is_preset() {
            if let Err(e) = facade.set_muted(false).await {
                log::warn!("[Interruption] Failed to unmute {}: {}", room, e);
            }
            let (epoch, holders) = {
                let mut session = self.sessions.entry(key).or_insert_with(|| ArmedSession {
                    epoch: self.next_epoch(),
                    holders: 0,
                    release_at: None,
                    parked_until: None,
                });
                session.holders += 1;
                session.parked_until = None;
                (session.epoch, session.holders)
            };

            log::info!("[Interruption] {} already armed, joined ({} holders)", room, holders);
            self.emitter.emit_session(SessionEvent::InterruptionJoined {
                room: room.clone(),
                holders,
                timestamp: now_millis(),
            });
            return Ok(Hold {
                room,
                epoch,
                joined: true,
            });
        }

        let snapshot = capture_state(&room, facade.as_ref()).await;
        if let Err(e) = facade.set_muted(false).await {
            log::warn!("[Interruption] Failed to unmute {}: {}", room, e);
        }

        log::info!(
            "[Interruption] Armed {} (playing: {:?}, volume: {:?}, muted: {}, track: {})",
            room,
            snapshot.state,
            snapshot.volume,
            snapshot.muted,
            snapshot
                .media_info
                .as_ref()
                .map_or("none", |track| track.uri.as_str())
        );
        device.arm(snapshot);

        let epoch = self.next_epoch();
        self.sessions.insert(
            key,
            ArmedSession {
                epoch,
                holders: 1,
                release_at: None,
                parked_until: None,
            },
        );
        self.emitter.emit_session(SessionEvent::InterruptionArmed {
            room: room.clone(),
            timestamp: now_millis(),
        });

        Ok(Hold {
            room,
            epoch,
            joined: false,
        })
    }

    /// Pushes the episode's release deadline to at least `deadline`.
    ///
    /// Returns the deadline the hold should wait for, which is never earlier
    /// than one set by another holder.
    pub fn extend(&self, hold: &Hold, deadline: Instant) -> Instant {
        match self.sessions.get_mut(&room_key(&hold.room)) {
            Some(mut session) if session.epoch == hold.epoch => {
                let release_at = session
                    .release_at
                    .map_or(deadline, |current| current.max(deadline));
                session.release_at = Some(release_at);
                release_at
            }
            _ => deadline,
        }
    }

    fn release(&self, hold: &Hold) -> Release {
        let mut session = match self.sessions.get_mut(&room_key(&hold.room)) {
            Some(session) if session.epoch == hold.epoch => session,
            _ => return Release::Stale,
        };
        session.holders = session.holders.saturating_sub(1);
        if session.holders > 0 {
            Release::Deferred {
                holders: session.holders,
            }
        } else {
            Release::Last
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Release
    // ─────────────────────────────────────────────────────────────────────────

    /// Gives up `hold` and restores if it was the last one.
    ///
    /// Returns `None` when other holders remain or the episode already ended.
    pub async fn finish(&self, hold: &Hold) -> Option<RestoreOutcome> {
        let device = self.registry.find_device(&hold.room)?;
        let _transition = device.transition_lock().lock().await;

        match self.release(hold) {
            Release::Last => Some(self.restore_locked(&device).await),
            Release::Deferred { holders } => {
                log::debug!(
                    "[Interruption] {} released, {} holder(s) remain",
                    hold.room,
                    holders
                );
                None
            }
            Release::Stale => {
                log::debug!("[Interruption] Stale hold on {} (epoch {})", hold.room, hold.epoch);
                None
            }
        }
    }

    /// Gives up `hold` without restoring; the device stays armed.
    ///
    /// If nobody holds the episode `max_armed` later, it is restored.
    pub async fn park(self: &Arc<Self>, hold: &Hold) {
        let Some(device) = self.registry.find_device(&hold.room) else {
            return;
        };
        let _transition = device.transition_lock().lock().await;

        if self.release(hold) != Release::Last {
            return;
        }

        let parked_until = Instant::now() + self.max_armed;
        if let Some(mut session) = self.sessions.get_mut(&room_key(&hold.room)) {
            session.parked_until = Some(parked_until);
        }
        log::info!(
            "[Interruption] {} left playing, restoring in {:?} unless rejoined",
            hold.room,
            self.max_armed
        );

        let this = Arc::clone(self);
        let hold = hold.clone();
        self.spawner.spawn(async move {
            tokio::time::sleep_until(parked_until).await;
            this.expire(&hold).await;
        });
    }

    async fn expire(&self, hold: &Hold) {
        let Some(device) = self.registry.find_device(&hold.room) else {
            return;
        };
        let _transition = device.transition_lock().lock().await;

        let due = self
            .sessions
            .get(&room_key(&hold.room))
            .is_some_and(|session| {
                session.epoch == hold.epoch
                    && session.holders == 0
                    && session
                        .parked_until
                        .is_some_and(|until| until <= Instant::now())
            });
        if due {
            log::info!("[Interruption] {} armed too long, restoring", hold.room);
            self.restore_locked(&device).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Restore
    // ─────────────────────────────────────────────────────────────────────────

    /// Restores the room now, whoever holds it.
    pub async fn restore(&self, room: &str) -> HeraldResult<RestoreOutcome> {
        let device = self.device(room)?;
        let _transition = device.transition_lock().lock().await;
        Ok(self.restore_locked(&device).await)
    }

    /// Restores the room if it is armed. Used on cancellation paths.
    pub async fn cancel(&self, room: &str) -> Option<RestoreOutcome> {
        if !self.is_armed(room) {
            return None;
        }
        self.restore(room).await.ok()
    }

    /// Disarms the room without writing anything back.
    ///
    /// Used when the user takes manual control; outstanding holds and
    /// watchdogs become stale. Returns false if the room was not armed.
    pub async fn discard(&self, room: &str) -> bool {
        let Some(device) = self.registry.find_device(room) else {
            return false;
        };
        let _transition = device.transition_lock().lock().await;
        self.sessions.remove(&room_key(room));
        let discarded = device.reset_preset();
        if discarded {
            log::info!("[Interruption] Discarded preset of {}", device.room_name());
        }
        discarded
    }

    async fn restore_locked(&self, device: &Device) -> RestoreOutcome {
        let room = device.room_name().to_string();
        let key = room_key(&room);
        let preset = device.preset();

        if !preset.preseted {
            self.sessions.remove(&key);
            return RestoreOutcome {
                room,
                ..Default::default()
            };
        }

        let errors = write_back(device.facade().as_ref(), &preset).await;

        device.reset_preset();
        self.sessions.remove(&key);

        if errors.is_empty() {
            log::info!("[Interruption] Restored {}", room);
            self.emitter.emit_session(SessionEvent::Restored {
                room: room.clone(),
                timestamp: now_millis(),
            });
        } else {
            let error = HeraldError::Restore(errors.join("; "));
            log::warn!("[Interruption] {}: {}", room, error);
            self.emitter.emit_session(SessionEvent::RestoreFailed {
                room: room.clone(),
                error: error.to_string(),
                timestamp: now_millis(),
            });
        }

        RestoreOutcome {
            room,
            restored: true,
            errors,
        }
    }
}

/// Reads what the device is doing.
///
/// Only the transport state read is essential; when it fails the device is
/// treated as stopped with no track.
async fn capture_state(room: &str, facade: &dyn SonosDevice) -> Preset {
    let (was_playing, track) = match facade.get_current_state().await {
        Ok(state) => {
            let track = match facade.current_track().await {
                Ok(track) => Some(track),
                Err(e) => {
                    let error = HeraldError::StateCapture(e.to_string());
                    log::warn!("[Interruption] {}: {}", room, error);
                    None
                }
            };
            (state.is_active(), track)
        }
        Err(e) => {
            log::warn!(
                "[Interruption] Transport state of {} unavailable, assuming stopped: {}",
                room,
                e
            );
            (false, None)
        }
    };

    let muted = facade.get_muted().await.unwrap_or_else(|e| {
        log::warn!("[Interruption] Failed to read mute of {}: {}", room, e);
        false
    });
    let volume = match facade.get_volume().await {
        Ok(volume) => Some(volume),
        Err(e) => {
            log::warn!("[Interruption] Failed to read volume of {}: {}", room, e);
            None
        }
    };

    Preset {
        preseted: true,
        state: Some(was_playing),
        media_info: track,
        volume,
        muted,
    }
}

fn check(errors: &mut Vec<String>, step: &str, result: SoapResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            errors.push(format!("{}: {}", step, e));
            false
        }
    }
}

/// Writes `preset` back to the device and returns the failed steps.
async fn write_back(facade: &dyn SonosDevice, preset: &Preset) -> Vec<String> {
    let mut errors = Vec::new();
    let was_playing = preset.state.unwrap_or(false);

    if let Some(volume) = preset.volume {
        check(&mut errors, "set volume", facade.set_volume(volume).await);
    }

    let mut queue_restored = false;
    match &preset.media_info {
        Some(track) if track.is_live_source() => {
            let target = live_source_uri(track);
            if check(&mut errors, "set source", facade.set_av_transport_uri(target).await)
                && was_playing
            {
                check(&mut errors, "play", facade.play().await);
            }
        }
        Some(track) if track.is_queue_backed() => {
            check(&mut errors, "mute", facade.set_muted(true).await);
            match facade.get_queue().await {
                Ok(queue) if queue.has_items() => {
                    if check(&mut errors, "select queue", facade.select_queue().await) {
                        queue_restored = true;
                        if track.queue_position > 0 {
                            check(
                                &mut errors,
                                "select track",
                                facade.select_track(track.queue_position).await,
                            );
                        }
                        if track.position > 0 {
                            check(&mut errors, "seek", facade.seek(track.position).await);
                        }
                    }
                }
                Ok(_) => log::debug!("[Interruption] Queue is empty, not reselecting"),
                Err(e) => errors.push(format!("browse queue: {}", e)),
            }
        }
        _ => {}
    }

    if queue_restored && !was_playing {
        check(&mut errors, "pause", facade.pause().await);
    }
    check(&mut errors, "restore mute", facade.set_muted(preset.muted).await);

    errors
}

/// The live source to re-issue, without starting playback.
fn live_source_uri(track: &TrackInfo) -> TransportUri {
    let target = TransportUri::new(track.uri.as_str()).only_set();
    if track.raw_metadata.is_empty() {
        target
    } else {
        target.with_metadata(track.raw_metadata.as_str())
    }
}
