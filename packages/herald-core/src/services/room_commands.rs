//! Direct room controls: volume, mute, TV input and queue transport.
//!
//! A command is issued from one room (where the user spoke) for another.
//! The issuing room's listening session ends whatever the outcome, and a
//! command that changes the target discards any interruption preset it
//! carried, since the user has taken over.

use std::sync::Arc;

use serde::Serialize;

use crate::config::HeraldConfig;
use crate::error::{HeraldError, HeraldResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::protocol_constants::{HTASTREAM_SCHEME, SPDIF_SUFFIX};
use crate::services::device_registry::Device;
use crate::services::interruption::InterruptionService;
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::TransportUri;
use crate::sonos::volume::{apply_volume_delta, MAX_VOLUME};
use crate::utils::now_millis;

/// A control command for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCommand {
    VolumeUp,
    VolumeDown,
    SetVolume(u8),
    Mute(bool),
    TvSound,
    PlayQueue,
    Stop,
    Next,
    Previous,
}

/// What a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommandOutcome {
    Volume { volume: u8, at_limit: bool },
    Muted { muted: bool },
    NotPlaying,
    TvActivated,
    AlreadyTv,
    NotTvRoom,
    QueueStarted,
    EmptyQueue,
    Paused,
    Skipped,
    /// The current source is a stream with no queue to move through.
    NotQueueBacked,
    AtQueueStart,
    AtQueueEnd,
}

impl CommandOutcome {
    /// True when the command changed the device.
    #[must_use]
    pub fn changed_device(&self) -> bool {
        matches!(
            self,
            Self::Volume { .. }
                | Self::Muted { .. }
                | Self::TvActivated
                | Self::QueueStarted
                | Self::Paused
                | Self::Skipped
        )
    }
}

/// Runs [`RoomCommand`]s against registered rooms.
pub struct RoomCommands {
    interruption: Arc<InterruptionService>,
    config: Arc<HeraldConfig>,
    emitter: Arc<dyn EventEmitter>,
}

impl RoomCommands {
    pub fn new(
        interruption: Arc<InterruptionService>,
        config: Arc<HeraldConfig>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            interruption,
            config,
            emitter,
        }
    }

    /// Runs `command` on `room` on behalf of `from`.
    pub async fn execute(
        &self,
        from: &str,
        room: &str,
        command: RoomCommand,
    ) -> HeraldResult<CommandOutcome> {
        let result = match self.interruption.registry().find_device(room) {
            Some(device) => self.apply(&device, command).await,
            None => Err(HeraldError::DeviceNotFound(room.to_string())),
        };

        match &result {
            Ok(outcome) => {
                log::info!("[Commands] {:?} in {}: {:?}", command, room, outcome);
                if outcome.changed_device() {
                    self.interruption.discard(room).await;
                }
            }
            Err(e) => log::error!("[Commands] {:?} in {} failed: {}", command, room, e),
        }

        self.emitter.emit_session(SessionEvent::ListeningEnded {
            room: from.to_string(),
            timestamp: now_millis(),
        });
        result
    }

    async fn apply(&self, device: &Device, command: RoomCommand) -> HeraldResult<CommandOutcome> {
        let facade = device.facade().as_ref();
        let step = i32::from(self.config.volume_step);

        match command {
            RoomCommand::VolumeUp => step_volume(facade, step).await,
            RoomCommand::VolumeDown => step_volume(facade, -step).await,
            RoomCommand::SetVolume(volume) => {
                let volume = volume.min(MAX_VOLUME);
                facade.set_volume(volume).await?;
                Ok(volume_outcome(volume))
            }
            RoomCommand::Mute(muted) => {
                if !facade.get_current_state().await?.is_active() {
                    return Ok(CommandOutcome::NotPlaying);
                }
                facade.set_muted(muted).await?;
                Ok(CommandOutcome::Muted { muted })
            }
            RoomCommand::TvSound => self.tv_sound(device).await,
            RoomCommand::PlayQueue => {
                if !facade.get_queue().await?.has_items() {
                    return Ok(CommandOutcome::EmptyQueue);
                }
                let volume = facade.get_volume().await?;
                facade.select_queue().await?;
                facade.play().await?;
                facade.set_volume(volume).await?;
                facade.set_muted(false).await?;
                Ok(CommandOutcome::QueueStarted)
            }
            RoomCommand::Stop => {
                if !facade.get_current_state().await?.is_active() {
                    return Ok(CommandOutcome::NotPlaying);
                }
                facade.pause().await?;
                Ok(CommandOutcome::Paused)
            }
            RoomCommand::Next => skip(facade, true).await,
            RoomCommand::Previous => skip(facade, false).await,
        }
    }

    /// Switches the room's bar to its TV input.
    async fn tv_sound(&self, device: &Device) -> HeraldResult<CommandOutcome> {
        let descriptor = device.descriptor();
        if !descriptor.is_home_theater_bar() && !self.config.is_tv_room(&descriptor.room_name) {
            return Ok(CommandOutcome::NotTvRoom);
        }

        let facade = device.facade();
        let track = facade.current_track().await?;
        if track.uri.contains(HTASTREAM_SCHEME) {
            return Ok(CommandOutcome::AlreadyTv);
        }

        let uri = format!(
            "{}{}{}",
            HTASTREAM_SCHEME,
            descriptor.udn.trim_start_matches("uuid:"),
            SPDIF_SUFFIX
        );
        facade.set_av_transport_uri(TransportUri::new(uri)).await?;
        Ok(CommandOutcome::TvActivated)
    }
}

fn volume_outcome(volume: u8) -> CommandOutcome {
    CommandOutcome::Volume {
        volume,
        at_limit: volume == 0 || volume == MAX_VOLUME,
    }
}

async fn step_volume(facade: &dyn SonosDevice, delta: i32) -> HeraldResult<CommandOutcome> {
    let current = facade.get_volume().await?;
    let volume = apply_volume_delta(current, delta);
    facade.set_volume(volume).await?;
    Ok(volume_outcome(volume))
}

/// Moves one track through the queue, staying within its bounds.
async fn skip(facade: &dyn SonosDevice, forward: bool) -> HeraldResult<CommandOutcome> {
    if !facade.get_current_state().await?.is_active() {
        return Ok(CommandOutcome::NotPlaying);
    }
    let track = facade.current_track().await?;
    if !track.is_queue_backed() {
        return Ok(CommandOutcome::NotQueueBacked);
    }
    let queue = facade.get_queue().await?;
    if !queue.has_items() {
        return Ok(CommandOutcome::EmptyQueue);
    }

    if forward {
        if track.queue_position as usize >= queue.items.len() {
            return Ok(CommandOutcome::AtQueueEnd);
        }
        facade.next().await?;
    } else {
        if track.queue_position <= 1 {
            return Ok(CommandOutcome::AtQueueStart);
        }
        facade.previous().await?;
    }
    Ok(CommandOutcome::Skipped)
}
