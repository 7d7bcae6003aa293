//! Intercom: relays a recorded clip from one room to others.
//!
//! The sender records `/intercom/intercom.wav` on the share and reports its
//! length. Each recipient plays it as an interruption relayed from the
//! sender, so the sender's player is held too and restored once the last
//! recipient is done.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::HeraldResult;
use crate::media::{PlayTarget, INTERCOM_CLIP};
use crate::services::orchestrator::{InterruptionRequest, PlaybackOrchestrator, PlaybackReport};
use crate::utils::room_key;

/// Who receives an intercom message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntercomTarget {
    /// Every registered room except the sender and ignored rooms.
    All,
    Room(String),
}

/// Result of relaying to one room.
#[derive(Debug)]
pub struct IntercomDelivery {
    pub room: String,
    pub result: HeraldResult<PlaybackReport>,
}

pub struct IntercomService {
    orchestrator: Arc<PlaybackOrchestrator>,
}

impl IntercomService {
    pub fn new(orchestrator: Arc<PlaybackOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Rooms a message from `from` is relayed to.
    #[must_use]
    pub fn recipients(
        &self,
        from: &str,
        target: &IntercomTarget,
        already_played_to: &[String],
    ) -> Vec<String> {
        match target {
            IntercomTarget::Room(room) => vec![room.clone()],
            IntercomTarget::All => {
                let config = self.orchestrator.config();
                let sender = room_key(from);
                self.orchestrator
                    .interruption()
                    .registry()
                    .all_device_ids()
                    .into_iter()
                    .filter(|room| room_key(room) != sender)
                    .filter(|room| !crate::config::contains_room(already_played_to, room))
                    .filter(|room| !config.is_intercom_ignored(room))
                    .collect()
            }
        }
    }

    /// Plays the intercom clip of length `duration` in every recipient room.
    ///
    /// Deliveries run concurrently. The sender's listening session ends
    /// right away unless the message is for its own room.
    pub async fn send(
        &self,
        from: &str,
        target: IntercomTarget,
        duration: Duration,
        already_played_to: &[String],
    ) -> HeraldResult<Vec<IntercomDelivery>> {
        let to_self = matches!(&target, IntercomTarget::Room(room) if room_key(room) == room_key(from));
        if !to_self {
            self.orchestrator.end_listening(from);
        }

        let clip = format!("{}@@{}", duration.as_secs_f64(), INTERCOM_CLIP);
        let clip = match PlayTarget::parse(&clip, self.orchestrator.config()) {
            Ok(clip) => clip,
            Err(e) => {
                if to_self {
                    self.orchestrator.end_listening(from);
                }
                return Err(e);
            }
        };

        let recipients = self.recipients(from, &target, already_played_to);
        if recipients.is_empty() {
            log::warn!("[Intercom] No room to relay {}'s message to", from);
        }

        let deliveries = recipients.into_iter().map(|room| {
            log::info!("[Intercom] Relaying {} to {}", from, room);
            let request = InterruptionRequest::for_target(&clip, room.as_str()).with_caller(from);
            async move {
                let result = self.orchestrator.run(request).await;
                IntercomDelivery { room, result }
            }
        });

        Ok(join_all(deliveries).await)
    }
}
