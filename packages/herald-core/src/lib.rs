//! Herald Core - Sonos control and announcement interruption.
//!
//! Herald plays short announcements (speech, chimes, intercom messages) on
//! Sonos players and then puts each player back exactly as it was: same
//! source, same queue position, same volume, same mute state.
//!
//! # Architecture
//!
//! - [`sonos`]: UPnP/SOAP client for a single player
//! - [`services`]: Device registry, interruption state machine and the
//!   playback orchestrator, plus speech, intercom and room commands built on them
//! - [`media`]: Announcement locations on the shared folder and duration probing
//! - [`tts`]: Speech synthesis through an external engine
//! - [`events`]: Session and device events for frontends
//! - [`config`]: Runtime configuration
//! - [`bootstrap`]: Composition root
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SonosDevice`](sonos::SonosDevice): Everything Herald asks of a player
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//! - [`SpeechSynthesizer`](tts::SpeechSynthesizer): Producing a speech file
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning restore timers

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod sonos;
pub mod tts;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::{HeraldConfig, TtsConfig, TtsEngineKind};
pub use error::{ErrorCode, GenaResult, HeraldError, HeraldResult, SoapResult};
pub use events::{DeviceEvent, EventEmitter, LoggingEventEmitter, NoopEventEmitter, SessionEvent};
pub use media::PlayTarget;
pub use runtime::{TaskSpawner, TokioSpawner};
pub use tts::{CommandSynthesizer, SpeechRequest, SpeechSynthesizer, TtsError};
pub use utils::{now_millis, room_key};

// Re-export Sonos types
pub use sonos::discovery::{DeviceDescriptor, DiscoverySummary};
pub use sonos::types::{TransportState, TransportUri};
pub use sonos::{SonosDevice, SonosDeviceImpl};

// Re-export service types
pub use services::{
    CommandOutcome, DeviceRegistry, EndMode, IntercomDelivery, IntercomService, IntercomTarget,
    InterruptionRequest, InterruptionService, PlaybackOrchestrator, PlaybackReport, RestoreOutcome,
    RoomCommand, RoomCommands, SpeakOptions, SpeechService,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with, BootstrappedServices};
