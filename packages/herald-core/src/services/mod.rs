//! Application services layer.
//!
//! This module contains the business logic that sits between callers and
//! the Sonos device layer: the device registry, the per-device interruption
//! state machine and the services built on top of it.

pub mod device_registry;
pub mod intercom;
pub mod interruption;
pub mod orchestrator;
pub mod room_commands;
pub mod speech;

pub use device_registry::{Device, DeviceRegistry, Preset, PresetUpdate, Registration};
pub use intercom::{IntercomDelivery, IntercomService, IntercomTarget};
pub use interruption::{Hold, InterruptionService, Release, RestoreOutcome};
pub use orchestrator::{EndMode, InterruptionRequest, PlaybackOrchestrator, PlaybackReport};
pub use room_commands::{CommandOutcome, RoomCommand, RoomCommands};
pub use speech::{SpeakOptions, SpeechService};
