//! Domain events emitted by Herald services.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to emit events
//! - [`SessionEvent`] for the lifecycle of interruptions and listening sessions
//! - [`DeviceEvent`] for registry changes

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events about interruption sessions and the caller's listening state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A device's state was captured and its preset armed.
    InterruptionArmed {
        room: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A later request joined an already armed device.
    InterruptionJoined {
        room: String,
        holders: u32,
        timestamp: u64,
    },
    /// Prior state was written back without errors.
    Restored { room: String, timestamp: u64 },
    /// Restore finished with errors; the preset was reset anyway.
    RestoreFailed {
        room: String,
        error: String,
        timestamp: u64,
    },
    /// The caller's listening/UI session must end.
    ///
    /// Emitted by every entry point once its work is done, on success and
    /// on failure alike.
    ListeningEnded { room: String, timestamp: u64 },
}

/// Events about the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A device was registered for a room.
    Registered {
        room: String,
        #[serde(rename = "displayName")]
        display_name: String,
        host: String,
        timestamp: u64,
    },
    /// A home-theater bar replaced the device previously registered for a room.
    Superseded {
        room: String,
        #[serde(rename = "displayName")]
        display_name: String,
        timestamp: u64,
    },
    /// A device was removed.
    Removed { room: String, timestamp: u64 },
}
