//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! channel, so a UI, a voice front end or a test can observe them.

use super::{DeviceEvent, SessionEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn finish(&self, room: &str) {
///         self.emitter.emit_session(SessionEvent::ListeningEnded { ... });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits an interruption or listening-session event.
    fn emit_session(&self, event: SessionEvent);

    /// Emits a device registry event.
    fn emit_device(&self, event: DeviceEvent);
}

/// No-op emitter for the headless runner or testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_session(&self, _event: SessionEvent) {}

    fn emit_device(&self, _event: DeviceEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }

    fn emit_device(&self, event: DeviceEvent) {
        tracing::debug!(?event, "device_event");
    }
}
