//! General utilities shared across the library.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Normalizes a room name into a registry key (trimmed, lowercase).
#[must_use]
pub fn room_key(room: &str) -> String {
    room.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_ignores_case_and_padding() {
        assert_eq!(room_key("  Living Room "), "living room");
        assert_eq!(room_key("KITCHEN"), room_key("kitchen"));
    }
}
