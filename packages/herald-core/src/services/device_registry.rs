//! Registry of controllable devices keyed by room name.
//!
//! Each [`Device`] pairs an immutable identity with its facade and the
//! [`Preset`] captured before an interruption. The registry is constructed
//! once and passed to every service that needs it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::contains_room;
use crate::events::{DeviceEvent, EventEmitter};
use crate::sonos::discovery::DeviceDescriptor;
use crate::sonos::traits::SonosDevice;
use crate::sonos::types::TrackInfo;
use crate::utils::{now_millis, room_key};

// ─────────────────────────────────────────────────────────────────────────────
// Preset
// ─────────────────────────────────────────────────────────────────────────────

/// Playback state captured before an interruption.
///
/// The default value is the unarmed preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// True between an interruption's backup and its restore.
    pub preseted: bool,
    /// Whether the device was playing.
    pub state: Option<bool>,
    /// Track the device was positioned on, if it could be read.
    pub media_info: Option<TrackInfo>,
    pub volume: Option<u8>,
    pub muted: bool,
}

/// Partial preset update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct PresetUpdate {
    pub preseted: Option<bool>,
    pub state: Option<bool>,
    pub media_info: Option<TrackInfo>,
    pub volume: Option<u8>,
    pub muted: Option<bool>,
}

impl Preset {
    fn apply(&mut self, update: PresetUpdate) {
        if let Some(preseted) = update.preseted {
            self.preseted = preseted;
        }
        if let Some(state) = update.state {
            self.state = Some(state);
        }
        if let Some(track) = update.media_info {
            self.media_info = Some(track);
        }
        if let Some(volume) = update.volume {
            self.volume = Some(volume.min(100));
        }
        if let Some(muted) = update.muted {
            self.muted = muted;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device
// ─────────────────────────────────────────────────────────────────────────────

/// A registered device.
pub struct Device {
    descriptor: DeviceDescriptor,
    facade: Arc<dyn SonosDevice>,
    preset: Mutex<Preset>,
    /// Serializes backup and restore for this device.
    transition: tokio::sync::Mutex<()>,
}

impl Device {
    fn new(descriptor: DeviceDescriptor, facade: Arc<dyn SonosDevice>, preset: Preset) -> Self {
        Self {
            descriptor,
            facade,
            preset: Mutex::new(preset),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn room_name(&self) -> &str {
        &self.descriptor.room_name
    }

    #[must_use]
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn facade(&self) -> &Arc<dyn SonosDevice> {
        &self.facade
    }

    #[must_use]
    pub fn preset(&self) -> Preset {
        self.preset.lock().clone()
    }

    #[must_use]
    pub fn is_preset(&self) -> bool {
        self.preset.lock().preseted
    }

    /// True for a home-theater bar.
    #[must_use]
    pub fn is_home_theater_bar(&self) -> bool {
        self.descriptor.is_home_theater_bar()
    }

    pub(crate) fn update_preset(&self, update: PresetUpdate) {
        self.preset.lock().apply(update);
    }

    /// Replaces the preset with an armed snapshot.
    pub(crate) fn arm(&self, snapshot: Preset) {
        *self.preset.lock() = Preset {
            preseted: true,
            ..snapshot
        };
    }

    /// Resets an armed preset. Returns `false` if it was not armed.
    pub(crate) fn reset_preset(&self) -> bool {
        let mut preset = self.preset.lock();
        if !preset.preseted {
            return false;
        }
        *preset = Preset::default();
        true
    }

    pub(crate) fn transition_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.transition
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("descriptor", &self.descriptor)
            .field("preset", &*self.preset.lock())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of [`DeviceRegistry::register_discovered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Room is on the ignore list.
    Ignored,
    /// First device for the room.
    Added,
    /// A home-theater bar replaced the room's previous device.
    Superseded,
    /// The room already has a device and nothing changed.
    AlreadyKnown,
}

/// Room name → device map.
///
/// Lookups ignore case. Mutations of one room are atomic with respect to
/// each other.
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<Device>>,
    emitter: Arc<dyn EventEmitter>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            devices: DashMap::new(),
            emitter,
        }
    }

    /// Adds a device, replacing any device registered for the same room.
    pub fn add_device(
        &self,
        descriptor: DeviceDescriptor,
        facade: Arc<dyn SonosDevice>,
    ) -> Arc<Device> {
        let event = registered_event(&descriptor);
        let device = Arc::new(Device::new(descriptor, facade, Preset::default()));
        self.devices
            .insert(room_key(device.room_name()), Arc::clone(&device));

        log::info!(
            "[Registry] Registered {} ({})",
            device.room_name(),
            device.descriptor().host
        );
        self.emitter.emit_device(event);
        device
    }

    /// Applies the discovery policy to a newly seen device.
    ///
    /// A home-theater bar supersedes a different, non-bar device of the same
    /// room; an armed preset carries over to the bar. The replaced device's
    /// transition lock is held for the handover, so a backup or restore in
    /// flight on it completes before its preset is copied.
    pub async fn register_discovered(
        &self,
        descriptor: DeviceDescriptor,
        facade: Arc<dyn SonosDevice>,
        ignore_list: &[String],
    ) -> Registration {
        if contains_room(ignore_list, &descriptor.room_name) {
            log::debug!("[Registry] Ignoring {}", descriptor.room_name);
            return Registration::Ignored;
        }

        let key = room_key(&descriptor.room_name);
        let (registration, event) = loop {
            let existing = self.find_device(&descriptor.room_name);
            if existing
                .as_ref()
                .is_some_and(|existing| !supersedes(existing, &descriptor))
            {
                return Registration::AlreadyKnown;
            }
            let _transition = match &existing {
                Some(existing) => Some(existing.transition_lock().lock().await),
                None => None,
            };

            // The room may have changed hands while waiting for the lock.
            match self.devices.entry(key.clone()) {
                Entry::Vacant(vacant) => {
                    if existing.is_some() {
                        continue;
                    }
                    let event = registered_event(&descriptor);
                    vacant.insert(Arc::new(Device::new(descriptor, facade, Preset::default())));
                    break (Registration::Added, event);
                }
                Entry::Occupied(mut occupied) => {
                    let unchanged = existing
                        .as_ref()
                        .is_some_and(|locked| Arc::ptr_eq(locked, occupied.get()));
                    if !unchanged {
                        continue;
                    }

                    let preset = occupied.get().preset();
                    let event = DeviceEvent::Superseded {
                        room: descriptor.room_name.clone(),
                        display_name: descriptor.display_name.clone(),
                        timestamp: now_millis(),
                    };
                    occupied.insert(Arc::new(Device::new(descriptor, facade, preset)));
                    break (Registration::Superseded, event);
                }
            }
        };

        log::info!("[Registry] {:?}: {:?}", registration, event);
        self.emitter.emit_device(event);
        registration
    }

    #[must_use]
    pub fn find_device(&self, room: &str) -> Option<Arc<Device>> {
        self.devices
            .get(&room_key(room))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Removes a device. Returns `false` if the room was not registered.
    pub fn remove_device(&self, room: &str) -> bool {
        let Some((_, device)) = self.devices.remove(&room_key(room)) else {
            return false;
        };
        log::info!("[Registry] Removed {}", device.room_name());
        self.emitter.emit_device(DeviceEvent::Removed {
            room: device.room_name().to_string(),
            timestamp: now_millis(),
        });
        true
    }

    /// Merges `update` into the room's preset. Returns `false` if not found.
    pub fn update_preset(&self, room: &str, update: PresetUpdate) -> bool {
        match self.find_device(room) {
            Some(device) => {
                device.update_preset(update);
                true
            }
            None => false,
        }
    }

    /// Resets the room's preset to the default.
    ///
    /// Returns `false` and changes nothing when the room is unknown or its
    /// preset is not armed.
    pub fn reset_preset(&self, room: &str) -> bool {
        self.find_device(room)
            .is_some_and(|device| device.reset_preset())
    }

    #[must_use]
    pub fn is_preset(&self, room: &str) -> bool {
        self.find_device(room)
            .is_some_and(|device| device.is_preset())
    }

    #[must_use]
    pub fn get_preset(&self, room: &str) -> Option<Preset> {
        self.find_device(room).map(|device| device.preset())
    }

    /// Registered room names, sorted.
    #[must_use]
    pub fn all_device_ids(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .devices
            .iter()
            .map(|entry| entry.value().room_name().to_string())
            .collect();
        rooms.sort();
        rooms
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// A bar replaces a different device that is not itself a bar.
fn supersedes(existing: &Device, descriptor: &DeviceDescriptor) -> bool {
    descriptor.is_home_theater_bar()
        && !existing.is_home_theater_bar()
        && existing.descriptor().udn != descriptor.udn
}

fn registered_event(descriptor: &DeviceDescriptor) -> DeviceEvent {
    DeviceEvent::Registered {
        room: descriptor.room_name.clone(),
        display_name: descriptor.display_name.clone(),
        host: descriptor.host.clone(),
        timestamp: now_millis(),
    }
}
