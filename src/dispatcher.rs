//! Packet dispatch: device identity tracking and sample fan-out.

use std::sync::{Arc, RwLock};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::batcher::{ListenerRef, SampleBatcher};
use crate::errors::{DriverError, ProtocolError};
use crate::packet::{Packet, Sample};

/// Identity of the connected device, as reported by its config packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial_number: u32,
    pub channel_count: u8,
}

/// Application-level hooks for device events.
///
/// All methods default to no-ops. Identification and control acks are
/// delivered on the dispatch thread; decode errors on the I/O thread.
pub trait DeviceEvents: Send + Sync {
    /// A config packet arrived (fired for every config packet).
    fn on_device_identified(&self, _serial_number: u32, _channel_count: u8) {}

    /// A control packet arrived; the payload is not interpreted.
    fn on_control_ack(&self, _raw: &[u8]) {}

    /// A frame could not be decoded and was dropped.
    fn on_decode_error(&self, _error: &ProtocolError) {}

    /// The link failed and the host is now disconnected.
    fn on_link_lost(&self, _error: &DriverError) {}

    /// An active recording was ended because transmission stopped.
    fn on_recording_stopped(&self) {}
}

/// Hooks that ignore every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl DeviceEvents for NoEvents {}

/// Device snapshot shared with application threads (written only by the dispatcher).
pub type SharedDevice = Arc<RwLock<Option<Device>>>;

/// A listener change queued by an application thread.
///
/// Tagged with the serial number it was validated against; it is dropped if
/// a different device is identified before the dispatcher applies it.
pub struct Registration {
    pub serial_number: u32,
    pub channel: u8,
    pub listener: Option<ListenerRef>,
}

/// Interprets decoded packets in order. Owns the channel buffers.
pub struct PacketDispatcher {
    device: Option<Device>,
    batcher: SampleBatcher,
    events: Arc<dyn DeviceEvents>,
    registrations: Receiver<Registration>,
    shared: SharedDevice,
    dropped_before_config: u64,
}

impl PacketDispatcher {
    pub fn new(
        events: Arc<dyn DeviceEvents>,
        registrations: Receiver<Registration>,
        shared: SharedDevice,
        batch_size: usize,
    ) -> Self {
        Self {
            device: None,
            batcher: SampleBatcher::new(0, batch_size),
            events,
            registrations,
            shared,
            dropped_before_config: 0,
        }
    }

    pub fn device(&self) -> Option<Device> {
        self.device
    }

    pub fn batcher(&self) -> &SampleBatcher {
        &self.batcher
    }

    /// Data packets ignored because no device had been identified yet.
    pub fn dropped_before_config(&self) -> u64 {
        self.dropped_before_config
    }

    /// Apply listener registrations queued since the last packet.
    pub fn apply_registrations(&mut self) {
        for registration in self.registrations.try_iter() {
            let Registration {
                serial_number,
                channel,
                listener,
            } = registration;
            if self.device.map(|d| d.serial_number) != Some(serial_number) {
                debug!(
                    "listener registration for channel {} dropped: device serial={} is gone",
                    channel, serial_number
                );
                continue;
            }
            let registering = listener.is_some();
            if !self.batcher.set_listener(channel, listener) {
                warn!(
                    "listener registration for channel {} ignored: device has {} channels",
                    channel,
                    self.batcher.channel_count()
                );
            } else if registering {
                debug!("listener registered on channel {}", channel);
            } else {
                debug!("listener cleared on channel {}", channel);
            }
        }
    }

    /// Handle one packet. Never fails; bad input is logged and skipped.
    pub fn dispatch(&mut self, packet: Packet) {
        self.apply_registrations();

        match packet {
            Packet::Config {
                serial_number,
                channel_count,
            } => self.on_config(serial_number, channel_count),
            Packet::Control { raw } => self.events.on_control_ack(&raw),
            Packet::Data { samples } => self.on_data(&samples),
        }
    }

    fn on_config(&mut self, serial_number: u32, channel_count: u8) {
        let changed = self
            .device
            .map_or(true, |d| d.serial_number != serial_number);

        if changed {
            let device = Device {
                serial_number,
                channel_count,
            };
            info!(
                "device identified: serial={}, channels={}",
                serial_number, channel_count
            );
            self.device = Some(device);
            self.batcher.reset(channel_count);
            match self.shared.write() {
                Ok(mut shared) => *shared = Some(device),
                Err(poisoned) => *poisoned.into_inner() = Some(device),
            }
        } else {
            debug!("config re-sent by device serial={}", serial_number);
        }

        self.events.on_device_identified(serial_number, channel_count);
    }

    fn on_data(&mut self, samples: &[Sample]) {
        let Some(device) = self.device else {
            self.dropped_before_config += 1;
            return;
        };

        for sample in samples {
            if sample.channel < device.channel_count {
                self.batcher.append(sample.channel, sample.value);
            }
        }
    }
}
