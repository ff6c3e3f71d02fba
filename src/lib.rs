//! Serial protocol engine for multi-channel biosignal acquisition devices.
//!
//! The device streams framed packets over a serial line:
//!
//! ```text
//! 0xFF 0xFF <type> <length> <payload...>
//! ```
//!
//! - CONFIG (`0x01`): serial number (`u32` LE) and channel count (`u8`)
//! - CONTROL (`0x02`): acknowledgement of a command, passed through untouched
//! - DATA (`0x03`): one `<scale: u8> <value: i16 LE>` record per channel
//!
//! [`DeviceHost`] runs the engine: an I/O thread frames and decodes the byte
//! stream into a bounded queue, and a dispatch thread tracks the device
//! identity and batches samples per channel (15 values per batch) for
//! registered [`ChannelListener`]s. Commands (GET_CONFIG, START/STOP
//! transmission, REBOOT) go out through [`CommandSender`].
//!
//! # Sample scale
//!
//! Each data record carries a scale code next to its value. It is decoded
//! and exposed on [`Sample`] but not applied; listeners receive raw values.

mod batcher;
mod dispatcher;
mod errors;
mod framing;
mod host;
pub mod logging;
mod packet;
mod queue;
pub mod transport;

pub use batcher::{listener_ref, ChannelBuffer, ChannelListener, ListenerRef, SampleBatcher, BATCH_SIZE};
pub use dispatcher::{Device, DeviceEvents, NoEvents, PacketDispatcher, Registration, SharedDevice};
pub use errors::*;
pub use framing::{Frame, FrameSynchronizer, HEADER_LEN, MARKER};
pub use host::{CommandSender, DeviceHost, HostConfig, LinkStats};
pub use packet::{Command, Packet, PacketType, Sample, DATA_RECORD_LEN, MAX_CHANNELS};
pub use queue::InboundQueue;
pub use transport::{ByteStream, LinkConfig, SerialTransport, Transport};
