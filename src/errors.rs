use std::io;
use thiserror::Error;

use crate::packet::PacketType;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("serial link is not connected")]
    NotConnected,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("channel {channel} out of range (device has {channel_count} channels)")]
    ChannelOutOfRange { channel: u8, channel_count: u8 },
    #[error("inbound queue closed")]
    QueueClosed,
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Failures while turning a frame into a typed packet (or a packet into a frame).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown packet type: {0:#04X}")]
    UnknownPacketType(u8),
    #[error("malformed {kind:?} payload ({len} bytes): {reason}")]
    MalformedPayload {
        kind: PacketType,
        len: usize,
        reason: &'static str,
    },
    #[error("invalid device config: serial={serial_number}, channels={channel_count}")]
    InvalidConfig { serial_number: u32, channel_count: u8 },
    #[error("payload too long for a frame: {0} bytes")]
    PayloadTooLong(usize),
}

pub type Result<T> = std::result::Result<T, DriverError>;
