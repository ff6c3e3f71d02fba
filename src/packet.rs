//! Typed packets carried inside frames, and outbound command encoding.

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::ProtocolError;
use crate::framing::{Frame, MARKER};

// ============================================================================
// Constants
// ============================================================================

/// Config payload: `<serial: u32 LE> <channels: u8>`.
pub const CONFIG_PAYLOAD_LEN: usize = 5;

/// Data record: `<scale: u8> <value: i16 LE>`.
pub const DATA_RECORD_LEN: usize = 3;

/// Highest channel count a device may report.
pub const MAX_CHANNELS: u8 = 8;

// Outbound control codes
const CMD_GET_CONFIG: u8 = 0x01;
const CMD_START_TRANSMISSION: u8 = 0x02;
const CMD_STOP_TRANSMISSION: u8 = 0x03;
const CMD_REBOOT: u8 = 0x04;

// ============================================================================
// Packet Types
// ============================================================================

/// Frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Config = 0x01,
    Control = 0x02,
    Data = 0x03,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PacketType::Config),
            0x02 => Ok(PacketType::Control),
            0x03 => Ok(PacketType::Data),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// One channel sample captured at a device tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Channel index (position of the record in the data payload).
    pub channel: u8,
    /// Gain/scale code reported by the device. Not applied to `value`.
    pub scale: u8,
    pub value: i32,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Device identity; sent once per connection and on GET_CONFIG.
    Config { serial_number: u32, channel_count: u8 },
    /// Acknowledgement/status echo of a command; forwarded as-is.
    Control { raw: Vec<u8> },
    /// Samples for one or more channels at a single tick, in payload order.
    Data { samples: Vec<Sample> },
}

impl Packet {
    pub fn kind(&self) -> PacketType {
        match self {
            Packet::Config { .. } => PacketType::Config,
            Packet::Control { .. } => PacketType::Control,
            Packet::Data { .. } => PacketType::Data,
        }
    }

    /// Decode a frame's payload according to its type byte.
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        match PacketType::try_from(frame.kind())? {
            PacketType::Config => decode_config(frame.payload()),
            PacketType::Control => Ok(Packet::Control {
                raw: frame.payload().to_vec(),
            }),
            PacketType::Data => decode_data(frame.payload()),
        }
    }

    /// Encode into a frame, using the same layout the decoder accepts.
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let payload = match self {
            Packet::Config {
                serial_number,
                channel_count,
            } => {
                let mut buf = vec![0u8; CONFIG_PAYLOAD_LEN];
                LittleEndian::write_u32(&mut buf[..4], *serial_number);
                buf[4] = *channel_count;
                buf
            }
            Packet::Control { raw } => raw.clone(),
            Packet::Data { samples } => {
                let mut buf = vec![0u8; samples.len() * DATA_RECORD_LEN];
                let records = buf.chunks_exact_mut(DATA_RECORD_LEN);
                for (sample, record) in samples.iter().zip(records) {
                    let value = i16::try_from(sample.value).map_err(|_| {
                        ProtocolError::MalformedPayload {
                            kind: PacketType::Data,
                            len: samples.len() * DATA_RECORD_LEN,
                            reason: "sample value does not fit in 16 bits",
                        }
                    })?;
                    record[0] = sample.scale;
                    LittleEndian::write_i16(&mut record[1..], value);
                }
                buf
            }
        };
        Frame::new(self.kind() as u8, payload)
    }
}

fn decode_config(payload: &[u8]) -> Result<Packet, ProtocolError> {
    if payload.len() != CONFIG_PAYLOAD_LEN {
        return Err(ProtocolError::MalformedPayload {
            kind: PacketType::Config,
            len: payload.len(),
            reason: "expected 4-byte serial number and 1-byte channel count",
        });
    }

    let serial_number = LittleEndian::read_u32(&payload[..4]);
    let channel_count = payload[4];

    if serial_number == 0 || channel_count == 0 || channel_count > MAX_CHANNELS {
        return Err(ProtocolError::InvalidConfig {
            serial_number,
            channel_count,
        });
    }

    Ok(Packet::Config {
        serial_number,
        channel_count,
    })
}

fn decode_data(payload: &[u8]) -> Result<Packet, ProtocolError> {
    if payload.len() % DATA_RECORD_LEN != 0 {
        return Err(ProtocolError::MalformedPayload {
            kind: PacketType::Data,
            len: payload.len(),
            reason: "length is not a multiple of the record width",
        });
    }

    let samples = payload
        .chunks_exact(DATA_RECORD_LEN)
        .enumerate()
        .map(|(index, record)| Sample {
            channel: index as u8,
            scale: record[0],
            value: i32::from(LittleEndian::read_i16(&record[1..])),
        })
        .collect();

    Ok(Packet::Data { samples })
}

// ============================================================================
// Outbound Commands
// ============================================================================

/// Control commands the host can send to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetConfig,
    StartTransmission,
    StopTransmission,
    Reboot,
}

impl Command {
    /// Wire code carried in the control frame's payload.
    pub fn code(self) -> u8 {
        match self {
            Command::GetConfig => CMD_GET_CONFIG,
            Command::StartTransmission => CMD_START_TRANSMISSION,
            Command::StopTransmission => CMD_STOP_TRANSMISSION,
            Command::Reboot => CMD_REBOOT,
        }
    }

    /// Full wire bytes: a CONTROL frame holding the single code byte.
    pub fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MARKER.len() + 3);
        out.extend_from_slice(&MARKER);
        out.extend_from_slice(&[PacketType::Control as u8, 1, self.code()]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: u8, payload: &[u8]) -> Frame {
        Frame::new(kind, payload.to_vec()).unwrap()
    }

    #[test]
    fn decodes_config() {
        let packet = Packet::decode(&frame(0x01, &[7, 0, 0, 0, 2])).unwrap();
        assert_eq!(
            packet,
            Packet::Config {
                serial_number: 7,
                channel_count: 2
            }
        );
    }

    #[test]
    fn config_serial_is_little_endian() {
        let packet = Packet::decode(&frame(0x01, &[0x78, 0x56, 0x34, 0x12, 8])).unwrap();
        assert_eq!(
            packet,
            Packet::Config {
                serial_number: 0x1234_5678,
                channel_count: 8
            }
        );
    }

    #[test]
    fn rejects_short_config() {
        let err = Packet::decode(&frame(0x01, &[7, 0, 0])).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload {
                kind: PacketType::Config,
                len: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_config() {
        assert_eq!(
            Packet::decode(&frame(0x01, &[0, 0, 0, 0, 2])).unwrap_err(),
            ProtocolError::InvalidConfig {
                serial_number: 0,
                channel_count: 2
            }
        );
        assert_eq!(
            Packet::decode(&frame(0x01, &[1, 0, 0, 0, 9])).unwrap_err(),
            ProtocolError::InvalidConfig {
                serial_number: 1,
                channel_count: 9
            }
        );
    }

    #[test]
    fn control_payload_passes_through() {
        let packet = Packet::decode(&frame(0x02, &[0x02, 0xAB])).unwrap();
        assert_eq!(
            packet,
            Packet::Control {
                raw: vec![0x02, 0xAB]
            }
        );
        assert_eq!(
            Packet::decode(&frame(0x02, &[])).unwrap(),
            Packet::Control { raw: vec![] }
        );
    }

    #[test]
    fn decodes_data_records_in_order() {
        // ch0: scale 1, 100; ch1: scale 2, -2; ch2: scale 0, 0x0201
        let payload = [1, 100, 0, 2, 0xFE, 0xFF, 0, 0x01, 0x02];
        let Packet::Data { samples } = Packet::decode(&frame(0x03, &payload)).unwrap() else {
            panic!("expected data packet");
        };
        assert_eq!(
            samples,
            vec![
                Sample { channel: 0, scale: 1, value: 100 },
                Sample { channel: 1, scale: 2, value: -2 },
                Sample { channel: 2, scale: 0, value: 0x0201 },
            ]
        );
    }

    #[test]
    fn rejects_ragged_data_payload() {
        let err = Packet::decode(&frame(0x03, &[1, 2, 3, 4])).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload {
                kind: PacketType::Data,
                len: 4,
                ..
            }
        ));
    }

    #[test]
    fn unknown_type_is_reported() {
        assert_eq!(
            Packet::decode(&frame(0x09, &[1])).unwrap_err(),
            ProtocolError::UnknownPacketType(0x09)
        );
    }

    #[test]
    fn encoded_packets_decode_back() {
        let config = Packet::Config {
            serial_number: 0x0102_0304,
            channel_count: 3,
        };
        let frame = config.to_frame().unwrap();
        assert_eq!(frame.payload(), &[0x04, 0x03, 0x02, 0x01, 3]);
        assert_eq!(Packet::decode(&frame).unwrap(), config);

        let data = Packet::Data {
            samples: vec![
                Sample { channel: 0, scale: 2, value: -300 },
                Sample { channel: 1, scale: 0, value: 7 },
            ],
        };
        let frame = data.to_frame().unwrap();
        assert_eq!(frame.payload(), &[2, 0xD4, 0xFE, 0, 7, 0]);
        assert_eq!(Packet::decode(&frame).unwrap(), data);
    }

    #[test]
    fn data_value_must_fit_wire_width() {
        let packet = Packet::Data {
            samples: vec![Sample { channel: 0, scale: 0, value: 40_000 }],
        };
        assert!(packet.to_frame().is_err());
    }

    #[test]
    fn command_wire_bytes() {
        assert_eq!(Command::GetConfig.encode(), vec![0xFF, 0xFF, 0x02, 0x01, 0x01]);
        assert_eq!(Command::StartTransmission.encode(), vec![0xFF, 0xFF, 0x02, 0x01, 0x02]);
        assert_eq!(Command::StopTransmission.encode(), vec![0xFF, 0xFF, 0x02, 0x01, 0x03]);
        assert_eq!(Command::Reboot.encode(), vec![0xFF, 0xFF, 0x02, 0x01, 0x04]);
    }
}
