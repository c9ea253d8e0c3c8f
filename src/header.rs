//! Header codec: short application header and the TP extension field.

use crate::error::{Result, TpError};

/// Size of the short application header in bytes.
pub const SHORT_HEADER_SIZE: usize = 8;

/// Size of the TP extension field in bytes.
pub const TP_HEADER_SIZE: usize = 4;

/// Size of the long header (short header + TP extension) in bytes.
pub const LONG_HEADER_SIZE: usize = SHORT_HEADER_SIZE + TP_HEADER_SIZE;

/// Offset of the message-type byte within the short header.
pub const MESSAGE_TYPE_OFFSET: usize = 6;

/// TP flag within the message-type byte (e.g. Request 0x00 -> TpRequest 0x20).
pub const TP_FLAG: u8 = 0x20;

/// Segment offsets and non-final payload lengths are multiples of this unit.
pub const SEGMENT_UNIT: usize = 16;

/// Protocol version carried in the short header (always 0x01).
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Check whether a raw frame carries a TP-segmented message.
///
/// Tests the TP flag of the message-type byte; the frame must hold at
/// least a short header.
pub fn frame_is_segmented(frame: &[u8]) -> bool {
    frame.len() >= SHORT_HEADER_SIZE && frame[MESSAGE_TYPE_OFFSET] & TP_FLAG != 0
}

/// Short application header (8 bytes, present on every frame).
///
/// ```text
/// +----------------+----------------+----------------+----------------+
/// |   Client ID (16 bits)   |  Session ID (16 bits)                   |
/// +----------------+----------------+----------------+----------------+
/// | Protocol Ver | Interface Ver | Message Type | Return Code         |
/// | (8 bits)     | (8 bits)      | (8 bits)     | (8 bits)            |
/// +----------------+----------------+----------------+----------------+
/// ```
///
/// The engine treats the message-type and return-code bytes opaquely apart
/// from the TP flag; this codec exists for collaborators building and
/// inspecting frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortHeader {
    /// Client ID.
    pub client_id: u16,
    /// Session ID.
    pub session_id: u16,
    /// Protocol version (should be 0x01).
    pub protocol_version: u8,
    /// Interface version.
    pub interface_version: u8,
    /// Message type (raw byte; bit 5 is the TP flag).
    pub message_type: u8,
    /// Return code (raw byte).
    pub return_code: u8,
}

impl ShortHeader {
    /// Create a new header with the given client and session IDs.
    pub fn new(client_id: u16, session_id: u16) -> Self {
        Self {
            client_id,
            session_id,
            protocol_version: PROTOCOL_VERSION,
            interface_version: 1,
            message_type: 0x00,
            return_code: 0x00,
        }
    }

    /// Check if the TP flag is set in the message-type byte.
    pub fn is_segmented(&self) -> bool {
        self.message_type & TP_FLAG != 0
    }

    /// Get the request ID (client_id << 16 | session_id).
    pub fn request_id(&self) -> u32 {
        (u32::from(self.client_id) << 16) | u32::from(self.session_id)
    }

    /// Parse a header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SHORT_HEADER_SIZE {
            return Err(TpError::FrameTooShort {
                expected: SHORT_HEADER_SIZE,
                actual: data.len(),
            });
        }

        Ok(Self {
            client_id: u16::from_be_bytes([data[0], data[1]]),
            session_id: u16::from_be_bytes([data[2], data[3]]),
            protocol_version: data[4],
            interface_version: data[5],
            message_type: data[6],
            return_code: data[7],
        })
    }

    /// Serialize the header to bytes.
    pub fn to_bytes(&self) -> [u8; SHORT_HEADER_SIZE] {
        let mut buf = [0u8; SHORT_HEADER_SIZE];

        buf[0..2].copy_from_slice(&self.client_id.to_be_bytes());
        buf[2..4].copy_from_slice(&self.session_id.to_be_bytes());
        buf[4] = self.protocol_version;
        buf[5] = self.interface_version;
        buf[6] = self.message_type;
        buf[7] = self.return_code;

        buf
    }
}

impl Default for ShortHeader {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// TP extension field (4 bytes after the short header on segmented frames).
///
/// Format:
/// ```text
/// +----------------+----------------+----------------+----------------+
/// |                    Offset (28 bits)              | Res(3) | M(1)  |
/// +----------------+----------------+----------------+----------------+
/// ```
///
/// - Offset: position in the original payload in 16-byte units
/// - Reserved: 3 bits, must be 0
/// - More flag: 1 bit (1 = more segments follow, 0 = last segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpHeader {
    /// Offset in 16-byte units (28 bits).
    pub offset: u32,
    /// More segments flag.
    pub more: bool,
}

impl TpHeader {
    /// Create a new TP header.
    pub fn new(offset: u32, more: bool) -> Self {
        Self { offset, more }
    }

    /// Create from byte offset (divides by 16).
    pub fn from_byte_offset(byte_offset: usize, more: bool) -> Self {
        Self {
            offset: (byte_offset / SEGMENT_UNIT) as u32,
            more,
        }
    }

    /// Get the actual byte offset (offset * 16).
    pub fn byte_offset(&self) -> usize {
        self.offset as usize * SEGMENT_UNIT
    }

    /// Parse a TP header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < TP_HEADER_SIZE {
            return Err(TpError::FrameTooShort {
                expected: TP_HEADER_SIZE,
                actual: data.len(),
            });
        }

        // Offset in the upper 28 bits, reserved 3 bits, more flag lowest bit.
        let value = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        Ok(Self {
            offset: value >> 4,
            more: value & 0x01 != 0,
        })
    }

    /// Serialize the TP header to bytes.
    pub fn to_bytes(&self) -> [u8; TP_HEADER_SIZE] {
        let value = (self.offset << 4) | u32::from(self.more);
        value.to_be_bytes()
    }
}

/// Encode a long header: the cached short header bytes verbatim with the
/// TP flag set, followed by the TP extension field.
///
/// Pure; inputs are in-range by construction of the caller.
pub fn encode_long_header(
    short: &[u8; SHORT_HEADER_SIZE],
    offset_units: u32,
    more: bool,
) -> [u8; LONG_HEADER_SIZE] {
    let mut buf = [0u8; LONG_HEADER_SIZE];

    buf[..SHORT_HEADER_SIZE].copy_from_slice(short);
    buf[MESSAGE_TYPE_OFFSET] |= TP_FLAG;
    buf[SHORT_HEADER_SIZE..].copy_from_slice(&TpHeader::new(offset_units, more).to_bytes());

    buf
}

/// Decode the offset/more field from the last 4 bytes of a long header.
pub fn decode_tp_fields(long_header: &[u8]) -> Result<TpHeader> {
    if long_header.len() < LONG_HEADER_SIZE {
        return Err(TpError::FrameTooShort {
            expected: LONG_HEADER_SIZE,
            actual: long_header.len(),
        });
    }

    TpHeader::from_bytes(&long_header[SHORT_HEADER_SIZE..LONG_HEADER_SIZE])
}
