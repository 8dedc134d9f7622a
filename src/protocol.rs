//! Space-packet framing for the software bus.
//!
//! Every message on the bus starts with a 6-byte CCSDS primary header. Commands add a
//! 2-byte secondary header (function code + checksum), telemetry adds a 10-byte one
//! (time + spare). The message id is the stream id with the version bits dropped.

use core::fmt;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

pub const PRIMARY_HEADER_LEN: usize = 6;
pub const CMD_HEADER_LEN: usize = 8;
pub const TLM_HEADER_LEN: usize = 16;
pub const MAX_MESSAGE_SIZE: usize = 256;

const_assert!(PRIMARY_HEADER_LEN < CMD_HEADER_LEN);
const_assert!(CMD_HEADER_LEN < TLM_HEADER_LEN);
const_assert!(MAX_MESSAGE_SIZE - 7 <= u16::MAX as usize);

const STREAM_ID_MASK: u16 = 0x1FFF;
const TYPE_CMD_BIT: u16 = 0x1000;
const SEC_HDR_BIT: u16 = 0x0800;
const APID_MASK: u16 = 0x07FF;
const SEQ_FLAGS_UNSEGMENTED: u16 = 0xC000;
const SEQ_COUNT_MASK: u16 = 0x3FFF;
const FCN_CODE_MASK: u8 = 0x7F;

// Topic ids assigned to this application by the mission.
pub const CMD_TOPIC_ID: u16 = 0x97;
pub const WORK_TOPIC_ID: u16 = 0x98;
pub const SEND_HK_TOPIC_ID: u16 = 0x99;
pub const RES_TLM_TOPIC_ID: u16 = 0x98;
pub const HK_TLM_TOPIC_ID: u16 = 0x99;

pub const CMD_MID: MsgId = MsgId::command(CMD_TOPIC_ID);
pub const CMD_WORK_MID: MsgId = MsgId::command(WORK_TOPIC_ID);
pub const SEND_HK_MID: MsgId = MsgId::command(SEND_HK_TOPIC_ID);
pub const HK_TLM_MID: MsgId = MsgId::telemetry(HK_TLM_TOPIC_ID);
pub const RES_TLM_MID: MsgId = MsgId::telemetry(RES_TLM_TOPIC_ID);

/// Bus routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsgId(pub u16);

impl MsgId {
    pub const fn command(topic: u16) -> Self {
        Self(TYPE_CMD_BIT | SEC_HDR_BIT | (topic & APID_MASK))
    }

    pub const fn telemetry(topic: u16) -> Self {
        Self(SEC_HDR_BIT | (topic & APID_MASK))
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn is_command(self) -> bool {
        self.0 & TYPE_CMD_BIT != 0
    }

    pub const fn has_secondary_header(self) -> bool {
        self.0 & SEC_HDR_BIT != 0
    }

    pub const fn apid(self) -> u16 {
        self.0 & APID_MASK
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Ground command function codes understood on [`CMD_MID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    Noop = 0,
    ResetCounters = 1,
}

impl CommandCode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Noop),
            1 => Some(Self::ResetCounters),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Exact encoded size a well-formed command of this kind must have.
    pub const fn expected_length(self) -> usize {
        match self {
            // Both commands are header-only.
            Self::Noop | Self::ResetCounters => CMD_HEADER_LEN,
        }
    }
}

/// First-level routing decision for an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GroundCommand,
    ScheduledWork,
    HousekeepingRequest,
    Unknown(MsgId),
}

impl Route {
    pub fn of(msg_id: MsgId) -> Self {
        match msg_id {
            CMD_MID => Self::GroundCommand,
            CMD_WORK_MID => Self::ScheduledWork,
            SEND_HK_MID => Self::HousekeepingRequest,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message too short: {len} bytes, primary header needs 6")]
    TooShort { len: usize },
    #[error("message too large: {len} bytes")]
    TooLarge { len: usize },
    #[error("length field declares {declared} bytes but {actual} were received")]
    LengthFieldMismatch { declared: usize, actual: usize },
}

/// One inbound bus message, kept as raw bytes in a fixed frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    length: usize,
    bytes: [u8; MAX_MESSAGE_SIZE],
}

impl Envelope {
    /// Validate the primary header and take a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() < PRIMARY_HEADER_LEN {
            return Err(MessageError::TooShort { len: bytes.len() });
        }
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge { len: bytes.len() });
        }

        let declared = usize::from(u16::from_be_bytes([bytes[4], bytes[5]])) + 7;
        if declared != bytes.len() {
            return Err(MessageError::LengthFieldMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let mut frame = Self::empty();
        frame.length = bytes.len();
        frame.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(frame)
    }

    /// Build a command message with a secondary header and `payload`.
    pub fn command(msg_id: MsgId, fcn_code: u8, payload: &[u8]) -> Result<Self, MessageError> {
        let length = CMD_HEADER_LEN + payload.len();
        if length > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge { len: length });
        }

        let mut frame = Self::empty();
        frame.length = length;
        frame.write_primary_header(msg_id, 0);
        frame.bytes[6] = fcn_code & FCN_CODE_MASK;
        frame.bytes[CMD_HEADER_LEN..length].copy_from_slice(payload);
        frame.bytes[7] = frame.compute_checksum();
        Ok(frame)
    }

    /// Header-only command, as used by wakeup and housekeeping requests.
    pub fn header_only(msg_id: MsgId) -> Self {
        let mut frame = Self::empty();
        frame.length = CMD_HEADER_LEN;
        frame.write_primary_header(msg_id, 0);
        frame.bytes[7] = frame.compute_checksum();
        frame
    }

    fn empty() -> Self {
        Self {
            length: 0,
            bytes: [0; MAX_MESSAGE_SIZE],
        }
    }

    fn write_primary_header(&mut self, msg_id: MsgId, sequence: u16) {
        let stream_id = msg_id.value() & STREAM_ID_MASK;
        let seq = SEQ_FLAGS_UNSEGMENTED | (sequence & SEQ_COUNT_MASK);
        let length_field = (self.length - 7) as u16;
        self.bytes[0..2].copy_from_slice(&stream_id.to_be_bytes());
        self.bytes[2..4].copy_from_slice(&seq.to_be_bytes());
        self.bytes[4..6].copy_from_slice(&length_field.to_be_bytes());
    }

    // Checksum byte makes the XOR of the whole message 0xFF.
    fn compute_checksum(&self) -> u8 {
        let folded = self.bytes[..self.length]
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 7)
            .fold(0u8, |acc, (_, b)| acc ^ b);
        0xFF ^ folded
    }

    pub fn msg_id(&self) -> MsgId {
        MsgId(u16::from_be_bytes([self.bytes[0], self.bytes[1]]) & STREAM_ID_MASK)
    }

    /// Total size as declared by the primary header length field.
    pub fn size(&self) -> usize {
        usize::from(u16::from_be_bytes([self.bytes[4], self.bytes[5]])) + 7
    }

    /// Function code from the command secondary header, 0 when there is none.
    pub fn fcn_code(&self) -> u8 {
        if self.length >= CMD_HEADER_LEN && self.msg_id().has_secondary_header() {
            self.bytes[6] & FCN_CODE_MASK
        } else {
            0
        }
    }

    pub fn sequence_count(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]]) & SEQ_COUNT_MASK
    }

    pub fn has_valid_checksum(&self) -> bool {
        self.length >= CMD_HEADER_LEN
            && self.bytes[..self.length].iter().fold(0u8, |acc, b| acc ^ b) == 0xFF
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[CMD_HEADER_LEN.min(self.length)..self.length]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.length]
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("msg_id", &self.msg_id())
            .field("fcn_code", &self.fcn_code())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_ids_map_to_message_ids() {
        assert_eq!(CMD_MID.value(), 0x1897);
        assert_eq!(CMD_WORK_MID.value(), 0x1898);
        assert_eq!(SEND_HK_MID.value(), 0x1899);
        assert_eq!(HK_TLM_MID.value(), 0x0899);
        assert_eq!(RES_TLM_MID.value(), 0x0898);
        assert!(CMD_MID.is_command());
        assert!(!HK_TLM_MID.is_command());
    }

    #[test]
    fn test_command_frame_layout() {
        let frame = Envelope::command(CMD_MID, 1, &[]).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), CMD_HEADER_LEN);
        assert_eq!(&bytes[0..2], &[0x18, 0x97]);
        assert_eq!(&bytes[4..6], &[0x00, 0x01]); // 8 - 7
        assert_eq!(bytes[6], 1);
        assert!(frame.has_valid_checksum());
        assert_eq!(frame.size(), CMD_HEADER_LEN);
        assert_eq!(frame.fcn_code(), 1);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_from_bytes_rejects_bad_framing() {
        assert_eq!(
            Envelope::from_bytes(&[0x18, 0x97, 0xC0]).unwrap_err(),
            MessageError::TooShort { len: 3 }
        );

        // Declares 9 bytes, carries 8.
        let bytes = [0x18, 0x97, 0xC0, 0x00, 0x00, 0x02, 0x00, 0x00];
        assert_eq!(
            Envelope::from_bytes(&bytes).unwrap_err(),
            MessageError::LengthFieldMismatch { declared: 9, actual: 8 }
        );

        let oversized = [0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            Envelope::from_bytes(&oversized),
            Err(MessageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_from_bytes_keeps_declared_size() {
        let original = Envelope::command(CMD_MID, 0, &[0xAA, 0xBB]).unwrap();
        let parsed = Envelope::from_bytes(original.as_bytes()).unwrap();

        assert_eq!(parsed, original);
        assert_eq!(parsed.size(), CMD_HEADER_LEN + 2);
        assert_eq!(parsed.payload(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_route_lookup() {
        assert_eq!(Route::of(CMD_MID), Route::GroundCommand);
        assert_eq!(Route::of(CMD_WORK_MID), Route::ScheduledWork);
        assert_eq!(Route::of(SEND_HK_MID), Route::HousekeepingRequest);
        assert_eq!(Route::of(MsgId(0x1800)), Route::Unknown(MsgId(0x1800)));
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(CommandCode::from_code(0), Some(CommandCode::Noop));
        assert_eq!(CommandCode::from_code(1), Some(CommandCode::ResetCounters));
        assert_eq!(CommandCode::from_code(2), None);
        assert_eq!(CommandCode::Noop.expected_length(), CMD_HEADER_LEN);
    }
}
