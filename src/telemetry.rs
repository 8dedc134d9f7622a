use crate::protocol::{MsgId, HK_TLM_MID, MAX_MESSAGE_SIZE, RES_TLM_MID, TLM_HEADER_LEN};
use crate::report::ResultText;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

pub const RESULT_STRING_LEN: usize = 128;
pub const HK_PAYLOAD_LEN: usize = 4;
pub const HK_TLM_LEN: usize = TLM_HEADER_LEN + HK_PAYLOAD_LEN;
pub const RESULT_TLM_LEN: usize = TLM_HEADER_LEN + RESULT_STRING_LEN;

const_assert!(HK_TLM_LEN <= MAX_MESSAGE_SIZE);
const_assert!(RESULT_TLM_LEN <= MAX_MESSAGE_SIZE);

const SEQ_FLAGS_UNSEGMENTED: u16 = 0xC000;
const SEQ_COUNT_MASK: u16 = 0x3FFF;

pub type ResultField = ResultText<RESULT_STRING_LEN>;
pub type PacketBytes = Vec<u8, MAX_MESSAGE_SIZE>;

/// Seconds plus 1/65536 s subseconds, as carried in the telemetry secondary header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusTime {
    pub seconds: u32,
    pub subseconds: u16,
}

impl BusTime {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: (ms / 1000) as u32,
            subseconds: ((ms % 1000) * 65536 / 1000) as u16,
        }
    }

    pub fn to_millis(self) -> u64 {
        u64::from(self.seconds) * 1000 + (u64::from(self.subseconds) * 1000 + 32768) / 65536
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryHeader {
    pub msg_id: MsgId,
    pub sequence: u16,
    pub time: BusTime,
}

impl TelemetryHeader {
    pub const fn new(msg_id: MsgId) -> Self {
        Self {
            msg_id,
            sequence: 0,
            time: BusTime {
                seconds: 0,
                subseconds: 0,
            },
        }
    }

    pub fn stamp(&mut self, now_ms: u64) {
        self.time = BusTime::from_millis(now_ms);
    }

    fn encode(&self, total_len: usize) -> [u8; TLM_HEADER_LEN] {
        let mut out = [0u8; TLM_HEADER_LEN];
        let seq = SEQ_FLAGS_UNSEGMENTED | (self.sequence & SEQ_COUNT_MASK);
        let length_field = (total_len - 7) as u16;
        out[0..2].copy_from_slice(&self.msg_id.value().to_be_bytes());
        out[2..4].copy_from_slice(&seq.to_be_bytes());
        out[4..6].copy_from_slice(&length_field.to_be_bytes());
        out[6..10].copy_from_slice(&self.time.seconds.to_be_bytes());
        out[10..12].copy_from_slice(&self.time.subseconds.to_be_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HkPayload {
    pub command_error_counter: u8,
    pub command_counter: u8,
    pub spare: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HkTlm {
    pub header: TelemetryHeader,
    pub payload: HkPayload,
}

impl HkTlm {
    pub const fn new() -> Self {
        Self {
            header: TelemetryHeader::new(HK_TLM_MID),
            payload: HkPayload {
                command_error_counter: 0,
                command_counter: 0,
                spare: [0; 2],
            },
        }
    }

    pub fn to_bytes(&self) -> [u8; HK_TLM_LEN] {
        let mut out = [0u8; HK_TLM_LEN];
        out[..TLM_HEADER_LEN].copy_from_slice(&self.header.encode(HK_TLM_LEN));
        out[TLM_HEADER_LEN] = self.payload.command_error_counter;
        out[TLM_HEADER_LEN + 1] = self.payload.command_counter;
        out[TLM_HEADER_LEN + 2..].copy_from_slice(&self.payload.spare);
        out
    }
}

impl Default for HkTlm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultTlm {
    pub header: TelemetryHeader,
    pub payload: ResultField,
}

impl ResultTlm {
    pub const fn new() -> Self {
        Self {
            header: TelemetryHeader::new(RES_TLM_MID),
            payload: ResultText::new(),
        }
    }

    pub fn to_bytes(&self) -> [u8; RESULT_TLM_LEN] {
        let mut out = [0u8; RESULT_TLM_LEN];
        out[..TLM_HEADER_LEN].copy_from_slice(&self.header.encode(RESULT_TLM_LEN));
        out[TLM_HEADER_LEN..].copy_from_slice(self.payload.as_bytes());
        out
    }
}

impl Default for ResultTlm {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound telemetry handed to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryPacket {
    Housekeeping(HkTlm),
    Result(ResultTlm),
}

impl TelemetryPacket {
    pub fn header(&self) -> &TelemetryHeader {
        match self {
            Self::Housekeeping(tlm) => &tlm.header,
            Self::Result(tlm) => &tlm.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut TelemetryHeader {
        match self {
            Self::Housekeeping(tlm) => &mut tlm.header,
            Self::Result(tlm) => &mut tlm.header,
        }
    }

    pub fn msg_id(&self) -> MsgId {
        self.header().msg_id
    }

    pub fn to_bytes(&self) -> PacketBytes {
        let mut out = PacketBytes::new();
        // Both packet sizes are checked against MAX_MESSAGE_SIZE at compile time.
        let _ = match self {
            Self::Housekeeping(tlm) => out.extend_from_slice(&tlm.to_bytes()),
            Self::Result(tlm) => out.extend_from_slice(&tlm.to_bytes()),
        };
        out
    }
}
