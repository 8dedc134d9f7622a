//! Ground link frames exchanged with `huff-app` as newline-delimited JSON.

use crate::protocol::{
    CommandCode, Envelope, MessageError, MsgId, CMD_MID, CMD_WORK_MID, SEND_HK_MID, TLM_HEADER_LEN,
};
use crate::report::verify_line;
use crate::telemetry::TelemetryPacket;
use serde::{Deserialize, Serialize};

/// Uplink request from a ground client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroundRequest {
    /// Build a command packet on the server side.
    Command {
        msg_id: MsgId,
        #[serde(default)]
        fcn_code: u8,
        #[serde(default, with = "serde_bytes")]
        payload: Vec<u8>,
    },
    /// Publish these bytes as-is after framing checks.
    Raw {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
}

impl GroundRequest {
    pub fn ground_command(code: CommandCode) -> Self {
        Self::Command {
            msg_id: CMD_MID,
            fcn_code: code.code(),
            payload: Vec::new(),
        }
    }

    pub fn noop() -> Self {
        Self::ground_command(CommandCode::Noop)
    }

    pub fn reset_counters() -> Self {
        Self::ground_command(CommandCode::ResetCounters)
    }

    pub fn send_hk() -> Self {
        Self::Command {
            msg_id: SEND_HK_MID,
            fcn_code: 0,
            payload: Vec::new(),
        }
    }

    pub fn run() -> Self {
        Self::Command {
            msg_id: CMD_WORK_MID,
            fcn_code: 0,
            payload: Vec::new(),
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, MessageError> {
        match self {
            Self::Command {
                msg_id,
                fcn_code,
                payload,
            } => Envelope::command(*msg_id, *fcn_code, payload),
            Self::Raw { bytes } => Envelope::from_bytes(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundReply {
    pub accepted: bool,
    pub msg_id: Option<MsgId>,
    /// Pipes the message was delivered to.
    pub delivered: usize,
    pub error: Option<String>,
}

impl GroundReply {
    pub fn accepted(msg_id: MsgId, delivered: usize) -> Self {
        Self {
            accepted: true,
            msg_id: Some(msg_id),
            delivered,
            error: None,
        }
    }

    pub fn rejected(error: impl ToString) -> Self {
        Self {
            accepted: false,
            msg_id: None,
            delivered: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameBody {
    Housekeeping {
        command_counter: u8,
        command_error_counter: u8,
    },
    Result {
        report: String,
        checksum_ok: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub msg_id: MsgId,
    pub sequence: u16,
    pub time_ms: u64,
    pub body: FrameBody,
    #[serde(with = "serde_bytes")]
    pub raw: Vec<u8>,
}

impl TelemetryFrame {
    pub fn from_packet(packet: &TelemetryPacket) -> Self {
        let header = packet.header();
        let body = match packet {
            TelemetryPacket::Housekeeping(hk) => FrameBody::Housekeeping {
                command_counter: hk.payload.command_counter,
                command_error_counter: hk.payload.command_error_counter,
            },
            TelemetryPacket::Result(result) => {
                let report = result.payload.as_str();
                FrameBody::Result {
                    checksum_ok: verify_line(report),
                    report: report.to_string(),
                }
            }
        };

        Self {
            msg_id: header.msg_id,
            sequence: header.sequence,
            time_ms: header.time.to_millis(),
            body,
            raw: packet.to_bytes().to_vec(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        self.raw.get(TLM_HEADER_LEN..).unwrap_or_default()
    }
}

/// Everything the server writes to a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Downlink {
    Reply(GroundReply),
    Telemetry(TelemetryFrame),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CMD_HEADER_LEN;
    use crate::telemetry::{HkTlm, ResultTlm};

    #[test]
    fn test_request_json_shape() {
        let json = serde_json::to_string(&GroundRequest::noop()).unwrap();
        assert_eq!(json, r#"{"type":"command","msg_id":6295,"fcn_code":0,"payload":[]}"#);

        let parsed: GroundRequest =
            serde_json::from_str(r#"{"type":"command","msg_id":6295,"fcn_code":1}"#).unwrap();
        assert_eq!(parsed, GroundRequest::reset_counters());
    }

    #[test]
    fn test_raw_request_is_framing_checked() {
        let good = Envelope::command(CMD_MID, 0, &[]).unwrap();
        let request = GroundRequest::Raw {
            bytes: good.as_bytes().to_vec(),
        };
        assert_eq!(request.to_envelope().unwrap().size(), CMD_HEADER_LEN);

        let bad = GroundRequest::Raw { bytes: vec![0x18, 0x97] };
        assert!(bad.to_envelope().is_err());
    }

    #[test]
    fn test_frame_from_result_packet_checks_report() {
        let mut tlm = ResultTlm::new();
        tlm.payload
            .set("$HUNU,1000,01-02,50,00000000,1234,03,ABCD,5678*2D")
            .unwrap();
        let frame = TelemetryFrame::from_packet(&TelemetryPacket::Result(tlm));

        match &frame.body {
            FrameBody::Result { report, checksum_ok } => {
                assert!(report.starts_with("$HUNU,1000"));
                assert!(*checksum_ok);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(frame.payload().len(), 128);
    }

    #[test]
    fn test_downlink_round_trips_through_json() {
        let frame = TelemetryFrame::from_packet(&TelemetryPacket::Housekeeping(HkTlm::new()));
        let line = serde_json::to_string(&Downlink::Telemetry(frame.clone())).unwrap();
        let parsed: Downlink = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, Downlink::Telemetry(frame));
    }
}
