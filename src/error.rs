//! Error kinds raised by the application core and its initialization.
//!
//! None of the [`AppError`] kinds stop the task: the router reports them as
//! [`Handled::Rejected`](crate::dispatch::Handled::Rejected) after logging and counting.
//! [`InitError`] is the only path to a fatal run status.

use crate::bus::BusError;
use crate::config::ConfigError;
use crate::events::EventError;
use crate::protocol::MsgId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid msg length: ID = {msg_id}, CC = {fcn_code}, Len = {actual}, Expected = {expected}")]
    LengthMismatch {
        msg_id: MsgId,
        fcn_code: u8,
        actual: usize,
        expected: usize,
    },
    #[error("invalid ground command code: ID = {msg_id}, CC = {code}")]
    UnknownCommandCode { msg_id: MsgId, code: u8 },
    #[error("invalid command packet, MID = {msg_id}")]
    UnknownTopic { msg_id: MsgId },
    #[error("benchmark failed with status 0x{status:08x}")]
    BenchmarkNonSuccessStatus { status: u32 },
    #[error("report truncated from {len} bytes to fit {capacity}")]
    ReportTruncated { len: usize, capacity: usize },
}

impl AppError {
    /// Whether this kind is charged to the command error counter.
    pub const fn counts_as_command_error(&self) -> bool {
        matches!(
            self,
            Self::LengthMismatch { .. } | Self::UnknownCommandCode { .. } | Self::UnknownTopic { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("time base '{name}' not found")]
    TimeBaseLookup { name: alloc::string::String },
    #[error("error registering events: {0}")]
    EventRegistration(#[from] EventError),
    #[error("error creating pipe: {0}")]
    PipeCreation(BusError),
    #[error("error subscribing to {msg_id}: {source}")]
    Subscription { msg_id: MsgId, source: BusError },
}
