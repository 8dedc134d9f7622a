//! Two-level message routing: topic first, then function code for ground commands.

use crate::app::{AppData, Services};
use crate::cmds::{self, RunSummary};
use crate::error::AppError;
use crate::events::{EventId, EventType};
use crate::protocol::{CommandCode, Envelope, Route};

/// Outcome of one dispatch. Rejections have already been counted and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Noop,
    ResetCounters,
    Housekeeping,
    Run(RunSummary),
    Rejected(AppError),
}

impl Handled {
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub fn task_pipe(data: &mut AppData, envelope: &Envelope, services: &mut Services<'_>) -> Handled {
    match Route::of(envelope.msg_id()) {
        Route::GroundCommand => process_ground_command(data, envelope, services),
        Route::ScheduledWork => Handled::Run(cmds::run(data, services)),
        Route::HousekeepingRequest => {
            cmds::send_hk(data, services);
            Handled::Housekeeping
        }
        Route::Unknown(msg_id) => reject(data, services, AppError::UnknownTopic { msg_id }),
    }
}

pub fn process_ground_command(
    data: &mut AppData,
    envelope: &Envelope,
    services: &mut Services<'_>,
) -> Handled {
    let msg_id = envelope.msg_id();
    let code = envelope.fcn_code();

    let Some(command) = CommandCode::from_code(code) else {
        return reject(data, services, AppError::UnknownCommandCode { msg_id, code });
    };

    if let Err(err) = verify_length(data, envelope, command.expected_length(), services) {
        return Handled::Rejected(err);
    }

    match command {
        CommandCode::Noop => {
            cmds::noop(data, services);
            Handled::Noop
        }
        CommandCode::ResetCounters => {
            cmds::reset_counters(data, services);
            Handled::ResetCounters
        }
    }
}

/// Compare the declared message size with `expected`. A mismatch is reported and
/// counted here, so the caller only has to skip the handler.
pub fn verify_length(
    data: &mut AppData,
    envelope: &Envelope,
    expected: usize,
    services: &mut Services<'_>,
) -> Result<(), AppError> {
    let actual = envelope.size();
    if actual == expected {
        return Ok(());
    }

    let err = AppError::LengthMismatch {
        msg_id: envelope.msg_id(),
        fcn_code: envelope.fcn_code(),
        actual,
        expected,
    };
    record_error(data, services, err);
    Err(err)
}

fn reject(data: &mut AppData, services: &mut Services<'_>, err: AppError) -> Handled {
    record_error(data, services, err);
    Handled::Rejected(err)
}

fn record_error(data: &mut AppData, services: &mut Services<'_>, err: AppError) {
    let id = match err {
        AppError::LengthMismatch { .. } => EventId::CmdLenErr,
        AppError::UnknownCommandCode { .. } => EventId::CcErr,
        AppError::UnknownTopic { .. } => EventId::MidErr,
        AppError::BenchmarkNonSuccessStatus { .. } | AppError::ReportTruncated { .. } => return,
    };
    services
        .events
        .send_fmt(id, EventType::Error, format_args!("{err}"));
    if err.counts_as_command_error() {
        data.err_counter = data.err_counter.wrapping_add(1);
    }
}
