//! Application state, lifecycle and the receive loop.

use crate::bench::Benchmark;
use crate::bus::{PipeId, PipeName, SoftwareBus, TelemetrySink};
use crate::clock::{Clock, TimeBaseId};
use crate::config::{AppConfig, ConfigError, DEFAULT_PIPE_DEPTH};
use crate::dispatch::{self, Handled};
use crate::error::InitError;
use crate::events::{EventId, EventSink, EventType};
use crate::protocol::{Envelope, CMD_MID, CMD_WORK_MID, SEND_HK_MID};
use crate::seed::SeedRegister;
use crate::telemetry::{HkTlm, ResultTlm};
use serde::{Deserialize, Serialize};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Status reported to the host after every pass of the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    AppRun,
    AppExit,
    AppError,
}

/// Everything the task owns. Handlers get it by `&mut` and nothing else touches it.
#[derive(Debug, Clone)]
pub struct AppData {
    pub cmd_counter: u8,
    pub err_counter: u8,
    pub hk_tlm: HkTlm,
    pub result_tlm: ResultTlm,
    pub seeds: SeedRegister,
    pub run_status: RunStatus,
    pub pipe_depth: u16,
    pub pipe_name: PipeName,
    pub time_base: TimeBaseId,
}

impl AppData {
    pub fn new() -> Self {
        Self {
            cmd_counter: 0,
            err_counter: 0,
            hk_tlm: HkTlm::new(),
            result_tlm: ResultTlm::new(),
            seeds: SeedRegister::default(),
            run_status: RunStatus::AppRun,
            pipe_depth: DEFAULT_PIPE_DEPTH,
            pipe_name: PipeName::new(),
            time_base: 0,
        }
    }
}

impl Default for AppData {
    fn default() -> Self {
        Self::new()
    }
}

/// Host collaborators borrowed for the duration of one dispatch.
pub struct Services<'a> {
    pub bench: &'a mut dyn Benchmark,
    pub clock: &'a dyn Clock,
    pub events: &'a mut dyn EventSink,
    pub telemetry: &'a mut dyn TelemetrySink,
}

#[derive(Debug)]
pub struct HuffApp {
    data: AppData,
    pipe: PipeId,
}

impl HuffApp {
    /// Register with the host: resolve the time base, create the command pipe and
    /// subscribe to every topic the app serves.
    pub fn init<B: SoftwareBus>(
        config: &AppConfig,
        bus: &mut B,
        clock: &dyn Clock,
        events: &mut dyn EventSink,
    ) -> Result<Self, InitError> {
        Self::try_init(config, bus, clock, events).map_err(|err| {
            tracing::error!(%err, "HUFF App init failed");
            err
        })
    }

    fn try_init<B: SoftwareBus>(
        config: &AppConfig,
        bus: &mut B,
        clock: &dyn Clock,
        events: &mut dyn EventSink,
    ) -> Result<Self, InitError> {
        config.validate()?;

        let mut data = AppData::new();
        data.pipe_depth = config.pipe_depth;
        data.pipe_name = PipeName::from(&config.pipe_name)
            .map_err(|_| ConfigError::InvalidPipeName(config.pipe_name.clone()))?;
        data.seeds = SeedRegister::new(config.initial_seeds);
        data.time_base = clock
            .lookup_time_base(&config.time_base_name)
            .ok_or_else(|| InitError::TimeBaseLookup {
                name: config.time_base_name.clone(),
            })?;

        events.register()?;

        let pipe = bus
            .create_pipe(data.pipe_depth, &data.pipe_name)
            .map_err(InitError::PipeCreation)?;
        for msg_id in [SEND_HK_MID, CMD_MID, CMD_WORK_MID] {
            bus.subscribe(msg_id, pipe)
                .map_err(|source| InitError::Subscription { msg_id, source })?;
        }

        events.send_fmt(
            EventId::InitInf,
            EventType::Information,
            format_args!("HUFF App Initialized. {APP_VERSION}"),
        );
        Ok(Self { data, pipe })
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AppData {
        &mut self.data
    }

    pub fn pipe(&self) -> PipeId {
        self.pipe
    }

    pub fn run_status(&self) -> RunStatus {
        self.data.run_status
    }

    pub fn is_running(&self) -> bool {
        self.data.run_status == RunStatus::AppRun
    }

    pub fn stop(&mut self) {
        if self.is_running() {
            self.data.run_status = RunStatus::AppExit;
        }
    }

    /// Dispatch one already-received envelope.
    pub fn task_pipe(&mut self, envelope: &Envelope, services: &mut Services<'_>) -> Handled {
        dispatch::task_pipe(&mut self.data, envelope, services)
    }

    /// Receive and process at most one envelope. `None` when the pipe is empty, the
    /// app is no longer running, or the read failed.
    pub fn poll<B: SoftwareBus>(
        &mut self,
        bus: &mut B,
        bench: &mut dyn Benchmark,
        clock: &dyn Clock,
        events: &mut dyn EventSink,
    ) -> Option<Handled> {
        if !self.is_running() {
            return None;
        }

        let envelope = match bus.receive(self.pipe) {
            Ok(envelope) => envelope,
            Err(nb::Error::WouldBlock) => return None,
            Err(nb::Error::Other(err)) => {
                events.send_fmt(
                    EventId::PipeErr,
                    EventType::Error,
                    format_args!("HUFF App: SB Pipe Read Error, App Will Exit ({err})"),
                );
                self.data.run_status = RunStatus::AppError;
                return None;
            }
        };

        let mut services = Services {
            bench,
            clock,
            events,
            telemetry: bus,
        };
        Some(self.task_pipe(&envelope, &mut services))
    }

    /// Poll until the pipe drains or the run status leaves `AppRun`. Returns how many
    /// envelopes were processed.
    pub fn run_until_idle<B: SoftwareBus>(
        &mut self,
        bus: &mut B,
        bench: &mut dyn Benchmark,
        clock: &dyn Clock,
        events: &mut dyn EventSink,
    ) -> usize {
        let mut processed = 0;
        while let Some(handled) = self.poll(bus, bench, clock, events) {
            tracing::trace!(?handled, "envelope processed");
            processed += 1;
        }
        processed
    }
}
