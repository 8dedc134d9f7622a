#![allow(dead_code)]

use huffapp::bench::{BenchOutcome, Benchmark};
use huffapp::dispatch::{self, Handled};
use huffapp::protocol::Envelope;
use huffapp::{AppData, EventLog, LocalBus, ManualClock, Services, TelemetryPacket};
use std::collections::VecDeque;

/// Benchmark that replays canned outcomes and records the seeds it was given.
#[derive(Debug, Default)]
pub struct ScriptedBench {
    pub outcomes: VecDeque<BenchOutcome>,
    pub seeds_seen: Vec<u16>,
    pub build_flags: u8,
    pub cache_settings: u8,
}

impl ScriptedBench {
    pub fn new(build_flags: u8, cache_settings: u8) -> Self {
        Self {
            build_flags,
            cache_settings,
            ..Self::default()
        }
    }

    pub fn push(&mut self, outcome: BenchOutcome) {
        self.outcomes.push_back(outcome);
    }
}

impl Benchmark for ScriptedBench {
    fn run(&mut self, seed: u16) -> BenchOutcome {
        self.seeds_seen.push(seed);
        self.outcomes.pop_front().unwrap_or_default()
    }

    fn build_flags(&self) -> u8 {
        self.build_flags
    }

    fn cache_settings(&self) -> u8 {
        self.cache_settings
    }
}

pub fn outcome(table: u8, encode_check: u16, decode_check: u16, status: u32) -> BenchOutcome {
    BenchOutcome {
        table,
        encode_check,
        decode_check,
        status,
    }
}

/// Application state plus every collaborator, wired for direct dispatch.
pub struct Harness {
    pub data: AppData,
    pub bench: ScriptedBench,
    pub clock: ManualClock,
    pub events: EventLog,
    pub bus: LocalBus,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            data: AppData::new(),
            bench: ScriptedBench::new(0x01, 0x02),
            clock: ManualClock::new(1000),
            events: EventLog::new(),
            bus: LocalBus::new(),
        }
    }

    pub fn dispatch(&mut self, envelope: &Envelope) -> Handled {
        let mut services = Services {
            bench: &mut self.bench,
            clock: &self.clock,
            events: &mut self.events,
            telemetry: &mut self.bus,
        };
        dispatch::task_pipe(&mut self.data, envelope, &mut services)
    }

    pub fn telemetry(&mut self) -> Vec<TelemetryPacket> {
        std::iter::from_fn(|| self.bus.pop_telemetry()).collect()
    }
}
