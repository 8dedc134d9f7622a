use core::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

pub type TimeBaseId = u32;

pub const MASTER_TIME_BASE: &str = "master";
const MASTER_TIME_BASE_ID: TimeBaseId = 1;

/// Time source and time-base registry provided by the host.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn lookup_time_base(&self, name: &str) -> Option<TimeBaseId>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn lookup_time_base(&self, name: &str) -> Option<TimeBaseId> {
        (name == MASTER_TIME_BASE).then_some(MASTER_TIME_BASE_ID)
    }
}

/// Hand-driven clock. Every read returns the current time and then advances it by
/// `step_ms`, so back-to-back samples see a fixed elapsed time.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: Cell<u64>,
    step_ms: Cell<u64>,
    time_base: Option<&'static str>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self::with_step(start_ms, 0)
    }

    pub fn with_step(start_ms: u64, step_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
            step_ms: Cell::new(step_ms),
            time_base: Some(MASTER_TIME_BASE),
        }
    }

    /// Clock whose host has no time bases at all.
    pub fn without_time_base(mut self) -> Self {
        self.time_base = None;
        self
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn set_step(&self, step_ms: u64) {
        self.step_ms.set(step_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(delta_ms));
    }

    pub fn peek(&self) -> u64 {
        self.now_ms.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        let now = self.now_ms.get();
        self.now_ms.set(now.saturating_add(self.step_ms.get()));
        now
    }

    fn lookup_time_base(&self, name: &str) -> Option<TimeBaseId> {
        match self.time_base {
            Some(known) if known == name => Some(MASTER_TIME_BASE_ID),
            _ => None,
        }
    }
}
