use crate::bench::Benchmark;
use serde::{Deserialize, Serialize};

/// Three seed registers feeding the next benchmark run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRegister {
    seeds: [u16; 3],
}

impl SeedRegister {
    pub const fn new(seeds: [u16; 3]) -> Self {
        Self { seeds }
    }

    pub const fn values(&self) -> [u16; 3] {
        self.seeds
    }

    pub fn combined(&self, bench: &dyn Benchmark) -> u16 {
        let [a, b, c] = self.seeds;
        bench.combine_seed(a, b, c)
    }

    /// Load all three registers from the last decode check. This collapses the
    /// register history into a single value; the flight build behaves the same way.
    pub fn rotate(&mut self, decode_check: u16) {
        self.seeds = [decode_check; 3];
    }
}
