//! Benchmark capability interface.
//!
//! The benchmark routine itself lives outside this crate. The application only needs
//! `seed -> (table, encode_check, decode_check, status)` plus the build and cache
//! descriptors that go into every report, so that is all the trait exposes.

use crate::error::AppError;
use serde::{Deserialize, Serialize};

pub const BENCH_SUCCESS: u32 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchOutcome {
    pub table: u8,
    pub encode_check: u16,
    pub decode_check: u16,
    pub status: u32,
}

impl BenchOutcome {
    pub const fn is_success(&self) -> bool {
        self.status == BENCH_SUCCESS
    }

    pub fn check(&self) -> Result<(), AppError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(AppError::BenchmarkNonSuccessStatus {
                status: self.status,
            })
        }
    }
}

pub trait Benchmark {
    fn run(&mut self, seed: u16) -> BenchOutcome;

    /// Compiler/debug flags the benchmark was built with.
    fn build_flags(&self) -> u8;

    /// Machine cache configuration while running.
    fn cache_settings(&self) -> u8;

    /// Fold the three seed registers into the seed passed to [`Benchmark::run`].
    fn combine_seed(&self, a: u16, b: u16, c: u16) -> u16 {
        majority(a, b, c)
    }
}

/// Bitwise majority vote.
pub const fn majority(a: u16, b: u16, c: u16) -> u16 {
    (a & b) | (a & c) | (b & c)
}

/// Stand-in benchmark for hosts without the real library: a few xorshift rounds
/// seeded from the combined seed.
#[derive(Debug, Clone)]
pub struct XorshiftBench {
    rounds: u32,
    runs: u32,
}

impl XorshiftBench {
    pub fn new(rounds: u32) -> Self {
        Self { rounds, runs: 0 }
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl Default for XorshiftBench {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Benchmark for XorshiftBench {
    fn run(&mut self, seed: u16) -> BenchOutcome {
        self.runs = self.runs.wrapping_add(1);

        let mut x = u32::from(seed) | 0x0001_0000;
        let mut encode = 0u16;
        for _ in 0..self.rounds {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            encode = encode.rotate_left(1) ^ (x as u16);
        }

        BenchOutcome {
            table: (x & 0x0F) as u8,
            encode_check: encode,
            decode_check: (x >> 16) as u16,
            status: BENCH_SUCCESS,
        }
    }

    fn build_flags(&self) -> u8 {
        u8::from(cfg!(debug_assertions))
    }

    fn cache_settings(&self) -> u8 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_vote() {
        assert_eq!(majority(0xFFFF, 0x0000, 0x0000), 0x0000);
        assert_eq!(majority(0xFFFF, 0xFFFF, 0x0000), 0xFFFF);
        assert_eq!(majority(0b1100, 0b1010, 0b0110), 0b1110);
        assert_eq!(majority(0x1234, 0x1234, 0x1234), 0x1234);
    }

    #[test]
    fn test_outcome_status_check() {
        let ok = BenchOutcome::default();
        assert!(ok.check().is_ok());

        let failed = BenchOutcome {
            status: 0xDEAD_BEEF,
            ..BenchOutcome::default()
        };
        assert_eq!(
            failed.check(),
            Err(AppError::BenchmarkNonSuccessStatus { status: 0xDEAD_BEEF })
        );
    }

    #[test]
    fn test_xorshift_bench_is_deterministic() {
        let mut a = XorshiftBench::new(16);
        let mut b = XorshiftBench::new(16);
        assert_eq!(a.run(0x1234), b.run(0x1234));
        assert_ne!(a.run(0x0001), a.run(0x0002));
        assert_eq!(a.runs(), 3);
    }
}
