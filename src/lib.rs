//! # HUFF benchmark application
//!
//! A command-driven flight task that runs an external benchmark on a schedule and
//! reports the result as a checksummed `$HUNU` status line.
//!
//! ## Features
//!
//! - **Command dispatch**: topic and function-code routing with length checks
//! - **Housekeeping**: command and error counters published on request
//! - **Result reports**: fixed-format ASCII line with an XOR checksum, truncated safely
//! - **Seed handling**: three seed registers combined per run and rotated afterwards
//! - **Bounded memory**: `heapless` queues and fixed-size frames throughout the core
//!
//! ## Quick Start
//!
//! ```rust
//! use huffapp::{AppConfig, EventLog, HuffApp, LocalBus, ManualClock, XorshiftBench};
//! use huffapp::protocol::{Envelope, CMD_WORK_MID};
//!
//! let mut bus = LocalBus::new();
//! let clock = ManualClock::new(1_000);
//! let mut events = EventLog::new();
//! let mut bench = XorshiftBench::default();
//!
//! let mut app = HuffApp::init(&AppConfig::default(), &mut bus, &clock, &mut events).unwrap();
//! bus.publish(&Envelope::header_only(CMD_WORK_MID));
//! app.run_until_idle(&mut bus, &mut bench, &clock, &mut events);
//!
//! let report = bus.pop_telemetry().unwrap();
//! println!("{:?}", report);
//! ```
//!
//! ## Architecture
//!
//! - [`app`] - Application state, init and the receive loop
//! - [`dispatch`] - Topic and function-code routing
//! - [`cmds`] - Command handlers
//! - [`report`] - `$HUNU` line encoding and bounded text fields
//! - [`bus`] - Software bus traits and the in-process bus
//! - [`scheduler`] - Periodic wakeup messages
//! - [`link`] - JSON frames for the ground link

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod app;
pub mod bench;
pub mod bus;
pub mod clock;
pub mod cmds;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod link;
pub mod protocol;
pub mod report;
pub mod scheduler;
pub mod seed;
pub mod telemetry;

pub use app::{AppData, HuffApp, RunStatus, Services};
pub use bench::{BenchOutcome, Benchmark, XorshiftBench};
pub use bus::{LocalBus, SoftwareBus, TelemetrySink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use dispatch::Handled;
pub use error::{AppError, InitError};
pub use events::{EventLog, EventSink, TracingEventSink};
pub use report::{encode_report, ReportFields};
pub use telemetry::TelemetryPacket;
