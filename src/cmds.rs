//! Command handlers. Each one runs to completion and commits its whole effect.

use crate::app::{AppData, Services, APP_VERSION};
use crate::events::{EventId, EventType};
use crate::report::{encode_report, ReportFields};
use crate::telemetry::{HkPayload, TelemetryPacket};
use serde::{Deserialize, Serialize};

/// What a Run produced, for the caller's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u16,
    pub status: u32,
    pub decode_check: u16,
    pub checksum: u8,
    pub truncated: bool,
}

pub fn noop(data: &mut AppData, services: &mut Services<'_>) {
    data.cmd_counter = data.cmd_counter.wrapping_add(1);
    services.events.send_fmt(
        EventId::NoopInf,
        EventType::Information,
        format_args!("HUFF: NOOP command {APP_VERSION}"),
    );
}

pub fn reset_counters(data: &mut AppData, services: &mut Services<'_>) {
    data.cmd_counter = 0;
    data.err_counter = 0;
    services.events.send_fmt(
        EventId::ResetInf,
        EventType::Information,
        format_args!("HUFF: RESET command"),
    );
}

pub fn send_hk(data: &mut AppData, services: &mut Services<'_>) {
    data.hk_tlm.payload = HkPayload {
        command_error_counter: data.err_counter,
        command_counter: data.cmd_counter,
        spare: [0; 2],
    };
    data.hk_tlm.header.stamp(services.clock.now_ms());
    transmit(services, TelemetryPacket::Housekeeping(data.hk_tlm));
}

/// Run the benchmark once and publish the `$HUNU` report.
pub fn run(data: &mut AppData, services: &mut Services<'_>) -> RunSummary {
    let t0 = services.clock.now_ms();
    let seed = data.seeds.combined(&*services.bench);

    let outcome = services.bench.run(seed);
    if let Err(err) = outcome.check() {
        tracing::warn!(%err, seed, "benchmark run failed, reporting status as data");
    }

    let elapsed = services.clock.now_ms().saturating_sub(t0);
    let fields = ReportFields {
        // The report carries the low 32 bits of the clock.
        t0_ms: t0 as u32,
        build_flags: services.bench.build_flags(),
        cache_settings: services.bench.cache_settings(),
        elapsed_ms: u32::try_from(elapsed).unwrap_or(u32::MAX),
        status: outcome.status,
        seed,
        table: outcome.table,
        encode_check: outcome.encode_check,
        decode_check: outcome.decode_check,
    };
    let report = encode_report(&fields);

    // Truncation is an accepted degraded output: no counter, no event.
    let stored = data.result_tlm.payload.set(report.as_str());
    let truncated = report.is_truncated() || stored.is_err();

    data.seeds.rotate(outcome.decode_check);

    data.result_tlm.header.stamp(services.clock.now_ms());
    transmit(services, TelemetryPacket::Result(data.result_tlm));

    RunSummary {
        seed,
        status: outcome.status,
        decode_check: outcome.decode_check,
        checksum: report.checksum(),
        truncated,
    }
}

fn transmit(services: &mut Services<'_>, packet: TelemetryPacket) {
    if let Err(err) = services.telemetry.transmit(&packet) {
        tracing::warn!(msg_id = %packet.msg_id(), %err, "telemetry transmit failed");
    }
}
