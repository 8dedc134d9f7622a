mod common;

use common::{outcome, Harness};
use huffapp::events::EventId;
use huffapp::protocol::*;
use huffapp::report::verify_line;
use huffapp::seed::SeedRegister;
use huffapp::telemetry::{BusTime, HK_TLM_LEN, RESULT_TLM_LEN};
use huffapp::{Handled, TelemetryPacket};

fn hk_payload(packet: &TelemetryPacket) -> [u8; 4] {
    match packet {
        TelemetryPacket::Housekeeping(hk) => [
            hk.payload.command_error_counter,
            hk.payload.command_counter,
            hk.payload.spare[0],
            hk.payload.spare[1],
        ],
        other => panic!("expected housekeeping, got {other:?}"),
    }
}

fn result_text(packet: &TelemetryPacket) -> String {
    match packet {
        TelemetryPacket::Result(result) => result.payload.as_str().to_string(),
        other => panic!("expected result, got {other:?}"),
    }
}

#[test]
fn test_send_hk_twice_gives_identical_payloads() {
    let mut h = Harness::new();
    h.data.cmd_counter = 4;
    h.data.err_counter = 1;

    h.dispatch(&Envelope::header_only(SEND_HK_MID));
    h.dispatch(&Envelope::header_only(SEND_HK_MID));

    let packets = h.telemetry();
    assert_eq!(packets.len(), 2);
    assert_eq!(hk_payload(&packets[0]), hk_payload(&packets[1]));
    assert_eq!(hk_payload(&packets[0]), [1, 4, 0, 0]);
}

#[test]
fn test_send_hk_reflects_counters_and_time() {
    let mut h = Harness::new();
    h.dispatch(&Envelope::command(CMD_MID, 0, &[]).unwrap());
    h.dispatch(&Envelope::command(CMD_MID, 9, &[]).unwrap());
    h.clock.set(12_500);

    h.dispatch(&Envelope::header_only(SEND_HK_MID));

    let packets = h.telemetry();
    assert_eq!(packets.len(), 1);
    assert_eq!(hk_payload(&packets[0]), [1, 1, 0, 0]);
    assert_eq!(packets[0].header().time, BusTime::from_millis(12_500));

    let bytes = packets[0].to_bytes();
    assert_eq!(bytes.len(), HK_TLM_LEN);
    assert_eq!(&bytes[0..2], &[0x08, 0x99]);
}

#[test]
fn test_send_hk_commits_into_app_state() {
    let mut h = Harness::new();
    h.data.cmd_counter = 7;

    h.dispatch(&Envelope::header_only(SEND_HK_MID));

    assert_eq!(h.data.hk_tlm.payload.command_counter, 7);
    assert_eq!(h.data.hk_tlm.payload.command_error_counter, 0);
}

#[test]
fn test_run_produces_reference_report() {
    let mut h = Harness::new();
    h.clock.set_step(50);
    h.data.seeds = SeedRegister::new([0x1234; 3]);
    h.bench.push(outcome(0x03, 0xABCD, 0x5678, 0));

    let handled = h.dispatch(&Envelope::header_only(CMD_WORK_MID));

    let Handled::Run(summary) = handled else {
        panic!("expected run, got {handled:?}");
    };
    assert_eq!(summary.seed, 0x1234);
    assert_eq!(summary.checksum, 0x2D);
    assert!(!summary.truncated);
    assert_eq!(h.bench.seeds_seen, vec![0x1234]);

    let packets = h.telemetry();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].msg_id(), RES_TLM_MID);
    assert_eq!(
        result_text(&packets[0]),
        "$HUNU,1000,01-02,50,00000000,1234,03,ABCD,5678*2D"
    );
    assert_eq!(packets[0].to_bytes().len(), RESULT_TLM_LEN);
    // Stamped after t0 and t1 were taken.
    assert_eq!(packets[0].header().time, BusTime::from_millis(1100));
}

#[test]
fn test_run_collapses_seed_registers() {
    let mut h = Harness::new();
    h.data.seeds = SeedRegister::new([0x1111, 0x2222, 0x4444]);
    h.bench.push(outcome(0, 0, 0xBEEF, 0));
    h.bench.push(outcome(0, 0, 0x0042, 0));

    h.dispatch(&Envelope::header_only(CMD_WORK_MID));
    assert_eq!(h.data.seeds.values(), [0xBEEF; 3]);

    h.dispatch(&Envelope::header_only(CMD_WORK_MID));
    assert_eq!(h.data.seeds.values(), [0x0042; 3]);

    // Bitwise majority of three distinct single bits is zero; after that the bench
    // only ever sees the previous decode check.
    assert_eq!(h.bench.seeds_seen, vec![0x0000, 0xBEEF]);
}

#[test]
fn test_run_reports_failing_status_as_data() {
    let mut h = Harness::new();
    h.bench.push(outcome(0x01, 0x0102, 0x0304, 0xDEAD_BEEF));

    let handled = h.dispatch(&Envelope::header_only(CMD_WORK_MID));

    assert!(matches!(handled, Handled::Run(summary) if summary.status == 0xDEAD_BEEF));
    assert_eq!(h.data.err_counter, 0);
    assert_eq!(h.events.total(), 0);
    assert_eq!(h.data.seeds.values(), [0x0304; 3]);

    let packets = h.telemetry();
    assert_eq!(packets.len(), 1);
    let report = result_text(&packets[0]);
    assert!(report.contains(",DEADBEEF,"));
    assert!(verify_line(&report));
}

#[test]
fn test_run_overwrites_previous_result() {
    let mut h = Harness::new();
    h.bench.push(outcome(0xAA, 0, 0, 0));
    h.bench.push(outcome(0xBB, 0, 0, 0));

    h.dispatch(&Envelope::header_only(CMD_WORK_MID));
    h.dispatch(&Envelope::header_only(CMD_WORK_MID));

    let current = h.data.result_tlm.payload.as_str();
    assert!(current.contains(",BB,"));
    assert!(!current.contains(",AA,"));
    assert_eq!(current.matches('$').count(), 1);
}

#[test]
fn test_result_sequence_counts_per_message_id() {
    let mut h = Harness::new();
    h.dispatch(&Envelope::header_only(CMD_WORK_MID));
    h.dispatch(&Envelope::header_only(SEND_HK_MID));
    h.dispatch(&Envelope::header_only(CMD_WORK_MID));

    let packets = h.telemetry();
    let sequences: Vec<(MsgId, u16)> = packets
        .iter()
        .map(|p| (p.msg_id(), p.header().sequence))
        .collect();
    assert_eq!(
        sequences,
        vec![(RES_TLM_MID, 0), (HK_TLM_MID, 0), (RES_TLM_MID, 1)]
    );
    assert_eq!(h.events.count(EventId::NoopInf), 0);
}
