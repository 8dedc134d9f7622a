mod common;

use common::Harness;
use huffapp::events::EventId;
use huffapp::protocol::*;
use huffapp::{AppError, Handled};

#[test]
fn test_unknown_command_code_counts_error_only() {
    let mut h = Harness::new();

    let handled = h.dispatch(&Envelope::command(CMD_MID, 0x2A, &[]).unwrap());

    assert_eq!(
        handled,
        Handled::Rejected(AppError::UnknownCommandCode { msg_id: CMD_MID, code: 0x2A })
    );
    assert_eq!(h.data.err_counter, 1);
    assert_eq!(h.data.cmd_counter, 0);
    assert!(h.telemetry().is_empty());

    let event = h.events.last().unwrap();
    assert_eq!(event.id, EventId::CcErr);
    assert!(event.message.contains("0x1897"));
    assert!(event.message.contains("CC = 42"));
}

#[test]
fn test_noop_increments_command_counter() {
    let mut h = Harness::new();

    let handled = h.dispatch(&Envelope::command(CMD_MID, CommandCode::Noop.code(), &[]).unwrap());

    assert_eq!(handled, Handled::Noop);
    assert_eq!(h.data.cmd_counter, 1);
    assert_eq!(h.data.err_counter, 0);
    assert_eq!(h.events.count(EventId::NoopInf), 1);
    assert!(h.events.last().unwrap().message.starts_with("HUFF: NOOP command"));
    assert!(h.telemetry().is_empty());
}

#[test]
fn test_length_mismatch_skips_handler() {
    let mut h = Harness::new();

    let handled = h.dispatch(&Envelope::command(CMD_MID, CommandCode::Noop.code(), &[0xAA]).unwrap());

    assert_eq!(
        handled,
        Handled::Rejected(AppError::LengthMismatch {
            msg_id: CMD_MID,
            fcn_code: 0,
            actual: CMD_HEADER_LEN + 1,
            expected: CMD_HEADER_LEN,
        })
    );
    assert_eq!(h.data.err_counter, 1);
    assert_eq!(h.data.cmd_counter, 0);
    assert_eq!(h.events.count(EventId::NoopInf), 0);

    let event = h.events.last().unwrap();
    assert_eq!(event.id, EventId::CmdLenErr);
    assert!(event.message.contains("Len = 9, Expected = 8"));
}

#[test]
fn test_length_mismatch_on_reset_leaves_counters() {
    let mut h = Harness::new();
    h.data.cmd_counter = 5;
    h.data.err_counter = 2;

    let bad_reset = Envelope::command(CMD_MID, CommandCode::ResetCounters.code(), &[0, 0]).unwrap();
    assert!(h.dispatch(&bad_reset).is_rejected());

    assert_eq!(h.data.cmd_counter, 5);
    assert_eq!(h.data.err_counter, 3);
    assert_eq!(h.events.count(EventId::ResetInf), 0);
}

#[test]
fn test_reset_counters_zeroes_both() {
    for (cmd, err) in [(0u8, 0u8), (1, 0), (0, 9), (200, 255)] {
        let mut h = Harness::new();
        h.data.cmd_counter = cmd;
        h.data.err_counter = err;

        let handled =
            h.dispatch(&Envelope::command(CMD_MID, CommandCode::ResetCounters.code(), &[]).unwrap());

        assert_eq!(handled, Handled::ResetCounters);
        assert_eq!(h.data.cmd_counter, 0);
        assert_eq!(h.data.err_counter, 0);
        assert_eq!(h.events.count(EventId::ResetInf), 1);
    }
}

#[test]
fn test_unknown_topic_counts_error_without_other_mutation() {
    let mut h = Harness::new();
    h.data.cmd_counter = 3;
    let seeds_before = h.data.seeds;
    let hk_before = h.data.hk_tlm;

    let handled = h.dispatch(&Envelope::header_only(MsgId::command(0x42)));

    assert_eq!(
        handled,
        Handled::Rejected(AppError::UnknownTopic { msg_id: MsgId::command(0x42) })
    );
    assert_eq!(h.data.err_counter, 1);
    assert_eq!(h.data.cmd_counter, 3);
    assert_eq!(h.data.seeds, seeds_before);
    assert_eq!(h.data.hk_tlm, hk_before);
    assert!(h.telemetry().is_empty());
    assert_eq!(h.events.last().unwrap().id, EventId::MidErr);
}

#[test]
fn test_telemetry_topics_are_not_routed() {
    let mut h = Harness::new();

    // Our own telemetry ids are not commands we serve.
    assert!(h.dispatch(&Envelope::header_only(HK_TLM_MID)).is_rejected());
    assert!(h.dispatch(&Envelope::header_only(RES_TLM_MID)).is_rejected());
    assert_eq!(h.data.err_counter, 2);
}

#[test]
fn test_counters_wrap() {
    let mut h = Harness::new();
    h.data.cmd_counter = u8::MAX;
    h.data.err_counter = u8::MAX;

    h.dispatch(&Envelope::command(CMD_MID, 0, &[]).unwrap());
    h.dispatch(&Envelope::command(CMD_MID, 0x7F, &[]).unwrap());

    assert_eq!(h.data.cmd_counter, 0);
    assert_eq!(h.data.err_counter, 0);
}

#[test]
fn test_scheduled_work_skips_length_check() {
    let mut h = Harness::new();

    let handled = h.dispatch(&Envelope::command(CMD_WORK_MID, 0, &[1, 2, 3]).unwrap());

    assert!(matches!(handled, Handled::Run(_)));
    assert_eq!(h.data.err_counter, 0);
    assert_eq!(h.telemetry().len(), 1);
}

#[test]
fn test_housekeeping_request_routes_to_send_hk() {
    let mut h = Harness::new();

    assert_eq!(h.dispatch(&Envelope::header_only(SEND_HK_MID)), Handled::Housekeeping);
    let packets = h.telemetry();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].msg_id(), HK_TLM_MID);
}

#[test]
fn test_one_handler_per_envelope() {
    let mut h = Harness::new();
    let noop = Envelope::command(CMD_MID, 0, &[]).unwrap();

    for expected in 1..=10u8 {
        h.dispatch(&noop);
        assert_eq!(h.data.cmd_counter, expected);
    }
    assert_eq!(h.events.count(EventId::NoopInf), 10);
}
