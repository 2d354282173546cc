use rover_link::history::*;
use rover_link::{ActuatorCommand, TelemetryReply};

fn cmd(speed: i32) -> ActuatorCommand {
    ActuatorCommand::new(speed, 0).unwrap()
}

#[test]
fn test_empty_log() {
    let log = TransactionLog::new();
    assert!(log.records().is_empty());
    assert!(log.last().is_none());
    assert_eq!(log.stats(), LinkStats::default());
}

#[test]
fn test_record_counts_outcomes() {
    let mut log = TransactionLog::new();
    let reply = TelemetryReply { speed: 5, steering: 0 };

    assert_eq!(log.record(cmd(5), Outcome::Reply(reply), 900), 0);
    assert_eq!(log.record(cmd(6), Outcome::Timeout, 1_000_000), 1);
    assert_eq!(log.record(cmd(7), Outcome::ProtocolFault, 800), 2);
    assert_eq!(log.record(cmd(8), Outcome::IoFault, 10), 3);
    log.note_rejected();
    log.note_clamped();
    log.note_clamped();

    let stats = log.stats();
    assert_eq!(stats.commands_sent, 4);
    assert_eq!(stats.replies, 1);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.protocol_errors, 1);
    assert_eq!(stats.io_errors, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.clamped, 2);

    let last = log.last().unwrap();
    assert_eq!(last.sequence, 3);
    assert_eq!(last.outcome, Outcome::IoFault);
    assert_eq!(last.round_trip_us, 10);
}

#[test]
fn test_history_evicts_oldest() {
    let mut log = TransactionLog::new();
    for i in 0..(MAX_TRANSACTION_HISTORY as i32 + 8) {
        log.record(cmd(i), Outcome::Timeout, 0);
    }

    let records = log.records();
    assert_eq!(records.len(), MAX_TRANSACTION_HISTORY);
    assert_eq!(records[0].sequence, 8);
    assert_eq!(records[0].command.speed(), 8);
    assert_eq!(records.last().unwrap().sequence, MAX_TRANSACTION_HISTORY as u32 + 7);
    // Counters keep the full total.
    assert_eq!(log.stats().timeouts, MAX_TRANSACTION_HISTORY as u32 + 8);
}

#[test]
fn test_record_serializes() {
    let mut log = TransactionLog::new();
    log.record(cmd(3), Outcome::Reply(TelemetryReply { speed: 3, steering: 0 }), 42);

    let json = serde_json::to_string(log.last().unwrap()).unwrap();
    assert!(json.contains(r#""sequence":0"#));
    assert!(json.contains(r#""round_trip_us":42"#));
    assert!(json.contains("Reply"));
}
