//! Bounded record of recent link transactions and their running totals.

use crate::protocol::{ActuatorCommand, TelemetryReply};
use heapless::Vec;
use serde::{Deserialize, Serialize};

pub const MAX_TRANSACTION_HISTORY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Reply(TelemetryReply),
    Timeout,
    ProtocolFault,
    IoFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub sequence: u32,
    pub command: ActuatorCommand,
    pub outcome: Outcome,
    pub round_trip_us: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub commands_sent: u32,
    pub replies: u32,
    pub timeouts: u32,
    pub protocol_errors: u32,
    pub io_errors: u32,
    pub rejected: u32,
    pub clamped: u32,
}

/// Recent transactions, newest last, plus running totals.
#[derive(Debug, Default)]
pub struct TransactionLog {
    records: Vec<TransactionRecord, MAX_TRANSACTION_HISTORY>,
    stats: LinkStats,
    next_sequence: u32,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: ActuatorCommand, outcome: Outcome, round_trip_us: u32) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.stats.commands_sent = self.stats.commands_sent.wrapping_add(1);
        let counter = match outcome {
            Outcome::Reply(_) => &mut self.stats.replies,
            Outcome::Timeout => &mut self.stats.timeouts,
            Outcome::ProtocolFault => &mut self.stats.protocol_errors,
            Outcome::IoFault => &mut self.stats.io_errors,
        };
        *counter = counter.wrapping_add(1);

        if self.records.is_full() {
            self.records.remove(0);
        }
        let _ = self.records.push(TransactionRecord {
            sequence,
            command,
            outcome,
            round_trip_us,
        });

        sequence
    }

    pub fn note_rejected(&mut self) {
        self.stats.rejected = self.stats.rejected.wrapping_add(1);
    }

    pub fn note_clamped(&mut self) {
        self.stats.clamped = self.stats.clamped.wrapping_add(1);
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TransactionRecord> {
        self.records.last()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }
}
