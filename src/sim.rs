//! In-process stand-in for the motor controller firmware.
//!
//! [`EmulatedController`] speaks the same line protocol as the real board over
//! the [`Transport`] seam: each request line written to it is parsed and the
//! matching reply is queued for the next `read_line`. Reads never sleep; a
//! controller that has nothing to say reports a timeout immediately.

use crate::protocol::{decode_request, encode_reply, TelemetryReply, LINE_TERMINATOR};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerBehavior {
    /// Report back exactly what was commanded.
    Echo,
    /// Accept commands but never answer.
    Silent,
    /// Answer every command with this raw line.
    Fixed(String),
    /// Fail every write as if the cable had been pulled.
    FailIo,
}

/// Shared record of every byte written to an emulated controller.
#[derive(Debug, Clone, Default)]
pub struct WireLog {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WireLog {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    fn push(&self, bytes: &[u8]) {
        self.writes.lock().push(bytes.to_vec());
    }
}

pub struct EmulatedController {
    behavior: ControllerBehavior,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    reported: TelemetryReply,
    wire: WireLog,
}

impl EmulatedController {
    pub fn new(behavior: ControllerBehavior) -> Self {
        Self {
            behavior,
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            reported: TelemetryReply::default(),
            wire: WireLog::default(),
        }
    }

    pub fn echo() -> Self {
        Self::new(ControllerBehavior::Echo)
    }

    pub fn wire_log(&self) -> WireLog {
        self.wire.clone()
    }

    /// Queue bytes as if the board had sent them unprompted.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.outbound.extend(bytes);
    }

    pub fn reported(&self) -> TelemetryReply {
        self.reported
    }

    fn handle_request(&mut self, line: &str) {
        match decode_request(line) {
            Ok(command) => {
                self.reported = TelemetryReply {
                    speed: command.speed(),
                    steering: command.steering_angle(),
                };
                match &self.behavior {
                    ControllerBehavior::Echo => {
                        self.outbound.extend(encode_reply(&self.reported).as_bytes());
                    }
                    ControllerBehavior::Fixed(reply) => {
                        self.outbound.extend(reply.as_bytes());
                        self.outbound.push_back(LINE_TERMINATOR);
                    }
                    ControllerBehavior::Silent | ControllerBehavior::FailIo => {}
                }
            }
            // The firmware drops lines it cannot parse without answering.
            Err(e) => warn!("emulated controller ignoring request: {}", e),
        }
    }
}

impl Transport for EmulatedController {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.behavior == ControllerBehavior::FailIo {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "controller disconnected"));
        }

        self.wire.push(bytes);
        self.inbound.extend_from_slice(bytes);

        while let Some(end) = self.inbound.iter().position(|b| *b == LINE_TERMINATOR) {
            let line: Vec<u8> = self.inbound.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line).into_owned();
            debug!(request = line.trim_end(), "emulated controller received");
            self.handle_request(&line);
        }
        Ok(())
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, _timeout: Duration) -> io::Result<bool> {
        match self.outbound.iter().position(|b| *b == LINE_TERMINATOR) {
            Some(end) => {
                buf.extend(self.outbound.drain(..=end));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.outbound.clear();
        Ok(())
    }
}
