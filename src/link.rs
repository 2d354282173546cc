//! The actuator link: one half-duplex request/reply exchange per command.
//!
//! A link owns its transport exclusively. Every transaction (flush, write,
//! read, decode) runs while holding the transport lock, so concurrent callers
//! are serialized and their request bytes never interleave on the wire. The
//! cached [`LinkState`] sits behind its own lock and is replaced only after a
//! transaction succeeds; readers never wait on an in-flight exchange.

use crate::config::LinkConfig;
use crate::history::{LinkStats, Outcome, TransactionLog, TransactionRecord};
use crate::protocol::{
    decode_reply, encode_command, ActuatorCommand, DecodedReply, ProtocolError, RangePolicy,
    TelemetryReply, ValidationError,
};
use crate::transport::{SerialTransport, Transport};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("connection to {device} unavailable: {reason}")]
    Connection { device: String, reason: String },
    #[error("invalid command: {0}")]
    Validation(#[from] ValidationError),
    #[error("no reply within {after:?}")]
    Timeout { after: Duration },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Open,
    Closed,
}

/// Last known device state, as of the most recent successful transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkState {
    pub last_commanded_speed: i32,
    pub last_commanded_steering_angle: i32,
    pub last_reported_output: String,
    pub last_reply: Option<TelemetryReply>,
}

struct Channel<T> {
    transport: Option<T>,
    // Set after a timeout; a late reply may still be in flight.
    stale_input: bool,
    reply_buf: Vec<u8>,
}

pub struct ActuatorLink<T: Transport> {
    device: String,
    read_timeout: Duration,
    range_policy: RangePolicy,
    open: AtomicBool,
    channel: Mutex<Channel<T>>,
    state: RwLock<LinkState>,
    log: Mutex<TransactionLog>,
}

impl ActuatorLink<SerialTransport> {
    /// Open the serial device named in `config` and flush whatever it had buffered.
    pub fn open(config: &LinkConfig) -> Result<Self, LinkError> {
        Self::with_transport(open_serial_transport(config)?, config)
    }
}

/// Open the UART described by `config` without wrapping it in a link.
pub fn open_serial_transport(config: &LinkConfig) -> Result<SerialTransport, LinkError> {
    let connection_error = |reason: String| LinkError::Connection {
        device: config.device_path.clone(),
        reason,
    };

    config.validate().map_err(|e| connection_error(e.to_string()))?;
    SerialTransport::open(&config.device_path, config.baud_rate, config.read_timeout())
        .map_err(|e| connection_error(e.to_string()))
}

impl<T: Transport> ActuatorLink<T> {
    pub fn with_transport(mut transport: T, config: &LinkConfig) -> Result<Self, LinkError> {
        if let Err(e) = transport.discard_input() {
            transport.close();
            return Err(LinkError::Connection {
                device: config.device_path.clone(),
                reason: format!("failed to flush stale input: {e}"),
            });
        }

        info!(
            device = %config.device_path,
            baud = config.baud_rate,
            timeout_ms = config.read_timeout_ms,
            "actuator link open"
        );

        Ok(Self {
            device: config.device_path.clone(),
            read_timeout: config.read_timeout(),
            range_policy: config.range_policy,
            open: AtomicBool::new(true),
            channel: Mutex::new(Channel {
                transport: Some(transport),
                stale_input: false,
                reply_buf: Vec::new(),
            }),
            state: RwLock::new(LinkState::default()),
            log: Mutex::new(TransactionLog::new()),
        })
    }

    /// Validate `speed` and `steering_angle` under the link's range policy,
    /// then run one transaction.
    ///
    /// A closed link fails with [`LinkError::Connection`] before the
    /// arguments are looked at.
    pub fn send_command(&self, speed: i32, steering_angle: i32) -> Result<TelemetryReply, LinkError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }

        let (command, clamped) =
            match ActuatorCommand::with_policy(speed, steering_angle, self.range_policy) {
                Ok(built) => built,
                Err(e) => {
                    self.log.lock().note_rejected();
                    warn!(device = %self.device, speed, steering_angle, "command rejected: {}", e);
                    return Err(e.into());
                }
            };

        if clamped {
            self.log.lock().note_clamped();
            warn!(
                device = %self.device,
                speed,
                steering_angle,
                sent_speed = command.speed(),
                sent_steering = command.steering_angle(),
                "command clamped into range"
            );
        }

        self.send(command)
    }

    /// Run one transaction for an already-validated command.
    pub fn send(&self, command: ActuatorCommand) -> Result<TelemetryReply, LinkError> {
        let request = encode_command(&command)?;

        let mut channel = self.channel.lock();
        let Channel {
            transport,
            stale_input,
            reply_buf,
        } = &mut *channel;
        let Some(port) = transport.as_mut() else {
            return Err(self.closed_error());
        };

        debug!(device = %self.device, request = request.trim_end(), "sending command");
        let started = Instant::now();
        let result = exchange(port, stale_input, reply_buf, request.as_bytes(), self.read_timeout);
        let round_trip_us = u32::try_from(started.elapsed().as_micros()).unwrap_or(u32::MAX);

        match result {
            Ok(reply) => {
                debug!(device = %self.device, reply = %reply.text, round_trip_us, "reply received");
                *self.state.write() = LinkState {
                    last_commanded_speed: command.speed(),
                    last_commanded_steering_angle: command.steering_angle(),
                    last_reported_output: reply.text,
                    last_reply: Some(reply.telemetry),
                };
                self.log
                    .lock()
                    .record(command, Outcome::Reply(reply.telemetry), round_trip_us);
                Ok(reply.telemetry)
            }
            Err(LinkError::Timeout { after }) => {
                warn!(device = %self.device, timeout_ms = after.as_millis() as u64, "no reply from controller");
                self.log.lock().record(command, Outcome::Timeout, round_trip_us);
                Err(LinkError::Timeout { after })
            }
            Err(LinkError::Io(e)) => {
                error!(device = %self.device, "transport failure, closing link: {}", e);
                if let Some(mut port) = transport.take() {
                    port.close();
                }
                self.open.store(false, Ordering::Release);
                self.log.lock().record(command, Outcome::IoFault, round_trip_us);
                Err(LinkError::Io(e))
            }
            Err(e) => {
                warn!(device = %self.device, "bad reply: {}", e);
                self.log.lock().record(command, Outcome::ProtocolFault, round_trip_us);
                Err(e)
            }
        }
    }

    pub fn last_state(&self) -> LinkState {
        self.state.read().clone()
    }

    pub fn status(&self) -> LinkStatus {
        if self.open.load(Ordering::Acquire) {
            LinkStatus::Open
        } else {
            LinkStatus::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == LinkStatus::Open
    }

    /// Release the transport. Closing an already closed link does nothing.
    pub fn close(&self) {
        let mut channel = self.channel.lock();
        if let Some(mut port) = channel.transport.take() {
            port.close();
            self.open.store(false, Ordering::Release);
            info!(device = %self.device, "actuator link closed");
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn range_policy(&self) -> RangePolicy {
        self.range_policy
    }

    pub fn stats(&self) -> LinkStats {
        self.log.lock().stats()
    }

    /// Most recent transactions, oldest first.
    pub fn history(&self) -> Vec<TransactionRecord> {
        self.log.lock().records().to_vec()
    }

    fn closed_error(&self) -> LinkError {
        LinkError::Connection {
            device: self.device.clone(),
            reason: "link is closed".to_string(),
        }
    }
}

fn exchange<T: Transport>(
    port: &mut T,
    stale_input: &mut bool,
    reply_buf: &mut Vec<u8>,
    request: &[u8],
    timeout: Duration,
) -> Result<DecodedReply, LinkError> {
    if *stale_input {
        port.discard_input()?;
        *stale_input = false;
    }

    port.write_all(request)?;

    reply_buf.clear();
    if !port.read_line(reply_buf, timeout)? {
        *stale_input = true;
        return Err(LinkError::Timeout { after: timeout });
    }

    Ok(decode_reply(reply_buf)?)
}
