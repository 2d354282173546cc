use arrayvec::ArrayString;
use core::fmt::Write as _;
use core::ops::RangeInclusive;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

pub const SPEED_RANGE: RangeInclusive<i32> = -100..=100;
pub const STEERING_RANGE: RangeInclusive<i32> = -15..=15;

pub const FIELD_DELIMITER: char = ';';
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest request line the firmware accepts, terminator included.
pub const MAX_REQUEST_SIZE: usize = 16;

// "-100;-15\n" is the widest line the domain can produce.
const_assert!(MAX_REQUEST_SIZE >= 9);

pub type RequestBuffer = ArrayString<MAX_REQUEST_SIZE>;

/// What to do with a speed or steering value outside its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    #[default]
    Reject,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("speed {0} outside [-100, 100]")]
    SpeedOutOfRange(i32),
    #[error("steering angle {0} outside [-15, 15]")]
    SteeringOutOfRange(i32),
}

/// A drive command whose fields are known to lie inside their domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawCommand")]
pub struct ActuatorCommand {
    speed: i8,
    steering_angle: i8,
}

#[derive(Deserialize)]
struct RawCommand {
    speed: i32,
    steering_angle: i32,
}

impl TryFrom<RawCommand> for ActuatorCommand {
    type Error = ValidationError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        Self::new(raw.speed, raw.steering_angle)
    }
}

impl ActuatorCommand {
    pub fn new(speed: i32, steering_angle: i32) -> Result<Self, ValidationError> {
        if !SPEED_RANGE.contains(&speed) {
            return Err(ValidationError::SpeedOutOfRange(speed));
        }
        if !STEERING_RANGE.contains(&steering_angle) {
            return Err(ValidationError::SteeringOutOfRange(steering_angle));
        }

        Ok(Self {
            speed: speed as i8,
            steering_angle: steering_angle as i8,
        })
    }

    pub fn clamped(speed: i32, steering_angle: i32) -> Self {
        Self {
            speed: speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end()) as i8,
            steering_angle: steering_angle.clamp(*STEERING_RANGE.start(), *STEERING_RANGE.end()) as i8,
        }
    }

    /// Build a command under `policy`. The flag is true when clamping changed a value.
    pub fn with_policy(
        speed: i32,
        steering_angle: i32,
        policy: RangePolicy,
    ) -> Result<(Self, bool), ValidationError> {
        match policy {
            RangePolicy::Reject => Self::new(speed, steering_angle).map(|cmd| (cmd, false)),
            RangePolicy::Clamp => {
                let cmd = Self::clamped(speed, steering_angle);
                let adjusted = cmd.speed() != speed || cmd.steering_angle() != steering_angle;
                Ok((cmd, adjusted))
            }
        }
    }

    pub fn speed(&self) -> i32 {
        i32::from(self.speed)
    }

    pub fn steering_angle(&self) -> i32 {
        i32::from(self.steering_angle)
    }
}

/// Speed and steering as reported back by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelemetryReply {
    pub speed: i32,
    pub steering: i32,
}

/// A reply line with its terminator stripped, plus its parsed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReply {
    pub text: String,
    pub telemetry: TelemetryReply,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("reply {line:?} has {found} field(s), expected 2")]
    MissingFields { line: String, found: usize },
    #[error("{field} field {value:?} is not an integer")]
    InvalidField { field: &'static str, value: String },
    #[error("reply is not valid UTF-8")]
    NotUtf8,
    #[error("request exceeds the line buffer")]
    BufferOverflow,
    #[error("malformed request line {0:?}")]
    MalformedRequest(String),
}

/// Encode a command as `<speed>;<steering>\n`.
pub fn encode_command(command: &ActuatorCommand) -> Result<RequestBuffer, ProtocolError> {
    let mut line = RequestBuffer::new();
    writeln!(
        line,
        "{}{}{}",
        command.speed(),
        FIELD_DELIMITER,
        command.steering_angle()
    )
    .map_err(|_| ProtocolError::BufferOverflow)?;
    Ok(line)
}

/// Decode one reply line. The trailing `\n` or `\r\n` is optional.
pub fn decode_reply(raw: &[u8]) -> Result<DecodedReply, ProtocolError> {
    let text = core::str::from_utf8(raw).map_err(|_| ProtocolError::NotUtf8)?;
    let text = strip_terminator(text);

    let mut fields = text.split_whitespace();
    let (Some(speed), Some(steering)) = (fields.next(), fields.next()) else {
        return Err(ProtocolError::MissingFields {
            line: text.to_string(),
            found: text.split_whitespace().count(),
        });
    };

    let telemetry = TelemetryReply {
        speed: parse_field("speed", speed)?,
        steering: parse_field("steering", steering)?,
    };

    Ok(DecodedReply {
        text: text.to_string(),
        telemetry,
    })
}

/// Firmware-side parse of a request line.
pub fn decode_request(line: &str) -> Result<ActuatorCommand, ProtocolError> {
    let body = strip_terminator(line);
    let malformed = || ProtocolError::MalformedRequest(body.to_string());

    let (speed, steering) = body.split_once(FIELD_DELIMITER).ok_or_else(malformed)?;
    let speed = speed.parse::<i32>().map_err(|_| malformed())?;
    let steering = steering.parse::<i32>().map_err(|_| malformed())?;

    ActuatorCommand::new(speed, steering).map_err(|_| malformed())
}

/// Encode telemetry the way the firmware reports it.
pub fn encode_reply(telemetry: &TelemetryReply) -> String {
    format!("{} {}\n", telemetry.speed, telemetry.steering)
}

fn strip_terminator(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

fn parse_field(field: &'static str, value: &str) -> Result<i32, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidField {
        field,
        value: value.to_string(),
    })
}
