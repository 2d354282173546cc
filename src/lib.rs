//! # Rover Actuator Link
//!
//! Serial command/telemetry link to a rover's motor and steering controller.
//!
//! The controller firmware speaks a one-line request/reply protocol over a
//! UART at 115200 baud, 8-N-1:
//!
//! - request: `<speed>;<steering>\n`, speed in [-100, 100], steering in [-15, 15]
//! - reply: `<reported speed> <reported steering>`
//!
//! ## Quick Start
//!
//! ```rust
//! use rover_link::{ActuatorLink, LinkConfig};
//! use rover_link::sim::EmulatedController;
//!
//! let config = LinkConfig::new("sim");
//! let link = ActuatorLink::with_transport(EmulatedController::echo(), &config)?;
//!
//! let telemetry = link.send_command(15, 0)?;
//! assert_eq!(telemetry.speed, 15);
//! assert_eq!(link.last_state().last_reported_output, "15 0");
//!
//! link.close();
//! # Ok::<(), rover_link::LinkError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`link`] - the link itself: exclusive transport access and cached state
//! - [`protocol`] - pure encode/decode of request and reply lines
//! - [`transport`] - the byte transport seam and the serial port implementation
//! - [`history`] - recent transactions and running counters
//! - [`config`] - link configuration
//! - [`drive`] - periodic driving loop with graceful stop
//! - [`sim`] - emulated controller for tests and dry runs

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod drive;
pub mod history;
pub mod link;
pub mod protocol;
pub mod sim;
pub mod transport;

// Re-export main public types for convenience
pub use config::{ConfigError, LinkConfig};
pub use link::{ActuatorLink, LinkError, LinkState, LinkStatus};
pub use protocol::{ActuatorCommand, ProtocolError, RangePolicy, TelemetryReply, ValidationError};
pub use transport::{SerialTransport, Transport};
