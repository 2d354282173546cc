//! Periodic driving loop: fixed speed, sweeping steering, until told to stop.

use crate::history::LinkStats;
use crate::link::{ActuatorLink, LinkError};
use crate::protocol::TelemetryReply;
use crate::transport::Transport;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

pub const STEERING_SWEEP: [i32; 8] = [0, 5, 10, 15, 10, 5, 0, -5];

/// Send `speed` with the next sweep angle every `period` until `shutdown`
/// resolves, then command the rover to rest.
///
/// `shutdown` is polled for the whole run, including while a transaction is
/// in flight. Timeouts and bad replies are logged and the loop continues; a
/// lost link ends it with the error. `on_reply` sees every decoded reply.
pub async fn drive<T, S, F>(
    link: Arc<ActuatorLink<T>>,
    speed: i32,
    period: Duration,
    shutdown: S,
    mut on_reply: F,
) -> Result<LinkStats, LinkError>
where
    T: Transport + 'static,
    S: Future,
    F: FnMut(&TelemetryReply),
{
    let mut interval = time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(speed, period_ms = period.as_millis() as u64, "driving");
    let mut step = 0usize;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        let steering = STEERING_SWEEP[step % STEERING_SWEEP.len()];
        step += 1;

        let tx_link = Arc::clone(&link);
        let mut transaction =
            tokio::task::spawn_blocking(move || tx_link.send_command(speed, steering));
        let result = tokio::select! {
            joined = &mut transaction => joined.map_err(join_failure)?,
            // The stop command below waits for the in-flight exchange.
            _ = &mut shutdown => break,
        };

        match result {
            Ok(reply) => on_reply(&reply),
            Err(LinkError::Timeout { after }) => {
                warn!(steering, "controller silent for {:?}, continuing", after);
            }
            Err(e @ (LinkError::Io(_) | LinkError::Connection { .. })) => {
                error!("link lost: {}", e);
                return Err(e);
            }
            Err(e) => warn!(steering, "command failed: {}", e),
        }
    }

    info!("stop requested, bringing rover to rest");
    let stop_link = Arc::clone(&link);
    match tokio::task::spawn_blocking(move || stop_link.send_command(0, 0))
        .await
        .map_err(join_failure)?
    {
        Ok(reply) => on_reply(&reply),
        Err(e) => warn!("stop command failed: {}", e),
    }

    Ok(link.stats())
}

fn join_failure(e: JoinError) -> LinkError {
    LinkError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
}
