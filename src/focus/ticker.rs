use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{self, Duration, Instant},
};

// Set to true to log every tick
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Emit `generation` once per `period`, starting one period from now. The
/// task ends when the receiver is gone; otherwise it runs until aborted.
pub(crate) fn spawn_ticker(
    generation: u64,
    period: Duration,
    ticks: UnboundedSender<u64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            log_debug!("tick (generation {generation})");
            if ticks.send(generation).is_err() {
                break;
            }
        }
    })
}
