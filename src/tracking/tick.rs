use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::ActiveSession;
use crate::overlay::OverlayHandle;
use crate::sensing::Clock;

const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

/// Pushes the elapsed time of the active session to the overlay once per
/// tick, and right away whenever the active session changes.
pub async fn display_tick_loop(
    mut active_rx: watch::Receiver<Option<ActiveSession>>,
    clock: Arc<dyn Clock>,
    overlay: OverlayHandle,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watching = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = active_rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("display tick shutting down");
                break;
            }
        }

        let elapsed = active_rx
            .borrow_and_update()
            .as_ref()
            .map(|session| session.elapsed_secs(clock.now()));

        if let Some(secs) = elapsed {
            log_debug!("display tick: {}s", secs);
            overlay.update_elapsed(secs);
        }
    }
}
