use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Clock, ForegroundSampler};
use crate::tracking::TrackingCommand;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const SAMPLE_TIMEOUT_SECS: u64 = 5;

/// Foreground poller: samples on a fixed cadence and forwards every result to
/// the tracking actor. Holds no session state of its own.
pub async fn foreground_poll_loop(
    sampler: Arc<dyn ForegroundSampler>,
    clock: Arc<dyn Clock>,
    commands: mpsc::Sender<TrackingCommand>,
    poll_interval: Duration,
    lookback: Duration,
    cancel_token: CancellationToken,
) {
    // A window shorter than the cadence would leave gaps between samples.
    let lookback = lookback.max(poll_interval);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "foreground poller started (interval {:?}, lookback {:?})",
        poll_interval,
        lookback
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now();
                let package = sample_once(&sampler, now, lookback).await;
                log_debug!("foreground sample at {}: {:?}", now, package);

                if commands
                    .send(TrackingCommand::Sample { at: now, package })
                    .await
                    .is_err()
                {
                    log_warn!("tracking actor is gone; foreground poller exiting");
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("foreground poller shutting down");
                break;
            }
        }
    }
}

/// Runs one sampler query off the async workers. Failures and timeouts are
/// reported as "no sample", which the state machine treats as unchanged.
async fn sample_once(
    sampler: &Arc<dyn ForegroundSampler>,
    now: chrono::DateTime<chrono::Utc>,
    lookback: Duration,
) -> Option<String> {
    let sampler = Arc::clone(sampler);
    let query = tokio::task::spawn_blocking(move || sampler.most_recent_foreground(now, lookback));

    match tokio::time::timeout(Duration::from_secs(SAMPLE_TIMEOUT_SECS), query).await {
        Ok(Ok(Ok(package))) => package,
        Ok(Ok(Err(err))) => {
            log_error!("foreground sample failed: {err:?}");
            None
        }
        Ok(Err(join_err)) => {
            log_error!("foreground sampler worker failed to join: {join_err}");
            None
        }
        Err(_) => {
            log_warn!("foreground sample timed out (> {}s)", SAMPLE_TIMEOUT_SECS);
            None
        }
    }
}
