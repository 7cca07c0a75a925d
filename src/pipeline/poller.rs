//! Background follow-up sweep.
//!
//! Wakes on the configured interval, or immediately when
//! `AppState::follow_up_wake` is notified, and turns due follow-ups into tasks.

use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// Delay before the first sweep so startup isn't competing with it.
const STARTUP_DELAY_SECS: u64 = 30;
/// Re-check interval while the sweep is disabled.
const DISABLED_RECHECK_SECS: u64 = 300;

pub async fn run_follow_up_poller(state: Arc<AppState>) {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(STARTUP_DELAY_SECS)) => {},
        _ = state.follow_up_wake.notified() => {},
    }

    loop {
        let (poll_minutes, backend_ready) = {
            let config = state.config.read();
            (config.pipeline.follow_up_poll_minutes, state.client.is_some())
        };

        if poll_minutes == 0 || !backend_ready {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(DISABLED_RECHECK_SECS)) => {},
                _ = state.follow_up_wake.notified() => {
                    log::info!("Follow-up poller: woken by sync signal (disabled path)");
                },
            }
            continue;
        }

        let today = state.config().today();
        log::info!("Follow-up poller: starting sweep for {}", today);
        match crate::services::pipeline::sync_follow_ups(&state, today).await {
            Ok(report) => log::debug!("Follow-up poller: {:?}", report),
            Err(e) if e.is_retryable() => {
                log::warn!("Follow-up poller: sweep failed, will retry next cycle: {}", e)
            }
            Err(e) => log::warn!("Follow-up poller: sweep failed: {}", e),
        }

        // Sleep until next poll or manual wake
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(poll_minutes * 60)) => {},
            _ = state.follow_up_wake.notified() => {
                log::info!("Follow-up poller: woken by manual sync signal");
            },
        }
    }
}
