//! Boot-time wall-clock synchronisation over the data link.
//!
//! Starts the time client, then polls the wall clock until it reaches a
//! plausible year.  If the data session drops while waiting, the client is
//! stopped, the routine waits for the link to come back and starts over.
//! Runs under the supervisor's link token before any engine task exists.

use embedded_hal::delay::DelayNs;
use log::{error, info};

use super::arbiter::LinkGuard;
use super::ports::{ClockPort, LinkPort, LinkStatus, SntpPort};
use super::timefmt::{asctime, is_time_set};
use crate::config::ClientConfig;

/// Poll period while waiting for the link to reconnect.
pub const RECONNECT_POLL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Clock is set; carries the Unix time at the moment of success.
    Synced(i64),
    /// Retries exhausted; the time client was stopped.
    TimedOut,
    /// The time client could not be started.
    Failed,
}

pub fn obtain_time<L, N, C, D>(
    link: &mut LinkGuard<'_, L>,
    sntp: &mut N,
    clock: &C,
    delay: &mut D,
    config: &ClientConfig,
) -> SyncOutcome
where
    L: LinkPort,
    N: SntpPort,
    C: ClockPort,
    D: DelayNs,
{
    let retry_count = config.sntp_retry_count;
    let mut retry = 0;

    loop {
        info!("SNTP: OBTAINING TIME");
        if let Err(e) = sntp.start() {
            error!("SNTP: {}", e);
            return SyncOutcome::Failed;
        }
        info!("SNTP: SNTP INITIALIZED");

        let mut now = clock.unix_time();
        while !is_time_set(now) {
            retry += 1;
            if retry >= retry_count {
                break;
            }
            info!("SNTP: Waiting for system time to be set... ({}/{})", retry, retry_count);
            delay.delay_ms(config.sntp_retry_ms);
            now = clock.unix_time();
            if link.status() != LinkStatus::Connected {
                break;
            }
        }

        if link.status() != LinkStatus::Connected {
            sntp.stop();
            error!("SNTP: Disconnected, waiting for reconnect");
            retry = 0;
            while link.status() != LinkStatus::Connected {
                delay.delay_ms(RECONNECT_POLL_MS);
            }
            continue;
        }

        if retry < retry_count {
            info!("SNTP: TIME SET TO {}", asctime(now, config.utc_offset_secs));
            return SyncOutcome::Synced(now);
        }
        error!("SNTP: ERROR OBTAINING TIME");
        sntp.stop();
        return SyncOutcome::TimedOut;
    }
}
