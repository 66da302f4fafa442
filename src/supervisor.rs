use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::matchmaker::SessionHandle;
use crate::session::SessionEvent;

/// Periodically inspects one session's idle time and posts `Warn`/`Evict`
/// events into its own mailbox. Never mutates the session's state directly
/// — that stays the exclusive job of the session's own actor task.
pub fn spawn(
    handle: SessionHandle,
    last_active_ms: Arc<AtomicU64>,
    closing: Arc<AtomicBool>,
    start: Instant,
    poll_interval: Duration,
    warn_threshold: Duration,
    evict_threshold: Duration,
) {
    tokio::spawn(async move {
        let mut warned = false;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if closing.load(Ordering::SeqCst) {
                break;
            }

            let active_ms = last_active_ms.load(Ordering::SeqCst);
            let idle = Instant::now().duration_since(start).saturating_sub(Duration::from_millis(active_ms));

            // Eviction takes precedence: a tick that is late enough to have
            // crossed both thresholds at once only evicts, never warns too.
            if idle > evict_threshold {
                debug!(idle_secs = idle.as_secs(), "evicting inactive session");
                handle.notify(SessionEvent::Evict);
                break;
            } else if idle > warn_threshold && !warned {
                debug!(idle_secs = idle.as_secs(), "warning inactive session");
                handle.notify(SessionEvent::Warn);
                warned = true;
            }
        }
    });
}
