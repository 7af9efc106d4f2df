//! Reconnect policy
//!
//! The session manager only exposes resume-vs-fresh entry points; this is
//! the caller that decides. It listens for disconnects, arms resume when
//! the reason allows it, and reconnects with jittered exponential
//! backoff.

use chat_gateway::{EventKind, EventSubscription, GatewayEvent, SessionManager};
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Backoff parameters for automatic reconnection
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    pub base_delay: Duration,
    /// Cap for the doubled delay
    pub max_delay: Duration,
    /// Give up after this many failed attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Install this policy on a session manager
    ///
    /// Returns the subscription; unsubscribing it uninstalls the policy.
    pub fn install(self, gateway: &Arc<SessionManager>) -> EventSubscription {
        let manager = Arc::downgrade(gateway);
        gateway.subscribe(EventKind::Disconnected, move |event| {
            let GatewayEvent::Disconnected { reason } = event else {
                return;
            };
            if !reason.should_reconnect() {
                tracing::info!(reason = %reason, "Not reconnecting");
                return;
            }
            let Some(manager) = manager.upgrade() else { return };

            let policy = self.clone();
            let resume = reason.should_resume();
            tokio::spawn(async move {
                policy.run(manager, resume).await;
            });
        })
    }

    async fn run(self, manager: Arc<SessionManager>, resume: bool) {
        if resume {
            if let Some(last) = manager.last_session() {
                manager.set_resume(last.session_id, last.sequence);
            }
        } else {
            manager.clear_resume();
        }

        let mut delay = self.base_delay;
        let mut attempt: u32 = 1;

        loop {
            let backoff = jitter(delay);
            tracing::info!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                resume,
                "Reconnecting after backoff"
            );
            tokio::time::sleep(backoff).await;

            match manager.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, "Reconnected");
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "Reconnect attempt failed");
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                    if self.max_attempts.is_some_and(|max| attempt > max) {
                        tracing::error!("Reconnect attempts exhausted, giving up");
                        return;
                    }
                }
            }
        }
    }

    /// Cap the number of attempts before the policy gives up
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Randomize a delay into `[delay/2, delay]` so a fleet of clients does
/// not reconnect in lockstep
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..=1.0);
    delay.mul_f64(factor)
}
