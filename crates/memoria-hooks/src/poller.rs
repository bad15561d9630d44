//! Polling connector, modeled on the reference stack's
//! `tokio::time::interval`-driven `SchedulerEngine::run` loop. The concrete
//! email/calendar API clients are deployment-specific and live outside this
//! crate; `HookSource` is the seam a real connector implements.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::health::HookHealthTracker;
use crate::ingress::{accept_event, IngressDeps};
use crate::types::{HookKind, RawEvent};

/// A concrete email/calendar connector implements this to hand the poller
/// fresh items since its last successful poll.
#[async_trait]
pub trait HookSource: Send + Sync {
    async fn poll(&self, user_id: &str) -> std::result::Result<Vec<RawEvent>, String>;
}

/// Drives one (user, hook_kind) poll loop until `shutdown` resolves.
/// Fire-and-forget per event: one item failing normalization or consent
/// does not stop the loop from processing the rest of the page.
pub async fn run_poll_loop(
    deps: Arc<IngressDeps>,
    health: Arc<HookHealthTracker>,
    source: Arc<dyn HookSource>,
    user_id: String,
    hook_kind: HookKind,
    channel: String,
    interval: StdDuration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let connector = format!("{}:poll", hook_kind.as_str());
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.poll(&user_id).await {
                    Ok(events) => {
                        health.record_success(&connector);
                        for raw in events {
                            let message_id = raw.source_message_id.clone();
                            match accept_event(&deps, &user_id, hook_kind, &channel, raw).await {
                                Ok(Some(_)) => info!(user_id = %user_id, message_id = %message_id, "hook event ingested"),
                                Ok(None) => {}
                                Err(e) => warn!(user_id = %user_id, message_id = %message_id, error = %e, "hook event rejected"),
                            }
                        }
                    }
                    Err(e) => {
                        health.record_error(&connector, &e);
                        error!(user_id = %user_id, connector = %connector, error = %e, "poll failed");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(connector = %connector, "poll loop shutting down");
                    break;
                }
            }
        }
    }
}
