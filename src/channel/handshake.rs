// src/channel/handshake.rs
//! Disguised capability handoff
//!
//! The [`Initiator`] runs in the untrusted context. Per attempt it picks a
//! persona, waits a delay drawn from that persona's window, then publishes a
//! persona-shaped announcement carrying one end of a fresh private port. It
//! polls for a claim under a hard per-attempt ceiling; an unclaimed endpoint
//! is retracted before the next attempt. After the last attempt it gives up
//! without any visible effect, and discoveries keep queueing.
//!
//! The [`Responder`] runs in the trusted context. It claims every
//! announcement that matches a persona exactly and serves the claimed port.
//! Nothing is ever sent back on the public bus.

use crate::channel::bus::{Announcement, PublicBus};
use crate::channel::persona;
use crate::channel::port;
use crate::coordinator::batcher::LookupCoordinator;
use crate::coordinator::session;
use crate::interception::flag_table::FlagTable;
use crate::observability::HANDSHAKES_COMPLETED;
use crate::utils::config::HandshakeConfig;
use crate::utils::errors::{EngineError, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Untrusted side of the handoff
pub struct Initiator {
    config: HandshakeConfig,
    table: Arc<FlagTable>,
}

impl Initiator {
    pub fn new(config: HandshakeConfig, table: Arc<FlagTable>) -> Self {
        Self { config, table }
    }

    /// Run attempts until one is claimed or the attempt budget is spent
    pub async fn run(&self, bus: &PublicBus) -> Result<()> {
        for attempt in 1..=self.config.max_attempts {
            let (persona, delay) = {
                let mut rng = rand::thread_rng();
                let persona = persona::choose(&mut rng);
                (persona, persona.sample_delay(&mut rng))
            };
            tokio::time::sleep(delay).await;

            let (local, remote) = port::pair();
            let announcement = Arc::new(
                Announcement::new(persona.disguise_name, persona.payload_shape.clone())
                    .with_transfer(remote),
            );
            let audience = bus.publish(Arc::clone(&announcement));
            trace!(
                "attempt {} as {} reached {} listeners",
                attempt,
                persona.disguise_name,
                audience
            );

            if self.await_claim(&announcement).await {
                let (sender, receiver) = local.split();
                let flushed = self.table.connect(sender);
                self.table.listen(receiver);
                metrics::counter!(HANDSHAKES_COMPLETED).increment(1);
                info!(
                    "private channel established on attempt {} ({} queued discoveries flushed)",
                    attempt, flushed
                );
                return Ok(());
            }
        }

        debug!(
            "no listener claimed the handoff after {} attempts",
            self.config.max_attempts
        );
        Err(EngineError::HandshakeFailed(format!(
            "unclaimed after {} attempts",
            self.config.max_attempts
        )))
    }

    /// Run in the background; failure stays silent
    pub fn spawn(self, bus: PublicBus) -> JoinHandle<bool> {
        tokio::spawn(async move { self.run(&bus).await.is_ok() })
    }

    async fn await_claim(&self, announcement: &Announcement) -> bool {
        let poll = self.config.poll_interval();
        let claimed = tokio::time::timeout(self.config.claim_timeout(), async {
            loop {
                if announcement.is_claimed() {
                    return;
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await
        .is_ok();

        if claimed {
            return true;
        }
        // A claim may land between the last poll and the retraction
        !announcement.retract()
    }
}

/// Trusted side of the handoff
pub struct Responder {
    coordinator: Arc<LookupCoordinator>,
}

impl Responder {
    pub fn new(coordinator: Arc<LookupCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Listen on `bus`; the subscription exists when this returns
    pub fn spawn(self, bus: &PublicBus) -> JoinHandle<()> {
        let mut announcements = bus.subscribe();
        tokio::spawn(async move {
            loop {
                let announcement = match announcements.recv().await {
                    Ok(announcement) => announcement,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("responder lagged, {} announcements skipped", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(persona) =
                    persona::recognize(&announcement.source, &announcement.payload)
                else {
                    continue;
                };
                let Some(port) = announcement.claim() else {
                    continue;
                };

                debug!("claimed handoff disguised as {}", persona.disguise_name);
                let coordinator = Arc::clone(&self.coordinator);
                tokio::spawn(session::serve(coordinator, port));
            }
            debug!("public bus closed; responder stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::wire::WireMessage;
    use serde_json::json;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn fast() -> HandshakeConfig {
        HandshakeConfig {
            max_attempts: 2,
            poll_interval_ms: 5,
            claim_timeout_ms: 50,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclaimed_handoff_gives_up() {
        let bus = PublicBus::default();
        let mut observer = bus.subscribe();
        let table = FlagTable::new();
        table.observe("alice");

        let result = Initiator::new(fast(), Arc::clone(&table)).run(&bus).await;
        assert!(matches!(result, Err(EngineError::HandshakeFailed(_))));
        assert!(!table.is_connected());
        assert_eq!(table.queued(), vec!["alice"]);

        // both attempts were visible, both retracted
        for _ in 0..2 {
            let seen = observer.recv().await.unwrap();
            assert!(persona::recognize(&seen.source, &seen.payload).is_some());
            assert!(!seen.has_transfer());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_claimed_handoff_flushes_queue() {
        let bus = PublicBus::default();
        let mut listener = bus.subscribe();
        let table = FlagTable::new();
        table.observe("alice");
        table.observe("bob");

        let initiator = Initiator::new(fast(), Arc::clone(&table));
        let run = tokio::spawn({
            let bus = bus.clone();
            async move { initiator.run(&bus).await }
        });

        let announcement = listener.recv().await.unwrap();
        let (tx, mut rx) = announcement.claim().unwrap().split();
        run.await.unwrap().unwrap();

        assert!(table.is_connected());
        assert_eq!(rx.next().await.unwrap().handle(), "alice");
        assert_eq!(rx.next().await.unwrap().handle(), "bob");

        tx.post(&WireMessage::Update {
            handle: "alice".into(),
            flag: "🇩🇪".into(),
        })
        .unwrap();
        settle().await;
        assert_eq!(table.flag_for("alice").unwrap(), "🇩🇪");
    }

    #[test]
    fn test_unknown_shape_not_recognized() {
        assert!(persona::recognize("sentry-init", &json!({ "event": "pong" })).is_none());
        assert!(persona::recognize("webpack-hmr", &json!({})).is_none());
    }
}
