//! Liveness monitor for the backing service.
//!
//! Probes `GET /healthz` on a fixed cadence for the lifetime of the
//! process and keeps a two-state signal. Only transitions are published:
//! identical consecutive results leave the signal (and the sink) alone.
//! A failed probe is never fatal; it flips the signal to
//! [`Liveness::Unreachable`] until the next successful probe.

use std::sync::Arc;
use std::time::Duration;

use retro_core::liveness::Liveness;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use crate::events::{EventBus, TrackerEvent};
use crate::service::JobService;

/// Default cadence between health probes.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(15_000);

pub struct LivenessMonitor {
    service: Arc<dyn JobService>,
    events: Arc<EventBus>,
    /// `None` until the first probe completes.
    current: RwLock<Option<Liveness>>,
}

impl LivenessMonitor {
    pub fn new(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            service,
            events,
            current: RwLock::new(None),
        })
    }

    /// The most recently evaluated signal.
    pub async fn current(&self) -> Option<Liveness> {
        *self.current.read().await
    }

    /// Issue a single health probe and update the signal.
    pub async fn check_once(&self) -> Liveness {
        let liveness = match self.service.health().await {
            Ok(()) => Liveness::Healthy,
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                Liveness::Unreachable
            }
        };

        self.update(liveness).await;
        liveness
    }

    /// Probe immediately, then every `interval`, until the process exits.
    ///
    /// A probe that outlasts `interval` pushes the schedule back instead of
    /// triggering catch-up probes.
    ///
    /// The handle is only useful for aborting the task at shutdown.
    pub fn start(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Liveness monitor started");
            // The first tick completes immediately.
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check_once().await;
            }
        })
    }

    /// Store `liveness` and publish it if it differs from the previous value.
    async fn update(&self, liveness: Liveness) -> bool {
        let mut current = self.current.write().await;
        if *current == Some(liveness) {
            return false;
        }
        *current = Some(liveness);

        match liveness {
            Liveness::Healthy => tracing::info!("Retro API is healthy"),
            Liveness::Unreachable => tracing::warn!("Retro API is unreachable"),
        }
        self.events.publish(TrackerEvent::LivenessChanged {
            healthy: liveness.is_healthy(),
        });
        true
    }
}
