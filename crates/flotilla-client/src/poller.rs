use crate::{ClientError, Gateway};
use flotilla_core::LiveDelta;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Messages flowing from background tasks into the console's single
/// event-processing task. All table mutation happens on the receiver side.
#[derive(Debug)]
pub enum FleetEvent {
    LiveDeltas(Vec<LiveDelta>),
    Resources(String),
    PollFailed(String),
}

/// Fetch surface the pollers run against. Split out from [`Gateway`] so
/// poll cycles are testable without timers or sockets.
pub trait FleetSource: Send + Sync {
    fn fetch_live(&self) -> impl Future<Output = Result<Vec<LiveDelta>, ClientError>> + Send;
    fn fetch_resources(&self) -> impl Future<Output = Result<String, ClientError>> + Send;
}

impl FleetSource for Gateway {
    async fn fetch_live(&self) -> Result<Vec<LiveDelta>, ClientError> {
        Ok(self.live_values().await?.sites)
    }

    async fn fetch_resources(&self) -> Result<String, ClientError> {
        self.resources().await
    }
}

impl<T: FleetSource> FleetSource for Arc<T> {
    async fn fetch_live(&self) -> Result<Vec<LiveDelta>, ClientError> {
        (**self).fetch_live().await
    }

    async fn fetch_resources(&self) -> Result<String, ClientError> {
        (**self).fetch_resources().await
    }
}

/// Self-rescheduling fetch of incremental fleet-state deltas.
///
/// Cycles are serialized: the next poll is scheduled only after the
/// current response resolves, so two poll responses can never race each
/// other into the table out of order. No outcome stops the loop; a failed
/// cycle reports once and the next tick retries.
pub struct LivePoller<S> {
    source: S,
    interval: Duration,
    tx: mpsc::Sender<FleetEvent>,
}

impl<S: FleetSource> LivePoller<S> {
    pub fn new(source: S, interval: Duration, tx: mpsc::Sender<FleetEvent>) -> Self {
        Self {
            source,
            interval,
            tx,
        }
    }

    /// One poll cycle. Never panics and never returns an error; failures
    /// are forwarded as events.
    pub async fn tick(&self) {
        match self.source.fetch_live().await {
            Ok(deltas) => {
                let _ = self.tx.send(FleetEvent::LiveDeltas(deltas)).await;
            }
            Err(err) => {
                warn!("live poll failed: {err}");
                let _ = self.tx.send(FleetEvent::PollFailed(err.to_string())).await;
            }
        }
    }

    /// Runs for the lifetime of the console.
    pub async fn run(self) {
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Periodic refresh of the aggregate resources fragment. The fragment is
/// presentation, not structured state: the display region is replaced
/// wholesale, never merged.
pub struct ResourcePoller<S> {
    source: S,
    interval: Duration,
    tx: mpsc::Sender<FleetEvent>,
}

impl<S: FleetSource> ResourcePoller<S> {
    pub fn new(source: S, interval: Duration, tx: mpsc::Sender<FleetEvent>) -> Self {
        Self {
            source,
            interval,
            tx,
        }
    }

    pub async fn tick(&self) {
        match self.source.fetch_resources().await {
            Ok(fragment) => {
                let _ = self.tx.send(FleetEvent::Resources(fragment)).await;
            }
            Err(err) => {
                warn!("resource poll failed: {err}");
            }
        }
    }

    pub async fn run(self) {
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        calls: AtomicUsize,
    }

    impl FleetSource for FlakySource {
        async fn fetch_live(&self) -> Result<Vec<LiveDelta>, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 0 {
                Err(ClientError::Malformed("missing sites".into()))
            } else {
                Ok(vec![LiveDelta {
                    name: "br-1".into(),
                    build_state: Some("OK".into()),
                    ..LiveDelta::default()
                }])
            }
        }

        async fn fetch_resources(&self) -> Result<String, ClientError> {
            Ok("CPU 12%".into())
        }
    }

    #[tokio::test]
    async fn test_poller_survives_failed_cycle() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let poller = LivePoller::new(Arc::clone(&source), Duration::from_millis(1), tx);

        // First cycle fails, second succeeds; both must emit an event and
        // the failure must not prevent the next cycle from running.
        poller.tick().await;
        poller.tick().await;

        assert!(matches!(rx.recv().await, Some(FleetEvent::PollFailed(_))));
        match rx.recv().await {
            Some(FleetEvent::LiveDeltas(deltas)) => {
                assert_eq!(deltas.len(), 1);
                assert_eq!(deltas[0].name, "br-1");
            }
            other => panic!("expected deltas, got {other:?}"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resource_poller_replaces_fragment() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let poller = ResourcePoller::new(source, Duration::from_millis(1), tx);

        poller.tick().await;
        match rx.recv().await {
            Some(FleetEvent::Resources(fragment)) => assert_eq!(fragment, "CPU 12%"),
            other => panic!("expected resources, got {other:?}"),
        }
    }
}
