//! HTTP reachability checks
//!
//! Polls a check URL on the runtime while at least one streaming session is
//! subscribed, and reports an outage once after enough consecutive failures.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ConnectivityListener, ConnectivityMonitor, ListenerRegistry, SubscriptionId};
use crate::config::ConnectivityConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connectivity monitor that probes a URL with HTTP requests
pub struct HttpProbeMonitor {
    registry: Arc<ListenerRegistry>,
    task: JoinHandle<()>,
}

impl HttpProbeMonitor {
    /// Start probing on the current tokio runtime
    pub fn spawn(config: &ConnectivityConfig) -> Arc<Self> {
        let registry = Arc::new(ListenerRegistry::new());
        let url = config.probe_url.clone();
        let interval = Duration::from_secs(config.probe_interval_secs.max(1));
        let threshold = config.failure_threshold.max(1);

        info!(
            url = %url,
            interval_secs = interval.as_secs(),
            threshold,
            "Starting connectivity probe"
        );

        let task = tokio::spawn(probe_loop(Arc::clone(&registry), url, interval, threshold));
        Arc::new(Self { registry, task })
    }
}

impl ConnectivityMonitor for HttpProbeMonitor {
    fn subscribe(&self, on_lost: ConnectivityListener) -> SubscriptionId {
        self.registry.add(on_lost)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove(id);
    }
}

impl Drop for HttpProbeMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn probe_loop(
    registry: Arc<ListenerRegistry>,
    url: String,
    interval: Duration,
    threshold: u32,
) {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build probe client, connectivity monitoring disabled");
            return;
        }
    };

    let mut tracker = OutageTracker::new(threshold);
    loop {
        tokio::time::sleep(interval).await;

        if registry.is_empty() {
            tracker.reset();
            continue;
        }

        let reachable = probe_once(&client, &url).await;
        if tracker.record(reachable) {
            registry.notify_lost();
        }
    }
}

async fn probe_once(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(status = %response.status(), "Connectivity probe succeeded");
            true
        }
        Ok(response) => {
            warn!(status = %response.status(), "Connectivity probe returned error status");
            false
        }
        Err(e) => {
            warn!(error = %e, "Connectivity probe failed");
            false
        }
    }
}

/// Counts consecutive failures; reports each outage once
#[derive(Debug)]
struct OutageTracker {
    threshold: u32,
    failures: u32,
    reported: bool,
}

impl OutageTracker {
    fn new(threshold: u32) -> Self {
        Self {
            threshold,
            failures: 0,
            reported: false,
        }
    }

    fn reset(&mut self) {
        self.failures = 0;
        self.reported = false;
    }

    /// Record a probe result; returns true when an outage starts
    fn record(&mut self, reachable: bool) -> bool {
        if reachable {
            self.reset();
            return false;
        }
        self.failures += 1;
        if self.failures >= self.threshold && !self.reported {
            self.reported = true;
            return true;
        }
        false
    }
}
