//! Connectivity monitoring for streaming sessions
//!
//! Monitors are observer registrations: a session subscribes after its first
//! track actually starts and unsubscribes on stop, whatever the stop cause.

pub mod probe;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

pub use probe::HttpProbeMonitor;

/// Callback invoked when connectivity is lost
pub type ConnectivityListener = Arc<dyn Fn() + Send + Sync>;

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Source of connectivity-lost signals
pub trait ConnectivityMonitor: Send + Sync {
    /// Register `on_lost`
    fn subscribe(&self, on_lost: ConnectivityListener) -> SubscriptionId;

    /// Remove a registration; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Listener bookkeeping shared by monitor implementations
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, ConnectivityListener>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener
    pub fn add(&self, listener: ConnectivityListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, listener);
        SubscriptionId(id)
    }

    /// Remove a listener
    pub fn remove(&self, id: SubscriptionId) {
        self.lock().remove(&id.0);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nobody is listening
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener; listeners run outside the registry lock
    pub fn notify_lost(&self) {
        let listeners: Vec<ConnectivityListener> = self.lock().values().cloned().collect();
        warn!(listeners = listeners.len(), "Connectivity lost");
        for listener in listeners {
            listener();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ConnectivityListener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Monitor driven by the host, which forwards its own connectivity events
#[derive(Default)]
pub struct ManualConnectivity {
    registry: ListenerRegistry,
}

impl ManualConnectivity {
    /// Create a monitor with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Report that the network went away
    pub fn report_lost(&self) {
        self.registry.notify_lost();
    }

    /// Number of active registrations
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn subscribe(&self, on_lost: ConnectivityListener) -> SubscriptionId {
        self.registry.add(on_lost)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove(id);
    }
}

/// A session's registration with a [`ConnectivityMonitor`].
///
/// The wrapped callback fires at most once. Dropping the handle detaches.
pub struct NetworkMonitorHandle {
    monitor: Arc<dyn ConnectivityMonitor>,
    id: Option<SubscriptionId>,
}

impl NetworkMonitorHandle {
    /// Subscribe `on_lost` to `monitor`
    pub fn attach(monitor: Arc<dyn ConnectivityMonitor>, on_lost: impl Fn() + Send + Sync + 'static) -> Self {
        let fired = AtomicBool::new(false);
        let id = monitor.subscribe(Arc::new(move || {
            if !fired.swap(true, Ordering::SeqCst) {
                on_lost();
            }
        }));
        debug!(subscription = ?id, "Network monitor attached");
        Self {
            monitor,
            id: Some(id),
        }
    }

    /// Whether the registration is still live
    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    /// Unsubscribe; idempotent
    pub fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.monitor.unsubscribe(id);
            debug!(subscription = ?id, "Network monitor detached");
        }
    }
}

impl Drop for NetworkMonitorHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
