//! In-memory alert store.
//!
//! Holds the most recent alerts newest-first, bounded by
//! [`AlertStoreConfig::max_alerts`]. Every insertion is broadcast to registered
//! listeners (the UI) and to one [`Notifier`] (the delivery dispatcher). Each
//! listener and the notifier run on their own task so a slow or panicking
//! observer never blocks insertion.
//!
//! Auto-dismiss timers do not touch the collection directly: they enqueue the
//! alert id on a bounded queue drained by a single worker task, started with
//! the first auto-dismiss alert.
//!
//! The store can be built and queried without a runtime. Only
//! [`AlertStore::add_alert`] spawns tasks.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use vigil_core::Result;

use crate::types::{Alert, AlertBadge, AlertLevel};

/// Default number of alerts retained.
pub const DEFAULT_MAX_ALERTS: usize = 100;

/// Default capacity of the auto-dismiss request queue.
pub const DEFAULT_DISMISS_QUEUE: usize = 64;

/// Receives every new, unacknowledged alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert.
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Callback invoked with each newly stored alert.
pub type AlertListener = Arc<dyn Fn(&Alert) + Send + Sync>;

/// Alert store settings.
#[derive(Debug, Clone)]
pub struct AlertStoreConfig {
    /// Maximum alerts kept; older ones are evicted
    pub max_alerts: usize,
    /// Capacity of the auto-dismiss request queue
    pub dismiss_queue: usize,
}

impl Default for AlertStoreConfig {
    fn default() -> Self {
        Self {
            max_alerts: DEFAULT_MAX_ALERTS,
            dismiss_queue: DEFAULT_DISMISS_QUEUE,
        }
    }
}

type AlertList = Arc<RwLock<VecDeque<Alert>>>;

/// Capacity-bounded, newest-first alert collection.
pub struct AlertStore {
    max_alerts: usize,
    alerts: AlertList,
    listeners: RwLock<Vec<AlertListener>>,
    notifier: RwLock<Option<Arc<dyn Notifier>>>,
    dismiss_queue: usize,
    dismiss_tx: OnceLock<mpsc::Sender<String>>,
}

impl AlertStore {
    /// Create an empty store.
    pub fn new(config: AlertStoreConfig) -> Self {
        Self {
            max_alerts: config.max_alerts.max(1),
            alerts: Arc::new(RwLock::new(VecDeque::new())),
            listeners: RwLock::new(Vec::new()),
            notifier: RwLock::new(None),
            dismiss_queue: config.dismiss_queue.max(1),
            dismiss_tx: OnceLock::new(),
        }
    }

    /// Create a store that keeps at most `max_alerts`.
    pub fn with_capacity(max_alerts: usize) -> Self {
        Self::new(AlertStoreConfig {
            max_alerts,
            ..Default::default()
        })
    }

    /// Insert an alert and broadcast it. Returns the stored alert's id.
    ///
    /// The timestamp is always set here; the id only if the caller left it empty.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime when there is a listener or notifier to
    /// run, or when the alert auto-dismisses.
    pub fn add_alert(&self, mut alert: Alert) -> String {
        alert.timestamp = Utc::now();
        if alert.id.is_empty() {
            alert.id = Alert::generate_id(&alert.source, alert.timestamp);
        }

        {
            let mut alerts = self.write_alerts();
            alerts.push_front(alert.clone());
            while alerts.len() > self.max_alerts {
                if let Some(evicted) = alerts.pop_back() {
                    debug!(alert_id = %evicted.id, "evicted oldest alert");
                }
            }
        }

        debug!(alert_id = %alert.id, level = %alert.level, source = %alert.source, "alert stored");

        let listeners = read_lock(&self.listeners).clone();
        for listener in listeners {
            let alert = alert.clone();
            tokio::spawn(async move { listener(&alert) });
        }

        let notifier = read_lock(&self.notifier).clone();
        if !alert.acknowledged {
            if let Some(notifier) = notifier {
                let alert = alert.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier.notify(&alert).await {
                        warn!(alert_id = %alert.id, error = %e, "alert notification failed");
                    }
                });
            }
        }

        if alert.auto_dismiss && !alert.dismiss_after.is_zero() {
            let tx = self.dismiss_sender();
            let id = alert.id.clone();
            let after = alert.dismiss_after;
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                if tx.send(id).await.is_err() {
                    debug!("alert store dropped before auto-dismiss fired");
                }
            });
        }

        alert.id
    }

    /// All alerts, newest first.
    pub fn get_alerts(&self) -> Vec<Alert> {
        self.read_alerts().iter().cloned().collect()
    }

    /// Unacknowledged alerts, newest first.
    pub fn get_unacknowledged(&self) -> Vec<Alert> {
        self.read_alerts()
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Alerts of exactly `level`, newest first.
    pub fn get_alerts_by_level(&self, level: AlertLevel) -> Vec<Alert> {
        self.read_alerts()
            .iter()
            .filter(|a| a.level == level)
            .cloned()
            .collect()
    }

    /// Look up one alert.
    pub fn get(&self, id: &str) -> Option<Alert> {
        self.read_alerts().iter().find(|a| a.id == id).cloned()
    }

    /// Mark an alert as acknowledged. Returns false if the id is unknown.
    pub fn acknowledge_alert(&self, id: &str) -> bool {
        match self.write_alerts().iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Acknowledge every alert. Returns how many changed.
    pub fn acknowledge_all(&self) -> usize {
        let mut count = 0;
        for alert in self.write_alerts().iter_mut().filter(|a| !a.acknowledged) {
            alert.acknowledged = true;
            count += 1;
        }
        count
    }

    /// Remove an alert. Unknown ids are ignored.
    pub fn dismiss_alert(&self, id: &str) -> bool {
        remove_alert(&self.alerts, id)
    }

    /// Remove every alert.
    pub fn clear_all(&self) {
        self.write_alerts().clear();
    }

    /// Register a listener for new alerts.
    pub fn on_alert<F>(&self, listener: F)
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        write_lock(&self.listeners).push(Arc::new(listener));
    }

    /// Set the notifier that receives new unacknowledged alerts.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *write_lock(&self.notifier) = Some(notifier);
    }

    /// Unread counts for the header badge.
    pub fn badge(&self) -> AlertBadge {
        let mut badge = AlertBadge::default();
        for alert in self.read_alerts().iter().filter(|a| !a.acknowledged) {
            badge.add(alert.level);
        }
        badge
    }

    /// Number of unacknowledged alerts.
    pub fn unacknowledged_count(&self) -> usize {
        self.read_alerts().iter().filter(|a| !a.acknowledged).count()
    }

    /// Number of stored alerts.
    pub fn len(&self) -> usize {
        self.read_alerts().len()
    }

    /// True when no alerts are stored.
    pub fn is_empty(&self) -> bool {
        self.read_alerts().is_empty()
    }

    /// Configured capacity.
    pub fn max_alerts(&self) -> usize {
        self.max_alerts
    }

    fn dismiss_sender(&self) -> mpsc::Sender<String> {
        self.dismiss_tx
            .get_or_init(|| {
                let (tx, rx) = mpsc::channel(self.dismiss_queue);
                tokio::spawn(dismiss_worker(Arc::clone(&self.alerts), rx));
                tx
            })
            .clone()
    }

    fn read_alerts(&self) -> RwLockReadGuard<'_, VecDeque<Alert>> {
        read_lock(&self.alerts)
    }

    fn write_alerts(&self) -> RwLockWriteGuard<'_, VecDeque<Alert>> {
        write_lock(&self.alerts)
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new(AlertStoreConfig::default())
    }
}

/// Drains auto-dismiss requests until every sender is gone.
async fn dismiss_worker(alerts: AlertList, mut rx: mpsc::Receiver<String>) {
    while let Some(id) = rx.recv().await {
        if remove_alert(&alerts, &id) {
            debug!(alert_id = %id, "auto-dismissed alert");
        }
    }
}

fn remove_alert(alerts: &RwLock<VecDeque<Alert>>, id: &str) -> bool {
    let mut alerts = write_lock(alerts);
    match alerts.iter().position(|a| a.id == id) {
        Some(index) => {
            alerts.remove(index);
            true
        }
        None => false,
    }
}

// Poisoning is ignored: no listener or notifier ever runs while these locks are held.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vigil_core::VigilError;

    fn alert(title: &str) -> Alert {
        Alert::new(AlertLevel::Warning, title, "message", "test")
    }

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _alert: &Alert) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(VigilError::delivery("counting", "boom"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_orders_newest_first() {
        let store = AlertStore::default();
        let first = store.add_alert(alert("first"));
        let second = store.add_alert(alert("second").with_id("custom-id"));

        assert!(first.starts_with("test-"));
        assert_eq!(second, "custom-id");

        let alerts = store.get_alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].title, "second");
        assert_eq!(alerts[1].title, "first");
    }

    #[test]
    fn test_store_usable_outside_runtime() {
        let store = AlertStore::default();
        let id = store.add_alert(alert("plain"));

        assert!(store.acknowledge_alert(&id));
        assert_eq!(store.unacknowledged_count(), 0);
        assert!(store.dismiss_alert(&id));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = AlertStore::with_capacity(3);
        for i in 0..10 {
            store.add_alert(alert(&format!("alert {i}")).with_id(format!("id-{i}")));
            assert!(store.len() <= 3);
        }

        let ids: Vec<String> = store.get_alerts().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["id-9", "id-8", "id-7"]);
    }

    #[tokio::test]
    async fn test_dismiss_unknown_is_noop() {
        let store = AlertStore::default();
        store.add_alert(alert("keep").with_id("keep"));

        assert!(!store.dismiss_alert("missing"));
        assert_eq!(store.len(), 1);

        assert!(store.dismiss_alert("keep"));
        assert!(!store.dismiss_alert("keep"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let store = AlertStore::default();
        store.add_alert(alert("a").with_id("a"));
        store.add_alert(alert("b").with_id("b"));

        assert!(store.acknowledge_alert("a"));
        assert!(store.acknowledge_alert("a"));
        assert!(!store.acknowledge_alert("missing"));

        let unacked = store.get_unacknowledged();
        assert_eq!(unacked.len(), 1);
        assert_eq!(unacked[0].id, "b");
        assert!(store.get("a").unwrap().acknowledged);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_badge_and_acknowledge_all() {
        let store = AlertStore::default();
        store.add_alert(Alert::new(AlertLevel::Critical, "c", "m", "s"));
        store.add_alert(Alert::new(AlertLevel::Warning, "w", "m", "s"));
        store.add_alert(Alert::new(AlertLevel::Warning, "w2", "m", "s"));

        let badge = store.badge();
        assert_eq!(badge.critical, 1);
        assert_eq!(badge.warning, 2);
        assert_eq!(badge.total, 3);
        assert_eq!(store.get_alerts_by_level(AlertLevel::Warning).len(), 2);

        assert_eq!(store.acknowledge_all(), 3);
        assert_eq!(store.unacknowledged_count(), 0);
        assert!(!store.badge().should_display());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = AlertStore::default();
        store.add_alert(alert("a"));
        store.add_alert(alert("b"));
        store.clear_all();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_listeners_receive_alerts() {
        let store = AlertStore::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.on_alert(move |a| {
            let _ = tx.send(a.id.clone());
        });

        let id = store.add_alert(alert("hello"));
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, id);
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let store = AlertStore::default();
        store.on_alert(|_| panic!("listener bug"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.on_alert(move |a| {
            let _ = tx.send(a.title.clone());
        });

        store.add_alert(alert("one"));
        store.add_alert(alert("two"));

        let mut titles = Vec::new();
        for _ in 0..2 {
            let title = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            titles.push(title);
        }
        titles.sort();
        assert_eq!(titles, vec!["one", "two"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_notifier_skips_acknowledged_and_survives_failure() {
        let store = AlertStore::default();
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        store.set_notifier(notifier.clone());

        store.add_alert(alert("pending"));
        store.add_alert(alert("seen").acknowledged());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_auto_dismiss_removes_after_delay() {
        let store = AlertStore::default();
        let id = store.add_alert(alert("transient").with_auto_dismiss(Duration::from_millis(150)));
        store.add_alert(alert("sticky"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get(&id).is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_dismiss_with_concurrent_manual_actions() {
        let store = Arc::new(AlertStore::default());
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(store.add_alert(
                alert(&format!("a{i}"))
                    .with_id(format!("auto-{i}"))
                    .with_auto_dismiss(Duration::from_millis(100)),
            ));
        }

        let mut handles = Vec::new();
        for (i, id) in ids.iter().cloned().enumerate() {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(90 + (i as u64 % 3) * 10)).await;
                if i % 2 == 0 {
                    store.dismiss_alert(&id);
                } else {
                    store.acknowledge_alert(&id);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_dismiss_after_keeps_alert() {
        let store = AlertStore::default();
        let mut a = alert("zero");
        a.auto_dismiss = true;
        let id = store.add_alert(a);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get(&id).is_some());
    }
}
