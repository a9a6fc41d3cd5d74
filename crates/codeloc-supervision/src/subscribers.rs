//! ---
//! codeloc_section: "05-supervision"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Background supervision of location servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use codeloc_metrics::LocationMetrics;
use codeloc_schema::LocationStateChangeEvent;
use parking_lot::RwLock;
use tracing::{info, warn};

/// Receives location state transitions detected by a watch loop.
///
/// Called on the watch task, so implementations should return quickly.
pub trait LocationStateSubscriber: Send + Sync {
    fn handle_event(&self, event: &LocationStateChangeEvent) -> anyhow::Result<()>;
}

impl<F> LocationStateSubscriber for F
where
    F: Fn(&LocationStateChangeEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn handle_event(&self, event: &LocationStateChangeEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Append-only list of subscribers for one location.
pub struct SubscriberRegistry {
    location_name: String,
    subscribers: RwLock<Vec<Arc<dyn LocationStateSubscriber>>>,
    metrics: Option<LocationMetrics>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("location_name", &self.location_name)
            .field("subscribers", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    pub fn new(location_name: impl Into<String>, metrics: Option<LocationMetrics>) -> Self {
        Self {
            location_name: location_name.into(),
            subscribers: RwLock::new(Vec::new()),
            metrics,
        }
    }

    pub fn add(&self, subscriber: Arc<dyn LocationStateSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// A subscriber that errors or panics is logged and skipped; the rest still
    /// receive the event.
    pub fn dispatch(&self, event: &LocationStateChangeEvent) -> DeliveryReport {
        let snapshot: Vec<_> = self.subscribers.read().clone();
        info!(
            location = %self.location_name,
            kind = %event.kind,
            server_id = event.server_id.as_deref().unwrap_or(""),
            subscribers = snapshot.len(),
            "location state changed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_state_event(&self.location_name, event.kind.as_str());
        }

        let mut report = DeliveryReport::default();
        for (index, subscriber) in snapshot.iter().enumerate() {
            let failure = match catch_unwind(AssertUnwindSafe(|| subscriber.handle_event(event))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{err:#}")),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            match failure {
                None => report.delivered += 1,
                Some(reason) => {
                    report.failed += 1;
                    warn!(location = %self.location_name, subscriber = index, error = %reason, "state subscriber failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_subscriber_failure(&self.location_name);
                    }
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn failing_subscriber_does_not_block_later_ones() {
        let metrics = LocationMetrics::new(codeloc_metrics::new_registry()).unwrap();
        let registry = SubscriberRegistry::new("loc", Some(metrics.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        registry.add(Arc::new(move |event: &LocationStateChangeEvent| -> anyhow::Result<()> {
            first.lock().push(format!("first:{}", event.kind));
            Ok(())
        }));
        registry.add(Arc::new(|_: &LocationStateChangeEvent| -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }));
        registry.add(Arc::new(|_: &LocationStateChangeEvent| -> anyhow::Result<()> {
            panic!("subscriber bug")
        }));
        let last = seen.clone();
        registry.add(Arc::new(move |event: &LocationStateChangeEvent| -> anyhow::Result<()> {
            last.lock().push(format!("last:{}", event.kind));
            Ok(())
        }));

        let report = registry.dispatch(&LocationStateChangeEvent::updated("loc", "s2"));
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 2 });
        assert_eq!(*seen.lock(), vec!["first:updated", "last:updated"]);
        assert_eq!(metrics.subscriber_failures("loc"), 2);
    }

    #[test]
    fn empty_registry_is_a_no_op() {
        let registry = SubscriberRegistry::new("loc", None);
        assert!(registry.is_empty());
        let report = registry.dispatch(&LocationStateChangeEvent::error("loc", "down"));
        assert_eq!(report, DeliveryReport::default());
    }
}
