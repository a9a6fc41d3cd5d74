//! ---
//! codeloc_section: "07-test-harness"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Stub collaborators for exercising location handles without real servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use codeloc_schema::{LocationStateChangeEvent, LocationStateChangeKind};
use parking_lot::Mutex;

/// Collects every state change event delivered to its subscribers.
///
/// Closures returned by [`EventRecorder::subscriber`] satisfy the location
/// state subscriber contract and can be registered directly.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<LocationStateChangeEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber(
        &self,
    ) -> impl Fn(&LocationStateChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &LocationStateChangeEvent| -> anyhow::Result<()> {
            events.lock().push(event.clone());
            Ok(())
        }
    }

    pub fn events(&self) -> Vec<LocationStateChangeEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: LocationStateChangeKind) -> usize {
        self.events.lock().iter().filter(|event| event.kind == kind).count()
    }

    /// Server ids carried by recorded `UPDATED` events, in delivery order.
    pub fn updated_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == LocationStateChangeKind::Updated)
            .filter_map(|event| event.server_id.clone())
            .collect()
    }

    /// Poll until at least `count` events arrived or `within` elapsed.
    pub async fn wait_for(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Subscriber that always reports an error.
pub fn failing_subscriber(
) -> impl Fn(&LocationStateChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static {
    |event: &LocationStateChangeEvent| -> anyhow::Result<()> {
        anyhow::bail!("subscriber rejected {} event", event.kind)
    }
}

/// Subscriber that panics on every event.
pub fn panicking_subscriber(
) -> impl Fn(&LocationStateChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static {
    |event: &LocationStateChangeEvent| -> anyhow::Result<()> {
        panic!("subscriber crashed on {} event", event.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recorder_sees_events_in_order() {
        let recorder = EventRecorder::new();
        let subscriber = recorder.subscriber();
        subscriber(&LocationStateChangeEvent::updated("loc", "b")).unwrap();
        subscriber(&LocationStateChangeEvent::updated("loc", "c")).unwrap();
        subscriber(&LocationStateChangeEvent::error("loc", "gone")).unwrap();
        assert!(recorder.wait_for(3, Duration::from_millis(10)).await);
        assert_eq!(recorder.updated_ids(), vec!["b", "c"]);
        assert_eq!(recorder.count(LocationStateChangeKind::Error), 1);
    }

    #[test]
    fn failing_subscriber_errors() {
        assert!(failing_subscriber()(&LocationStateChangeEvent::error("loc", "x")).is_err());
    }
}
