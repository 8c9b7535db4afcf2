use std::sync::Arc;

use super::listeners::EventListener;
use crate::model::{PendingEvent, RunEvent};

/// One listener that failed to handle an event
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    /// Position of the listener in subscription order
    pub index: usize,
    pub name: String,
    pub error: String,
}

/// Aggregate of every listener failure for one emitted event
#[derive(Debug, thiserror::Error)]
#[error("{} event listener(s) failed for {} event: {}", .failures.len(), .event.kind.name(), describe(.failures))]
pub struct EmitError {
    /// The event as it was delivered
    pub event: Box<RunEvent>,
    pub failures: Vec<ListenerFailure>,
}

fn describe(failures: &[ListenerFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("#{} {} ({})", f.index, f.name, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl EmitError {
    /// Names of the failed listeners in subscription order
    pub fn failed_listeners(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Ordered fan-out of run events to listeners
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitter delivering to `listeners` in the given order
    pub fn with_listeners(listeners: Vec<Arc<dyn EventListener>>) -> Self {
        Self { listeners }
    }

    /// Append a listener to the end of the delivery order
    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> &[Arc<dyn EventListener>] {
        &self.listeners
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stamp `pending` with an id and timestamp and deliver it.
    ///
    /// Every listener is invoked exactly once, sequentially, even when an
    /// earlier one fails.
    pub async fn emit(&self, pending: PendingEvent) -> Result<RunEvent, EmitError> {
        let event = pending.stamp();
        let mut failures = Vec::new();

        for (index, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_event(&event).await {
                failures.push(ListenerFailure {
                    index,
                    name: listener.name().to_string(),
                    error: format!("{:#}", e),
                });
            }
        }

        if failures.is_empty() {
            Ok(event)
        } else {
            Err(EmitError {
                event: Box::new(event),
                failures,
            })
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field(
                "listeners",
                &self.listeners.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventCollector, FnListener};
    use crate::model::RunEventKind;

    fn pending() -> PendingEvent {
        PendingEvent::new(
            "job",
            "run",
            "expert",
            1,
            RunEventKind::StartGeneration { message_count: 1 },
        )
    }

    #[tokio::test]
    async fn test_emit_assigns_identity() {
        let emitter = EventEmitter::new();
        let a = emitter.emit(pending()).await.unwrap();
        let b = emitter.emit(pending()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_delivery() {
        let first = Arc::new(EventCollector::new());
        let third = Arc::new(EventCollector::new());
        let mut emitter = EventEmitter::new();
        emitter.subscribe(first.clone());
        emitter.subscribe(Arc::new(FnListener::new("broken", |_| {
            Err(anyhow::anyhow!("disk full"))
        })));
        emitter.subscribe(third.clone());

        let err = emitter.emit(pending()).await.unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].index, 1);
        assert_eq!(err.failed_listeners(), vec!["broken"]);
        assert!(err.to_string().contains("disk full"));

        let seen_first = first.events();
        let seen_third = third.events();
        assert_eq!(seen_first.len(), 1);
        assert_eq!(seen_third.len(), 1);
        assert_eq!(seen_first[0], seen_third[0]);
        assert_eq!(seen_first[0], *err.event);
    }
}
