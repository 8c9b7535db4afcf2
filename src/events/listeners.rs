use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::checkpoint::RunStore;
use crate::model::RunEvent;

/// Receiver of emitted run events
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Name used when reporting failures
    fn name(&self) -> &str;

    async fn on_event(&self, event: &RunEvent) -> anyhow::Result<()>;
}

/// Persists every event through a [`RunStore`]
pub struct StoreEventListener {
    store: Arc<dyn RunStore>,
}

impl StoreEventListener {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventListener for StoreEventListener {
    fn name(&self) -> &str {
        "store"
    }

    async fn on_event(&self, event: &RunEvent) -> anyhow::Result<()> {
        self.store.store_event(event).await?;
        Ok(())
    }
}

/// Collects events in delivery order
#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<RunEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events collected for one run
    pub fn events_for_run(&self, run_id: &str) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect()
    }
}

#[async_trait]
impl EventListener for EventCollector {
    fn name(&self) -> &str {
        "collector"
    }

    async fn on_event(&self, event: &RunEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

type ListenerFn = dyn Fn(&RunEvent) -> anyhow::Result<()> + Send + Sync;

/// Listener backed by a synchronous closure
pub struct FnListener {
    name: String,
    f: Box<ListenerFn>,
}

impl FnListener {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RunEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

#[async_trait]
impl EventListener for FnListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_event(&self, event: &RunEvent) -> anyhow::Result<()> {
        (self.f)(event)
    }
}
