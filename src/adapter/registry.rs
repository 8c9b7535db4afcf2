//! Backend name to adapter factory mapping.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{AdapterError, AdapterResult};
use super::traits::{AdapterFactory, RuntimeAdapter};

/// Registry of runtime backends.
///
/// Backends register themselves through explicit calls at composition time;
/// see [`compose_registry`](super::compose_registry).
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = AdapterRegistry::new();
/// registry.register("native", move || native_adapter.clone())?;
///
/// let adapter = registry.create("native")?;
/// adapter.check_prerequisites().await?;
/// ```
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory.
    ///
    /// Returns an error if the name is already taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> AdapterResult<()>
    where
        F: Fn() -> Arc<dyn RuntimeAdapter> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(AdapterError::DuplicateBackend(name));
        }
        tracing::debug!(backend = %name, "Registered backend");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Create the adapter registered under `name`
    pub fn create(&self, name: &str) -> AdapterResult<Arc<dyn RuntimeAdapter>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AdapterError::UnknownBackend {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::PrerequisiteError;
    use crate::model::Expert;
    use crate::orchestration::{RunOutput, RunParams, RuntimeError};
    use async_trait::async_trait;
    use serde_json::Value;

    struct NamedAdapter(&'static str);

    #[async_trait]
    impl RuntimeAdapter for NamedAdapter {
        fn name(&self) -> &str {
            self.0
        }

        async fn check_prerequisites(&self) -> Result<(), PrerequisiteError> {
            Ok(())
        }

        fn convert_expert(&self, expert: &Expert) -> AdapterResult<Value> {
            Ok(Value::String(expert.key.clone()))
        }

        async fn run(&self, _params: RunParams) -> AdapterResult<RunOutput> {
            Err(RuntimeError::Cancelled.into())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = AdapterRegistry::new();
        registry
            .register("alpha", || Arc::new(NamedAdapter("alpha")) as Arc<dyn RuntimeAdapter>)
            .unwrap();
        registry
            .register("beta", || Arc::new(NamedAdapter("beta")) as Arc<dyn RuntimeAdapter>)
            .unwrap();

        assert_eq!(registry.names(), vec!["alpha", "beta"]);
        assert_eq!(registry.create("beta").unwrap().name(), "beta");
        assert!(registry.contains("alpha"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = AdapterRegistry::new();
        registry
            .register("alpha", || Arc::new(NamedAdapter("alpha")) as Arc<dyn RuntimeAdapter>)
            .unwrap();
        let err = registry
            .register("alpha", || Arc::new(NamedAdapter("other")) as Arc<dyn RuntimeAdapter>)
            .unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateBackend(name) if name == "alpha"));
        assert_eq!(registry.create("alpha").unwrap().name(), "alpha");
    }

    #[test]
    fn test_unknown_backend_lists_available() {
        let mut registry = AdapterRegistry::new();
        registry
            .register("alpha", || Arc::new(NamedAdapter("alpha")) as Arc<dyn RuntimeAdapter>)
            .unwrap();
        match registry.create("gamma") {
            Err(AdapterError::UnknownBackend { name, available }) => {
                assert_eq!(name, "gamma");
                assert_eq!(available, vec!["alpha".to_string()]);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }
}
