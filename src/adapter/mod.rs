//! Pluggable runtime backends.
//!
//! Every backend implements [`RuntimeAdapter`]. [`compose_registry`] registers
//! the native backend and each configured external CLI, one explicit call per
//! backend, in a fixed order.

pub mod error;
#[cfg(feature = "external-cli")]
pub mod external;
pub mod native;
pub mod registry;
pub mod traits;

use std::sync::Arc;

pub use error::{AdapterError, AdapterResult, PrerequisiteError, PrerequisiteKind};
#[cfg(feature = "external-cli")]
pub use external::{CliOutput, ExternalCliAdapter};
pub use native::{NativeAdapter, NATIVE_BACKEND};
pub use registry::AdapterRegistry;
pub use traits::{AdapterFactory, RuntimeAdapter};

use crate::config::Configuration;
use crate::orchestration::{ExpertRuntime, RuntimeDeps};

/// Build the registry of every backend available to `config`.
///
/// The native backend is always registered first, followed by the
/// `[[backends]]` entries in file order.
pub fn compose_registry(config: &Configuration, deps: RuntimeDeps) -> AdapterResult<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();

    #[cfg(feature = "external-cli")]
    let (store, experts) = (deps.store.clone(), deps.experts.clone());

    let runtime = Arc::new(ExpertRuntime::with_config(deps, config.runtime_config()));
    native::register(&mut registry, runtime)?;

    #[cfg(feature = "external-cli")]
    for backend in &config.backends {
        external::register(&mut registry, backend.clone(), store.clone(), experts.clone())?;
    }
    #[cfg(not(feature = "external-cli"))]
    if !config.backends.is_empty() {
        tracing::warn!(
            count = config.backends.len(),
            "External backends are configured but the external-cli feature is disabled"
        );
    }

    tracing::info!(backends = ?registry.names(), "Backend registry composed");
    Ok(registry)
}
