//! Configuration management.
//!
//! This module provides configuration loading through TOML files and
//! environment variable overrides via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use erk::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//!
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/erk.toml"))).unwrap();
//! env.apply_overrides(&mut loader.config);
//!
//! println!("Backend: {}", loader.config.runtime.default_backend);
//! println!("Max steps: {}", loader.config.runtime.max_steps);
//! ```

pub mod config;
pub mod environment;

pub use self::config::{
    BackendConfig, Configuration, ConfigurationLoader, LoggingConfig, RuntimeSection,
    StorageConfig,
};
pub use self::environment::EnvironmentLoader;
