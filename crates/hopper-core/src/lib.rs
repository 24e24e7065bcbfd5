//! # hopper-core
//!
//! Core library for Hopper providing:
//! - Updater configuration types and the hierarchical config loader
//! - Core error type
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::UpdaterConfig;
