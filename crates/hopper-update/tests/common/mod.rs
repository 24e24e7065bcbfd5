//! Common test infrastructure for hopper-update tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Tags, repository names, asset content
//! - `builders`: Fluent builders for release JSON and updater configs
//! - `mock_server`: Wiremock setup for the releases API and asset downloads
//! - `fakes`: In-memory release source, relauncher, listener and log

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod fakes;
pub mod mock_server;

pub use builders::*;
pub use constants::*;
pub use fakes::*;
pub use mock_server::*;
