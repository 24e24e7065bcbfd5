//! Type definitions for Hopper configuration

mod updater_config;

pub use updater_config::*;
