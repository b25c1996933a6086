//! relaygate - single-endpoint forwarding gateway
//!
//! This library provides the core functionality for the relaygate server:
//! configuration, the upstream relay and its HTTP surface.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
