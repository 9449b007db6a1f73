//! Configuration Module
//!
//! Handles application configuration loading, validation, and management.

mod types;

pub use types::{
    BridgeConfig, Config, LoggingConfig, ScanConfig, ServerConfig, SyncConfig, wa_recency_home,
};
