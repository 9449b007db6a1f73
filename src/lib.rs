//! wa-recency - rank WhatsApp contacts by when you last talked
//!
//! A small web service: the browser opens a WebSocket, a WhatsApp Web session
//! is started behind an automation bridge, the login QR code is relayed to the
//! page, and once the account is ready every contact is scanned for its most
//! recent message. Results come back sorted newest first.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write ~/.wa-recency/config.toml
//! wa-recency init
//!
//! # Serve the front-end on :3001
//! wa-recency serve --bridge-url http://127.0.0.1:3002
//! ```

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod scan;
pub mod server;
pub mod session;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use error::{ErrorCode, SessionError, WorkflowError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
