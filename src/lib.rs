//! # Argus - Wallbox Charging Monitor
//!
//! A Rust monitor for a single wallbox charging point. An external scheduler
//! (cron or a systemd timer) invokes the binary once per sampling interval;
//! each invocation takes one reading of the station status page, advances a
//! persisted session state machine, and sends the resulting notifications.
//!
//! ## Features
//!
//! - **Session Tracking**: Cable and charging sessions with energy, duration,
//!   and optional cost totals
//! - **Noise Tolerant**: Grace window for transient page outages, debounced
//!   against unknown readings and device counter resets
//! - **Deduplicated Notifications**: Idempotency flags persisted across
//!   invocations guarantee at most one notification per logical event
//! - **Multiple Transports**: Discord webhook, ntfy, and Pushover
//! - **External Hook**: Optional executable invoked per transition with a
//!   structured state snapshot
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `sample`: Status page sampling and scraped-field parsing
//! - `state`: Persisted cross-invocation state and the atomic state store
//! - `machine`: Phase classification state machine with grace window
//! - `session`: Charging and cable session accumulation
//! - `notify`: Notification decision layer and message formatting
//! - `channels`: Notification transports and fan-out dispatch
//! - `hook`: External log hook invocation
//! - `monitor`: Per-invocation orchestration

pub mod channels;
pub mod config;
pub mod error;
pub mod hook;
pub mod logging;
pub mod machine;
pub mod monitor;
pub mod notify;
pub mod sample;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{ArgusError, Result};
pub use monitor::Monitor;
