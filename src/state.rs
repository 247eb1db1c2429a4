//! Persisted cross-invocation state for Argus
//!
//! The state file is the only memory that outlives an invocation. It is read
//! once at startup, mutated by the state machine, and rewritten atomically
//! (write-then-rename) at the end of every invocation, so a crash mid-write
//! leaves the previous consistent state behind.

use crate::error::Result;
use crate::logging::get_logger;
use crate::session::{CableSession, ChargeSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classified phase of the charging point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cable present
    Idle,

    /// Cable present, charging below threshold or not at all
    CableConnected,

    /// Power above the charging threshold
    Charging,

    /// Status page currently unretrievable, waiting out the grace window
    Unavailable,
}

/// Durable record of the machine's last known state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Current classified phase
    pub phase: Phase,

    /// Phase held before unavailability, restored when the page returns
    pub resume_phase: Option<Phase>,

    /// Open cable session, if a cable is (or was last known to be) present
    pub cable: Option<CableSession>,

    /// Open charge session while in the charging phase
    pub session: Option<ChargeSession>,

    /// Last known power reading, kept for notification text when a later
    /// reading is momentarily unknown
    pub stored_power_kw: f64,

    /// Last known energy counter value
    pub last_total_kwh: Option<f64>,

    /// Whether this session's started notification already fired
    pub notified_started: bool,

    /// Whether this session's stopped notification already fired
    pub notified_stopped: bool,

    /// When the periodic rate update last fired
    pub last_rate_notify_time: Option<DateTime<Utc>>,

    /// When the page first became unreachable
    pub unavailable_since: Option<DateTime<Utc>>,

    /// Consecutive unreachable samples seen so far
    pub unavailable_strikes: u32,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            resume_phase: None,
            cable: None,
            session: None,
            stored_power_kw: 0.0,
            last_total_kwh: None,
            notified_started: false,
            notified_stopped: false,
            last_rate_notify_time: None,
            unavailable_since: None,
            unavailable_strikes: 0,
        }
    }
}

impl PersistedState {
    /// When the current cable session began
    pub fn cable_connected_since(&self) -> Option<DateTime<Utc>> {
        self.cable.as_ref().map(|c| c.connected_since)
    }

    /// When the current charge session began
    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|s| s.started_at)
    }

    /// Start a fresh cable session. The notification idempotency flags reset
    /// here and at disconnect, never mid-session.
    pub fn begin_cable(&mut self, at: DateTime<Utc>) {
        self.cable = Some(CableSession::begin(at));
        self.phase = Phase::CableConnected;
        self.notified_started = false;
        self.notified_stopped = false;
        self.last_rate_notify_time = None;
    }

    /// Drop back to idle after a disconnect, keeping the last known readings.
    /// The idempotency flags survive until the notification layer has decided
    /// this invocation's events; it clears them at the boundary itself.
    pub fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.resume_phase = None;
        self.cable = None;
        self.session = None;
        self.last_rate_notify_time = None;
        self.unavailable_since = None;
        self.unavailable_strikes = 0;
    }
}

/// File-backed store for [`PersistedState`]
pub struct StateStore {
    path: PathBuf,
    logger: crate::logging::StructuredLogger,
}

impl StateStore {
    /// Create a store for the given file path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            logger: get_logger("state"),
        }
    }

    /// Read the persisted state. An absent or corrupt file yields the
    /// default idle state rather than an error.
    pub fn load(&self) -> PersistedState {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.logger.info("No state file found, starting idle");
                return PersistedState::default();
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to read state file, starting idle: {}", e));
                return PersistedState::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                self.logger
                    .warn(&format!("Corrupt state file, starting idle: {}", e));
                PersistedState::default()
            }
        }
    }

    /// Write the state atomically: serialize to a sibling temp file, then
    /// rename over the target.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let contents = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;
        self.logger.debug("Saved state to disk");

        Ok(())
    }
}
