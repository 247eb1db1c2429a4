//! Charging and cable session accumulation for Argus
//!
//! A charge session covers one continuous above-threshold charging period.
//! A cable session covers the whole plug-in period and may contain several
//! charge sessions; its running energy total feeds the cost summary.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// Counter jitter below this is not a device reset
const RESET_EPSILON_KWH: f64 = 1e-6;

/// One charging period above the power threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSession {
    /// When charging began
    pub started_at: DateTime<Utc>,

    /// Energy counter value anchoring consumption; `None` until the first
    /// known reading arrives
    pub baseline_kwh: Option<f64>,

    /// Last known counter value
    pub last_kwh: Option<f64>,

    /// Consumption banked from before device counter resets
    pub reset_carry_kwh: f64,
}

/// Summary of a closed charge session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    /// Consumed energy; `None` if no known counter reading was ever observed
    pub consumed_kwh: Option<f64>,
}

impl ChargeSession {
    /// Open a session, anchoring the baseline to the current known counter
    /// value if available. Anchoring is deferred otherwise; unknown readings
    /// never corrupt the baseline.
    pub fn open(at: DateTime<Utc>, energy_kwh: Option<f64>) -> Self {
        let mut session = Self {
            started_at: at,
            baseline_kwh: None,
            last_kwh: None,
            reset_carry_kwh: 0.0,
        };
        session.update(energy_kwh);
        session
    }

    /// Feed one counter reading into the session.
    ///
    /// A decrease relative to the last known value means the device counter
    /// reset: the segment delivered so far is banked and the baseline
    /// re-anchors at the new lower value, so consumption keeps adding up
    /// instead of going negative.
    pub fn update(&mut self, energy_kwh: Option<f64>) {
        let Some(reading) = energy_kwh else {
            return;
        };
        match (self.baseline_kwh, self.last_kwh) {
            (None, _) => {
                self.baseline_kwh = Some(reading);
                self.last_kwh = Some(reading);
            }
            (Some(baseline), Some(last)) if reading + RESET_EPSILON_KWH < last => {
                self.reset_carry_kwh += (last - baseline).max(0.0);
                self.baseline_kwh = Some(reading);
                self.last_kwh = Some(reading);
            }
            _ => {
                self.last_kwh = Some(reading);
            }
        }
    }

    /// Consumption accumulated so far, `None` before any known reading
    pub fn consumed_so_far(&self) -> Option<f64> {
        let baseline = self.baseline_kwh?;
        let last = self.last_kwh.unwrap_or(baseline);
        Some(self.reset_carry_kwh + (last - baseline).max(0.0))
    }

    /// Close the session
    pub fn close(self, at: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            started_at: self.started_at,
            ended_at: at,
            consumed_kwh: self.consumed_so_far(),
        }
    }
}

impl SessionSummary {
    /// Elapsed charging time
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// The whole plug-in period, from cable connect to disconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CableSession {
    /// Identifier correlating log lines and hook payloads
    pub id: String,

    /// When the cable was connected
    pub connected_since: DateTime<Utc>,

    /// Energy delivered across all charge sessions so far; `None` until a
    /// charge session contributes a known figure
    pub consumed_kwh: Option<f64>,
}

/// Summary of a finished cable session
#[derive(Debug, Clone, PartialEq)]
pub struct CableSummary {
    pub id: String,
    pub connected_since: DateTime<Utc>,
    pub disconnected_at: DateTime<Utc>,

    /// Total energy delivered; `None` if never known
    pub consumed_kwh: Option<f64>,
}

impl CableSession {
    /// Start a cable session
    pub fn begin(at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            connected_since: at,
            consumed_kwh: None,
        }
    }

    /// Fold a closed charge session's consumption into the running total
    pub fn absorb(&mut self, consumed_kwh: Option<f64>) {
        if let Some(consumed) = consumed_kwh {
            *self.consumed_kwh.get_or_insert(0.0) += consumed;
        }
    }

    /// Finish the cable session
    pub fn finish(self, at: DateTime<Utc>) -> CableSummary {
        CableSummary {
            id: self.id,
            connected_since: self.connected_since,
            disconnected_at: at,
            consumed_kwh: self.consumed_kwh,
        }
    }
}

impl CableSummary {
    /// Session cost at a fixed price per kWh, when both are known
    pub fn cost(&self, price_per_kwh: Option<f64>) -> Option<f64> {
        let price = price_per_kwh?;
        let consumed = self.consumed_kwh?;
        Some(consumed * price)
    }
}
