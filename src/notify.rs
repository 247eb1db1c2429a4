//! Notification decision layer for Argus
//!
//! Turns state machine events into concrete notification requests, enforcing
//! the per-session idempotency guards and the periodic rate update. Message
//! formats follow the project's emoji-tagged reference texts.

use crate::config::Config;
use crate::error::{ArgusError, Result};
use crate::logging::get_logger;
use crate::machine::Event;
use crate::session::{CableSummary, SessionSummary};
use crate::state::{PersistedState, Phase};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// What a notification is about, used for routing and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    CableConnected,
    ChargingStarted,
    ChargingStopped,
    CableDisconnected,
    RateUpdate,
}

/// A finished message ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub text: String,
}

/// Decides which notifications an invocation's transitions warrant
pub struct NotificationPolicy {
    rate_interval: Duration,
    price_per_kwh: Option<f64>,
    currency_symbol: String,
    timezone: Tz,
    logger: crate::logging::StructuredLogger,
}

impl NotificationPolicy {
    /// Build the policy from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let timezone = config
            .monitor
            .timezone
            .parse::<Tz>()
            .map_err(|e| ArgusError::validation("monitor.timezone", &e.to_string()))?;
        Ok(Self {
            rate_interval: Duration::minutes(config.monitor.rate_update_minutes),
            price_per_kwh: config.pricing.price_per_kwh,
            currency_symbol: config.pricing.currency_symbol.clone(),
            timezone,
            logger: get_logger("notify"),
        })
    }

    /// Map this invocation's events to notification requests.
    ///
    /// Sets the idempotency flags and the rate-update bookkeeping on the
    /// state; the caller persists the state unconditionally afterwards, so a
    /// crash after dispatch cannot replay an event (fail-open by design).
    pub fn decide(
        &self,
        events: &[Event],
        state: &mut PersistedState,
        now: DateTime<Utc>,
    ) -> Vec<NotificationRequest> {
        let mut requests = Vec::new();
        let stamp = self.local_timestamp(now);

        for event in events {
            match event {
                Event::CableConnected => {
                    requests.push(NotificationRequest {
                        kind: NotificationKind::CableConnected,
                        text: format!("🔌 {}: cable connected.", stamp),
                    });
                }
                Event::ChargingStarted => {
                    if state.notified_started {
                        self.logger.debug("Charging started again, already notified");
                    } else {
                        state.notified_started = true;
                        requests.push(NotificationRequest {
                            kind: NotificationKind::ChargingStarted,
                            text: format!("⚡ {}: charging started.", stamp),
                        });
                    }
                }
                Event::ChargingStopped {
                    summary,
                    cable_total_kwh,
                } => {
                    if state.notified_stopped {
                        self.logger.debug("Charging stopped again, already notified");
                    } else {
                        state.notified_stopped = true;
                        requests.push(NotificationRequest {
                            kind: NotificationKind::ChargingStopped,
                            text: self.stopped_text(&stamp, summary, *cable_total_kwh),
                        });
                    }
                }
                Event::CableDisconnected(summary) => {
                    requests.push(NotificationRequest {
                        kind: NotificationKind::CableDisconnected,
                        text: self.disconnected_text(&stamp, summary),
                    });
                    // Cable boundary: the per-session guards reset here, after
                    // any stop decision in the same invocation has seen them
                    state.notified_started = false;
                    state.notified_stopped = false;
                }
            }
        }

        if state.phase == Phase::Charging
            && let Some(started) = state.session_start()
        {
            // Measured from session start or the last update, whichever is later
            let anchor = state
                .last_rate_notify_time
                .map_or(started, |t| t.max(started));
            if now - anchor >= self.rate_interval {
                state.last_rate_notify_time = Some(now);
                requests.push(NotificationRequest {
                    kind: NotificationKind::RateUpdate,
                    text: format!("⏳ charging power: {:.2} kW", state.stored_power_kw),
                });
            }
        }

        requests
    }

    fn stopped_text(
        &self,
        stamp: &str,
        summary: &SessionSummary,
        cable_total_kwh: Option<f64>,
    ) -> String {
        let mut text = format!(
            "🔋 {}: charging stopped.\n🔍 consumed: {} in {}",
            stamp,
            format_energy(summary.consumed_kwh),
            format_duration(summary.duration())
        );
        if let Some(total) = cable_total_kwh {
            text.push_str(&format!(" (cable total: {})", format_energy(Some(total))));
        }
        text
    }

    fn disconnected_text(&self, stamp: &str, summary: &CableSummary) -> String {
        let mut text = format!("🏁 {}: cable disconnected.", stamp);
        if let Some(cost) = summary.cost(self.price_per_kwh)
            && summary.consumed_kwh.is_some_and(|kwh| kwh > 0.0)
        {
            text.push_str(&format!(
                "\n💶 charged {} for {:.2} {}",
                format_energy(summary.consumed_kwh),
                cost,
                self.currency_symbol
            ));
        }
        text
    }

    fn local_timestamp(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format("%d.%m.%y, %H:%M")
            .to_string()
    }
}

/// Render an energy figure the way the station shows it: kWh with two
/// decimals from 1 kWh up, Wh below that. Unknown values render as an
/// explicit marker, never as a false zero.
pub fn format_energy(kwh: Option<f64>) -> String {
    match kwh {
        None => "n/a".to_string(),
        Some(value) if value >= 1.0 => format!("{:.2} kWh", value),
        Some(value) => format!("{:.2} Wh", value * 1000.0),
    }
}

/// Render a duration as hours:minutes
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
