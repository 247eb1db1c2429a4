//! Phase classification state machine for Argus
//!
//! Converts the stream of independent samples into phase transitions,
//! suppressing the noise a scraped status page produces: transient
//! unreachability, momentarily unknown fields, and device counter resets.

use crate::logging::get_logger;
use crate::sample::Sample;
use crate::session::{CableSummary, ChargeSession, SessionSummary};
use crate::state::{PersistedState, Phase};
use chrono::{DateTime, Utc};

/// A real state transition, after debouncing
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A cable was plugged in
    CableConnected,

    /// Power rose above the charging threshold
    ChargingStarted,

    /// Power fell back to or below the threshold; the cable stays in
    ChargingStopped {
        summary: SessionSummary,
        /// Running cable-session total after folding this charge in
        cable_total_kwh: Option<f64>,
    },

    /// The cable was unplugged (or the grace window forced a disconnect)
    CableDisconnected(CableSummary),
}

/// The session state machine
pub struct StateMachine {
    threshold_kw: f64,
    grace_samples: u32,
    logger: crate::logging::StructuredLogger,
}

impl StateMachine {
    /// Create a machine with the configured tuning
    pub fn new(config: &crate::config::MonitorConfig) -> Self {
        Self {
            threshold_kw: config.charging_threshold_kw,
            grace_samples: config.offline_grace_samples,
            logger: get_logger("machine"),
        }
    }

    /// Classify one sample against the stored state, mutating the state and
    /// returning the transitions that really happened.
    pub fn advance(
        &self,
        state: &mut PersistedState,
        sample: &Sample,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let mut events = Vec::new();

        // Unreachable pages and reachable-but-blank pages both run the grace
        // window; neither may overwrite the stored readings.
        if sample.is_unusable() {
            self.note_unavailable(state, now, &mut events);
            return events;
        }

        if state.phase == Phase::Unavailable {
            let resumed = state.resume_phase.take().unwrap_or(Phase::Idle);
            self.logger.info(&format!(
                "Status page back after {} missed samples, resuming {:?}",
                state.unavailable_strikes, resumed
            ));
            state.phase = resumed;
            state.unavailable_since = None;
            state.unavailable_strikes = 0;
        }

        if let Some(power) = sample.power_kw {
            state.stored_power_kw = power;
        }
        if let Some(total) = sample.total_energy_kwh {
            state.last_total_kwh = Some(total);
        }

        let cable = self.cable_present(sample);
        let power_above = sample.power_kw.map(|p| p > self.threshold_kw);

        match state.phase {
            Phase::Idle => {
                if cable {
                    state.begin_cable(now);
                    events.push(Event::CableConnected);
                    if power_above == Some(true) {
                        self.start_charging(state, sample, now);
                        events.push(Event::ChargingStarted);
                    }
                }
            }
            Phase::CableConnected => {
                if !cable {
                    if let Some(event) = self.disconnect(state, now) {
                        events.push(event);
                    }
                } else if power_above == Some(true) {
                    self.start_charging(state, sample, now);
                    events.push(Event::ChargingStarted);
                }
            }
            Phase::Charging => {
                if let Some(session) = state.session.as_mut() {
                    session.update(sample.total_energy_kwh);
                }
                if !cable {
                    events.push(self.stop_charging(state, now));
                    if let Some(event) = self.disconnect(state, now) {
                        events.push(event);
                    }
                } else if power_above == Some(false) {
                    events.push(self.stop_charging(state, now));
                }
                // An unknown power reading keeps the session open; the last
                // known reading still governs the phase.
            }
            Phase::Unavailable => {}
        }

        events
    }

    /// Cable signal for this sample. When the page exposes no explicit
    /// marker, power above the threshold stands in for one.
    fn cable_present(&self, sample: &Sample) -> bool {
        sample
            .cable_present
            .unwrap_or(matches!(sample.power_kw, Some(p) if p > self.threshold_kw))
    }

    fn start_charging(&self, state: &mut PersistedState, sample: &Sample, now: DateTime<Utc>) {
        state.session = Some(ChargeSession::open(now, sample.total_energy_kwh));
        state.phase = Phase::Charging;
        state.last_rate_notify_time = None;
        self.logger.info(&format!(
            "Charging started at {:.2} kW",
            state.stored_power_kw
        ));
    }

    fn stop_charging(&self, state: &mut PersistedState, now: DateTime<Utc>) -> Event {
        let summary = match state.session.take() {
            Some(session) => session.close(now),
            None => SessionSummary {
                started_at: now,
                ended_at: now,
                consumed_kwh: None,
            },
        };
        if let Some(cable) = state.cable.as_mut() {
            cable.absorb(summary.consumed_kwh);
        }
        state.phase = Phase::CableConnected;
        self.logger.info(&format!(
            "Charging stopped, consumed {:?} kWh",
            summary.consumed_kwh
        ));
        Event::ChargingStopped {
            cable_total_kwh: state.cable.as_ref().and_then(|c| c.consumed_kwh),
            summary,
        }
    }

    /// Close the cable session and drop to idle. Returns `None` when no
    /// cable session was open to disconnect.
    fn disconnect(&self, state: &mut PersistedState, now: DateTime<Utc>) -> Option<Event> {
        // A still-open charge session folds in silently; callers emit the
        // stop event themselves when one is due.
        if let Some(session) = state.session.take() {
            let summary = session.close(now);
            if let Some(cable) = state.cable.as_mut() {
                cable.absorb(summary.consumed_kwh);
            }
        }
        let summary = state.cable.take().map(|cable| cable.finish(now));
        state.reset_to_idle();
        summary.map(|s| {
            self.logger
                .info(&format!("Cable disconnected, total {:?} kWh", s.consumed_kwh));
            Event::CableDisconnected(s)
        })
    }

    fn note_unavailable(
        &self,
        state: &mut PersistedState,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        if state.phase != Phase::Unavailable {
            state.resume_phase = Some(state.phase);
            state.phase = Phase::Unavailable;
            state.unavailable_since = Some(now);
            state.unavailable_strikes = 1;
            self.logger.debug("Status page unavailable, grace window open");
            return;
        }

        state.unavailable_strikes = state.unavailable_strikes.saturating_add(1);
        if state.unavailable_strikes <= self.grace_samples {
            return;
        }

        // Grace window elapsed: give up waiting and treat the station as
        // disconnected so the state cannot stay stuck.
        let held = state.resume_phase.unwrap_or(Phase::Idle);
        self.logger.warn(&format!(
            "Status page missing for {} samples while {:?}, forcing disconnect",
            state.unavailable_strikes, held
        ));
        if let Some(event) = self.disconnect(state, now) {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use chrono::TimeZone;

    fn machine() -> StateMachine {
        StateMachine::new(&MonitorConfig::default())
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn idle_sample() -> Sample {
        Sample {
            power_kw: None,
            total_energy_kwh: None,
            cable_present: Some(false),
            page_reachable: true,
        }
    }

    fn cable_sample(power: f64, energy: f64) -> Sample {
        Sample {
            power_kw: Some(power),
            total_energy_kwh: Some(energy),
            cable_present: Some(true),
            page_reachable: true,
        }
    }

    #[test]
    fn idle_to_cable_to_charging() {
        let m = machine();
        let mut state = PersistedState::default();

        let events = m.advance(&mut state, &cable_sample(0.0, 100.0), at(0));
        assert_eq!(events, vec![Event::CableConnected]);
        assert_eq!(state.phase, Phase::CableConnected);

        let events = m.advance(&mut state, &cable_sample(2.3, 100.0), at(1));
        assert_eq!(events, vec![Event::ChargingStarted]);
        assert_eq!(state.phase, Phase::Charging);
        assert!((state.stored_power_kw - 2.3).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_power_does_not_start_charging() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(0.0, 100.0), at(0));

        let events = m.advance(&mut state, &cable_sample(0.9, 100.0), at(1));
        assert!(events.is_empty());
        assert_eq!(state.phase, Phase::CableConnected);
    }

    #[test]
    fn immediate_charging_emits_both_events() {
        let m = machine();
        let mut state = PersistedState::default();

        let events = m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));
        assert_eq!(events, vec![Event::CableConnected, Event::ChargingStarted]);
        assert_eq!(state.phase, Phase::Charging);
    }

    #[test]
    fn charge_stop_carries_consumed_energy() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(0.0, 100.0), at(0));
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(1));
        m.advance(&mut state, &cable_sample(2.3, 101.2), at(10));

        let events = m.advance(&mut state, &cable_sample(0.0, 101.8), at(20));
        match &events[..] {
            [Event::ChargingStopped {
                summary,
                cable_total_kwh,
            }] => {
                let consumed = summary.consumed_kwh.unwrap();
                assert!((consumed - 1.8).abs() < 1e-9);
                assert!((cable_total_kwh.unwrap() - 1.8).abs() < 1e-9);
                assert_eq!(summary.started_at, at(1));
                assert_eq!(summary.ended_at, at(20));
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(state.phase, Phase::CableConnected);
        assert!(state.session.is_none());
    }

    #[test]
    fn disconnect_closes_cable_session() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(0.0, 100.0), at(0));
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(1));
        m.advance(&mut state, &cable_sample(0.0, 102.0), at(30));

        let events = m.advance(&mut state, &idle_sample(), at(31));
        match &events[..] {
            [Event::CableDisconnected(summary)] => {
                assert!((summary.consumed_kwh.unwrap() - 2.0).abs() < 1e-9);
                assert_eq!(summary.connected_since, at(0));
                assert_eq!(summary.disconnected_at, at(31));
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn unplug_while_charging_emits_stop_then_disconnect() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));

        let events = m.advance(&mut state, &idle_sample(), at(10));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::ChargingStopped { .. }));
        assert!(matches!(events[1], Event::CableDisconnected(_)));
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn single_outage_within_grace_is_invisible() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));

        let events = m.advance(&mut state, &Sample::unreachable(), at(1));
        assert!(events.is_empty());
        assert_eq!(state.phase, Phase::Unavailable);
        assert_eq!(state.unavailable_strikes, 1);

        let events = m.advance(&mut state, &cable_sample(2.3, 100.4), at(2));
        assert!(events.is_empty());
        assert_eq!(state.phase, Phase::Charging);
        assert_eq!(state.unavailable_strikes, 0);
        assert!(state.session.is_some());
    }

    #[test]
    fn blank_page_counts_toward_grace_but_keeps_stored_power() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));

        let blank = Sample {
            power_kw: None,
            total_energy_kwh: None,
            cable_present: None,
            page_reachable: true,
        };
        let events = m.advance(&mut state, &blank, at(1));
        assert!(events.is_empty());
        assert_eq!(state.phase, Phase::Unavailable);
        assert!((state.stored_power_kw - 2.3).abs() < 1e-9);
    }

    #[test]
    fn grace_expiry_forces_disconnect() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));
        m.advance(&mut state, &cable_sample(2.3, 101.0), at(1));

        let grace = MonitorConfig::default().offline_grace_samples;
        for i in 0..grace {
            let events = m.advance(&mut state, &Sample::unreachable(), at(2 + i));
            assert!(events.is_empty(), "no event inside the grace window");
        }

        let events = m.advance(&mut state, &Sample::unreachable(), at(2 + grace));
        match &events[..] {
            [Event::CableDisconnected(summary)] => {
                assert!((summary.consumed_kwh.unwrap() - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn grace_expiry_while_idle_stays_silent() {
        let m = machine();
        let mut state = PersistedState::default();

        let grace = MonitorConfig::default().offline_grace_samples;
        for i in 0..=grace {
            let events = m.advance(&mut state, &Sample::unreachable(), at(i));
            assert!(events.is_empty());
        }
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.unavailable_strikes, 0);
    }

    #[test]
    fn replaying_a_terminal_state_yields_no_events() {
        let m = machine();
        let mut state = PersistedState::default();
        let sample = cable_sample(2.3, 100.0);
        m.advance(&mut state, &sample, at(0));

        let before = state.phase;
        let events = m.advance(&mut state, &sample, at(1));
        assert!(events.is_empty());
        assert_eq!(state.phase, before);
    }

    #[test]
    fn unknown_power_keeps_charging_phase() {
        let m = machine();
        let mut state = PersistedState::default();
        m.advance(&mut state, &cable_sample(2.3, 100.0), at(0));

        let murky = Sample {
            power_kw: None,
            total_energy_kwh: Some(100.5),
            cable_present: Some(true),
            page_reachable: true,
        };
        let events = m.advance(&mut state, &murky, at(1));
        assert!(events.is_empty());
        assert_eq!(state.phase, Phase::Charging);
        assert!((state.stored_power_kw - 2.3).abs() < 1e-9);
    }

    #[test]
    fn power_fallback_classifies_cable_when_marker_missing() {
        let m = machine();
        let mut state = PersistedState::default();

        let sample = Sample {
            power_kw: Some(2.3),
            total_energy_kwh: None,
            cable_present: None,
            page_reachable: true,
        };
        let events = m.advance(&mut state, &sample, at(0));
        assert_eq!(events, vec![Event::CableConnected, Event::ChargingStarted]);
    }
}
