//! Per-invocation orchestration for Argus
//!
//! One tick is one read-modify-write of the persisted state: load state,
//! take a sample, advance the state machine, decide and dispatch
//! notifications, invoke the hook, and persist. The external scheduler
//! guarantees ticks never overlap.

use crate::channels::Dispatcher;
use crate::config::Config;
use crate::error::Result;
use crate::hook::TransitionHook;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::machine::StateMachine;
use crate::notify::NotificationPolicy;
use crate::sample::{HttpStationProbe, StationProbe};
use crate::state::StateStore;
use chrono::{DateTime, Utc};

/// The monitor wiring for one charging point
pub struct Monitor {
    machine: StateMachine,
    policy: NotificationPolicy,
    store: StateStore,
    probe: Box<dyn StationProbe>,
    dispatcher: Dispatcher,
    hook: Option<TransitionHook>,
    logger: crate::logging::StructuredLogger,
}

impl Monitor {
    /// Build the monitor with the real HTTP probe and configured transports
    pub fn from_config(config: &Config) -> Result<Self> {
        let probe = Box::new(HttpStationProbe::new(&config.station)?);
        let dispatcher = Dispatcher::from_config(&config.notify)?;
        Self::with_probe(config, probe, dispatcher)
    }

    /// Build the monitor around an explicit probe and dispatcher
    pub fn with_probe(
        config: &Config,
        probe: Box<dyn StationProbe>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        Ok(Self {
            machine: StateMachine::new(&config.monitor),
            policy: NotificationPolicy::from_config(config)?,
            store: StateStore::new(config.monitor.state_file.clone()),
            probe,
            dispatcher,
            hook: TransitionHook::from_config(&config.hook),
            logger: get_logger("monitor"),
        })
    }

    /// Run one sample-and-decide cycle at the current time
    pub async fn tick(&self) -> Result<()> {
        self.tick_at(Utc::now()).await
    }

    /// Run one sample-and-decide cycle at an explicit time
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.store.load();
        let sample = self.probe.sample().await;
        self.logger.info(&format!(
            "Reading: power={} energy={} reachable={}",
            describe(sample.power_kw, "kW"),
            describe(sample.total_energy_kwh, "kWh"),
            sample.page_reachable
        ));

        let previous_phase = state.phase;
        let events = self.machine.advance(&mut state, &sample, now);

        let logger = match state.cable.as_ref() {
            Some(cable) => get_logger_with_context(
                LogContext::new("monitor").with_session_id(cable.id.clone()),
            ),
            None => self.logger.clone(),
        };
        logger.info(&format!(
            "Phase: {:?} -> {:?} ({} event(s))",
            previous_phase,
            state.phase,
            events.len()
        ));

        let requests = self.policy.decide(&events, &mut state, now);
        self.dispatcher.dispatch(&requests).await;

        if let Some(hook) = &self.hook {
            for _event in &events {
                hook.run(&state).await;
            }
        }

        // The state is persisted even when dispatch failed: an event is
        // considered seen once decided, never replayed.
        self.store.save(&state)?;
        Ok(())
    }
}

fn describe(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.2} {}", v, unit),
        None => "n/a".to_string(),
    }
}
