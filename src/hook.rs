//! External log hook for Argus
//!
//! When configured, an external executable is invoked once per transition
//! with a JSON snapshot of the persisted state, so home-automation glue can
//! react without scraping the log file. Hook failures never affect the tick.

use crate::config::HookConfig;
use crate::logging::get_logger;
use crate::state::PersistedState;

/// Runs the configured transition hook
pub struct TransitionHook {
    command: String,
    timeout: std::time::Duration,
    logger: crate::logging::StructuredLogger,
}

impl TransitionHook {
    /// Build the hook from configuration; `None` when no command is set
    pub fn from_config(config: &HookConfig) -> Option<Self> {
        if config.command.is_empty() {
            return None;
        }
        Some(Self {
            command: config.command.clone(),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
            logger: get_logger("hook"),
        })
    }

    /// Snapshot of the state fields the hook contract exposes
    pub fn payload(state: &PersistedState) -> serde_json::Value {
        serde_json::json!({
            "state": state.phase,
            "start_time": state.session_start(),
            "stored_power": state.stored_power_kw,
            "total_energy_kwh": state.last_total_kwh,
            "notified": {
                "started": state.notified_started,
                "stopped": state.notified_stopped,
            },
            "repeat_check": state.last_rate_notify_time,
        })
    }

    /// Invoke the hook with the current state snapshot. Failures and
    /// timeouts are logged and swallowed.
    pub async fn run(&self, state: &PersistedState) {
        let payload = Self::payload(state).to_string();
        let invocation = tokio::process::Command::new(&self.command)
            .arg(payload)
            .output();

        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(output)) if output.status.success() => {
                self.logger.debug("Hook invoked");
            }
            Ok(Ok(output)) => {
                self.logger
                    .warn(&format!("Hook exited with {}", output.status));
            }
            Ok(Err(e)) => {
                self.logger.warn(&format!("Hook failed to run: {}", e));
            }
            Err(_) => {
                self.logger.warn(&format!(
                    "Hook timed out after {:?}, giving up",
                    self.timeout
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;

    #[test]
    fn disabled_without_command() {
        let config = HookConfig::default();
        assert!(TransitionHook::from_config(&config).is_none());

        let config = HookConfig {
            command: "/usr/local/bin/wallbox-hook".to_string(),
            ..Default::default()
        };
        assert!(TransitionHook::from_config(&config).is_some());
    }

    #[test]
    fn payload_snapshots_state() {
        let mut state = PersistedState::default();
        state.begin_cable(chrono::Utc::now());
        state.stored_power_kw = 2.3;
        state.last_total_kwh = Some(104.2);
        state.notified_started = true;

        let payload = TransitionHook::payload(&state);
        assert_eq!(payload["state"], serde_json::json!(Phase::CableConnected));
        assert_eq!(payload["stored_power"], serde_json::json!(2.3));
        assert_eq!(payload["total_energy_kwh"], serde_json::json!(104.2));
        assert_eq!(payload["notified"]["started"], serde_json::json!(true));
        assert!(payload["start_time"].is_null());
    }
}
