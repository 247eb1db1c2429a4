use argus::channels::{Dispatcher, NotifyChannel};
use argus::config::Config;
use argus::error::ArgusError;
use argus::monitor::Monitor;
use argus::sample::{Sample, StationProbe};
use argus::state::{Phase, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

struct ScriptedProbe {
    samples: Mutex<VecDeque<Sample>>,
}

impl ScriptedProbe {
    fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
        }
    }
}

#[async_trait]
impl StationProbe for ScriptedProbe {
    async fn sample(&self) -> Sample {
        self.samples
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Sample::unreachable)
    }
}

struct Recorder {
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NotifyChannel for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn send(&self, text: &str) -> argus::Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct FailingChannel;

#[async_trait]
impl NotifyChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _text: &str) -> argus::Result<()> {
        Err(ArgusError::network("wired to fail"))
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.station.url = "http://wallbox.test/user/user.html".to_string();
    config.monitor.state_file = dir.join("state.json").to_string_lossy().into_owned();
    config.monitor.timezone = "UTC".to_string();
    config
}

fn recording_monitor(
    config: &Config,
    samples: Vec<Sample>,
) -> (Monitor, Arc<Mutex<Vec<String>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new(vec![Box::new(Recorder { sent: sent.clone() })]);
    let monitor =
        Monitor::with_probe(config, Box::new(ScriptedProbe::new(samples)), dispatcher).unwrap();
    (monitor, sent)
}

fn cable(power: f64, energy: f64) -> Sample {
    Sample {
        power_kw: Some(power),
        total_energy_kwh: Some(energy),
        cable_present: Some(true),
        page_reachable: true,
    }
}

fn idle() -> Sample {
    Sample {
        power_kw: None,
        total_energy_kwh: None,
        cable_present: Some(false),
        page_reachable: true,
    }
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

#[tokio::test]
async fn full_cable_session_produces_the_expected_narrative() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.pricing.price_per_kwh = Some(0.30);

    let samples = vec![
        cable(0.0, 100.0),
        cable(2.3, 100.0),
        cable(2.3, 101.2),
        cable(0.0, 101.8),
        idle(),
    ];
    let (monitor, sent) = recording_monitor(&config, samples);

    for minute in 0..5 {
        monitor.tick_at(at(minute)).await.unwrap();
    }

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 4, "messages: {:?}", messages);
    assert!(messages[0].contains("🔌"));
    assert!(messages[0].contains("cable connected."));
    assert!(messages[1].contains("⚡"));
    assert!(messages[1].contains("charging started."));
    assert!(messages[2].contains("charging stopped."));
    assert!(messages[2].contains("1.80 kWh"));
    assert!(messages[2].contains("00:02"));
    assert!(messages[3].contains("cable disconnected."));
    assert!(messages[3].contains("charged 1.80 kWh for 0.54 €"));

    let state = StateStore::new(config.monitor.state_file.clone()).load();
    assert_eq!(state.phase, Phase::Idle);
}

#[tokio::test]
async fn rate_update_fires_after_five_minutes_of_charging() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let samples = vec![cable(2.3, 100.0), cable(2.3, 100.3)];
    let (monitor, sent) = recording_monitor(&config, samples);

    monitor.tick_at(at(0)).await.unwrap();
    monitor.tick_at(at(7)).await.unwrap();

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 3, "messages: {:?}", messages);
    assert!(messages[2].contains("⏳ charging power: 2.30 kW"));
}

#[tokio::test]
async fn single_outage_within_grace_stays_silent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let samples = vec![
        cable(2.3, 100.0),
        Sample::unreachable(),
        cable(2.3, 100.5),
    ];
    let (monitor, sent) = recording_monitor(&config, samples);

    for minute in 0..3 {
        monitor.tick_at(at(minute)).await.unwrap();
    }

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 2, "only connect and start: {:?}", messages);

    let state = StateStore::new(config.monitor.state_file.clone()).load();
    assert_eq!(state.phase, Phase::Charging);
    assert_eq!(state.unavailable_strikes, 0);
}

#[tokio::test]
async fn outage_past_the_grace_window_forces_a_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let grace = config.monitor.offline_grace_samples;

    let mut samples = vec![cable(2.3, 100.0)];
    samples.extend(std::iter::repeat_with(Sample::unreachable).take((grace + 1) as usize));
    let (monitor, sent) = recording_monitor(&config, samples);

    for minute in 0..(grace + 2) {
        monitor.tick_at(at(minute)).await.unwrap();
    }

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 3, "messages: {:?}", messages);
    assert!(messages[2].contains("cable disconnected."));

    let state = StateStore::new(config.monitor.state_file.clone()).load();
    assert_eq!(state.phase, Phase::Idle);
}

#[tokio::test]
async fn replaying_the_same_reading_sends_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let samples = vec![cable(2.3, 100.0), cable(2.3, 100.0)];
    let (monitor, sent) = recording_monitor(&config, samples);

    monitor.tick_at(at(0)).await.unwrap();
    assert_eq!(sent.lock().unwrap().len(), 2);

    monitor.tick_at(at(1)).await.unwrap();
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_dispatch_marks_the_event_as_seen() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    // First invocation: every send fails, the tick must still succeed
    let dispatcher = Dispatcher::new(vec![Box::new(FailingChannel)]);
    let monitor = Monitor::with_probe(
        &config,
        Box::new(ScriptedProbe::new(vec![cable(2.3, 100.0)])),
        dispatcher,
    )
    .unwrap();
    monitor.tick_at(at(0)).await.unwrap();

    let state = StateStore::new(config.monitor.state_file.clone()).load();
    assert_eq!(state.phase, Phase::Charging);
    assert!(state.notified_started, "event counts as seen without retry");

    // Next invocation with a working transport must not replay the event
    let (monitor, sent) = recording_monitor(&config, vec![cable(2.3, 100.2)]);
    monitor.tick_at(at(1)).await.unwrap();
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pause_and_resume_inside_one_cable_session_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let samples = vec![
        cable(2.3, 100.0),
        cable(0.4, 101.0),
        cable(2.3, 101.0),
        cable(0.4, 101.5),
    ];
    let (monitor, sent) = recording_monitor(&config, samples);

    for minute in 0..4 {
        monitor.tick_at(at(minute)).await.unwrap();
    }

    let messages = sent.lock().unwrap().clone();
    // connect, started, stopped; the resumed charge and its stop are
    // suppressed by the per-session idempotency flags
    assert_eq!(messages.len(), 3, "messages: {:?}", messages);

    let state = StateStore::new(config.monitor.state_file.clone()).load();
    let cable_total = state.cable.and_then(|c| c.consumed_kwh).unwrap();
    assert!((cable_total - 1.5).abs() < 1e-9);
}

#[tokio::test]
async fn unplug_after_resumed_charge_does_not_repeat_the_stop() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let samples = vec![
        cable(2.3, 100.0),
        cable(0.4, 101.0),
        cable(2.3, 101.0),
        idle(),
    ];
    let (monitor, sent) = recording_monitor(&config, samples);

    for minute in 0..4 {
        monitor.tick_at(at(minute)).await.unwrap();
    }

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 4, "messages: {:?}", messages);
    assert!(messages[2].contains("charging stopped."));
    assert!(messages[3].contains("cable disconnected."));

    // The next plug-in starts with clean idempotency guards
    let state = StateStore::new(config.monitor.state_file.clone()).load();
    assert_eq!(state.phase, Phase::Idle);
    assert!(!state.notified_started);
    assert!(!state.notified_stopped);
}
