use argus::Config;
use std::io::Write;

#[test]
fn from_file_parses_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
station:
  url: "http://192.168.178.51:12800/user/user.html"
  timeout_secs: 20
monitor:
  charging_threshold_kw: 1.5
  offline_grace_samples: 3
  timezone: "Europe/Berlin"
notify:
  discord_webhook_url: "https://discord.com/api/webhooks/1/abc"
pricing:
  price_per_kwh: 0.30
hook:
  command: "/usr/local/bin/wallbox-hook"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.station.timeout_secs, 20);
    assert!((config.monitor.charging_threshold_kw - 1.5).abs() < 1e-9);
    assert_eq!(config.monitor.offline_grace_samples, 3);
    assert_eq!(
        config.notify.discord_webhook_url,
        "https://discord.com/api/webhooks/1/abc"
    );
    assert_eq!(config.pricing.price_per_kwh, Some(0.30));
    assert_eq!(config.hook.command, "/usr/local/bin/wallbox-hook");
    assert!(config.validate().is_ok());
}

#[test]
fn from_file_rejects_invalid_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "station: [not, a, mapping").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn default_config_fails_validation_without_url() {
    let config = Config::default();
    assert!(config.validate().is_err());
}
