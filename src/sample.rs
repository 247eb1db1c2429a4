//! Status page sampling for Argus
//!
//! One reading of the wallbox status page per invocation. The probe never
//! errors outward: any transport or parse failure degrades to an unreachable
//! sample, which the state machine absorbs through its grace window.

use crate::config::StationConfig;
use crate::error::Result;
use crate::logging::get_logger;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// One reading of the wallbox status page
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Charging rate in kW; `None` if the field could not be parsed
    pub power_kw: Option<f64>,

    /// Cumulative energy counter in kWh; `None` if the field could not be
    /// parsed. The device may reset this to a lower value.
    pub total_energy_kwh: Option<f64>,

    /// Cable/connection signal as classified by the sampling adapter;
    /// `None` when the page exposes no usable marker
    pub cable_present: Option<bool>,

    /// Whether the status page was retrievable at all
    pub page_reachable: bool,
}

impl Sample {
    /// Sample representing a failed retrieval
    pub fn unreachable() -> Self {
        Self {
            power_kw: None,
            total_energy_kwh: None,
            cable_present: None,
            page_reachable: false,
        }
    }

    /// Reachable page with every field unknown
    pub fn is_blank(&self) -> bool {
        self.page_reachable
            && self.power_kw.is_none()
            && self.total_energy_kwh.is_none()
            && self.cable_present.is_none()
    }

    /// Whether the state machine should treat this sample as unreachable.
    /// A reachable page that yields no usable field counts the same as a
    /// failed retrieval, but must not clobber stored readings.
    pub fn is_unusable(&self) -> bool {
        !self.page_reachable || self.is_blank()
    }
}

/// Sampling adapter interface.
///
/// The classification of the raw page into power/energy/cable signals is the
/// adapter's business; the state machine never sees page markup.
#[async_trait]
pub trait StationProbe: Send + Sync {
    /// Take one reading. Never fails; retrieval problems yield an
    /// unreachable sample.
    async fn sample(&self) -> Sample;
}

/// Probe that scrapes the wallbox's built-in status page over HTTP
pub struct HttpStationProbe {
    url: String,
    client: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl HttpStationProbe {
    /// Create a new probe for the configured station
    pub fn new(config: &StationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            client,
            logger: get_logger("probe"),
        })
    }
}

#[async_trait]
impl StationProbe for HttpStationProbe {
    async fn sample(&self) -> Sample {
        let response = match self.client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.logger.warn(&format!("Status page unreachable: {}", e));
                return Sample::unreachable();
            }
        };

        if !response.status().is_success() {
            self.logger
                .warn(&format!("Status page returned {}", response.status()));
            return Sample::unreachable();
        }

        match response.text().await {
            Ok(body) => parse_status_page(&body),
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to read status page body: {}", e));
                Sample::unreachable()
            }
        }
    }
}

static POWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*kw").expect("power pattern"));

static ENERGY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(k?wh)").expect("energy pattern"));

/// Classify a retrieved status page body into a sample.
///
/// The page renders two input fields, `chargingRate` and `consumed`. While a
/// cable is attached their values carry figures like `2.3 kW` and `1.27 kWh`;
/// with no cable the fields are present but empty. Missing fields mean the
/// page layout was not recognized, which is reported as an unknown cable
/// signal so the grace window applies.
pub fn parse_status_page(body: &str) -> Sample {
    let charging_field = extract_input_value(body, "chargingRate");
    let consumed_field = extract_input_value(body, "consumed");

    if charging_field.is_none() && consumed_field.is_none() {
        return Sample {
            power_kw: None,
            total_energy_kwh: None,
            cable_present: None,
            page_reachable: true,
        };
    }

    let power_kw = charging_field.as_deref().and_then(parse_power_kw);
    let total_energy_kwh = consumed_field.as_deref().and_then(parse_energy_kwh);
    let cable_present = Some(power_kw.is_some() || total_energy_kwh.is_some());

    Sample {
        power_kw,
        total_energy_kwh,
        cable_present,
        page_reachable: true,
    }
}

/// Extract the `value` attribute of the input element with the given id
fn extract_input_value(body: &str, id: &str) -> Option<String> {
    let marker = format!("id=\"{}\"", id);
    let at = body.find(&marker)?;
    let tag_end = body[at..].find('>').map(|i| at + i)?;
    let tag = &body[at..tag_end];
    let value_start = tag.find("value=\"")? + "value=\"".len();
    let rest = &tag[value_start..];
    let value_end = rest.find('"')?;
    Some(rest[..value_end].to_string())
}

/// Parse a charging-rate field like `2.3 kW` into kW
pub fn parse_power_kw(text: &str) -> Option<f64> {
    let caps = POWER_RE.captures(text)?;
    caps.get(1)?.as_str().parse::<f64>().ok()
}

/// Parse an energy field like `740.00 Wh` or `1.27 kWh` into kWh
pub fn parse_energy_kwh(text: &str) -> Option<f64> {
    let caps = ENERGY_RE.captures(text)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    if unit == "kwh" {
        Some(value)
    } else {
        Some(value / 1000.0)
    }
}
