//! Meter-value parsing (power, energy, voltage, current, temperature).
//!
//! Pure function over the nested `meterValue` / `sampledValue` wire shape:
//! identical input always yields identical output, unrecognized measurands
//! are ignored, and a non-numeric sampled value contributes 0 rather than
//! failing the whole frame — the device is misbehaving, not the server.

use serde::Deserialize;

const MEASURAND_POWER: &str = "Power.Active.Import";
const MEASURAND_ENERGY: &str = "Energy.Active.Import.Register";
const MEASURAND_VOLTAGE: &str = "Voltage";
const MEASURAND_CURRENT: &str = "Current.Import";
const MEASURAND_TEMPERATURE: &str = "Temperature";
const PHASE_L1_N: &str = "L1-N";

#[derive(Debug, Deserialize)]
pub struct MeterValue {
    #[serde(rename = "sampledValue", default)]
    pub sampled_value: Vec<SampledValue>,
}

#[derive(Debug, Deserialize)]
pub struct SampledValue {
    pub value: String,
    pub measurand: Option<String>,
    pub phase: Option<String>,
    pub unit: Option<String>,
}

/// Extracted `(power_w, energy_kwh, voltage_v, current_a, temperature_c)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterReading {
    pub power: f64,
    pub energy: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
}

/// Fold a sequence of meter-value elements into a single reading, using
/// last-sample-wins for each recognized measurand.
pub fn parse_meter_values(meter_values: &[MeterValue]) -> MeterReading {
    let mut reading = MeterReading::default();

    for mv in meter_values {
        for sample in &mv.sampled_value {
            let measurand = sample.measurand.as_deref().unwrap_or(MEASURAND_ENERGY);
            let value = parse_numeric(&sample.value);

            match measurand {
                MEASURAND_POWER => reading.power = value,
                MEASURAND_ENERGY => {
                    reading.energy = if sample.unit.as_deref() == Some("kWh") {
                        value
                    } else {
                        value / 1000.0
                    };
                }
                MEASURAND_VOLTAGE if sample.phase.as_deref() == Some(PHASE_L1_N) => {
                    reading.voltage = value;
                }
                MEASURAND_CURRENT if sample.phase.as_deref() == Some(PHASE_L1_N) => {
                    reading.current = value;
                }
                MEASURAND_TEMPERATURE => reading.temperature = value,
                _ => {}
            }
        }
    }

    reading
}

fn parse_numeric(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}
