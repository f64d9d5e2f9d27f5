//! Sensor samples and acquisition phases
//!
//! A [`Sample`] is one reading from the gas sensor: the phase it was taken
//! in, the raw physical measurements, and the derived air-quality metrics.
//! Its serde layout is the per-sample entry of the session file.
//!
//! ```json
//! {"mode":"A","t_ms":1200,"heater_step":6,
//!  "raw":{"temp_c":36.0,"humidity_pct":41.0,"pressure_hpa":1000.0,"gas_res_ohm":106000.0},
//!  "bsec":{"iaq":56.0,"voc_index":101.0,"co2_eq":500.0,"breath_voc_eq":0.8}}
//! ```
//!
//! Derived metrics are `Option<f32>`. A metric that was not computed, or
//! came back NaN/infinite, is left out of the document entirely. A
//! non-finite raw reading is written as `null` and read back as NaN.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::time::Millis;

/// Acquisition phase, in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// First heater profile
    A,
    /// Second heater profile (short window)
    B,
    /// Third heater profile
    C,
}

impl Phase {
    /// All phases in the order a cycle runs them
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// One-letter tag used in session files
    pub const fn tag(self) -> char {
        match self {
            Phase::A => 'A',
            Phase::B => 'B',
            Phase::C => 'C',
        }
    }

    /// Phase that follows this one, `None` after C
    pub const fn next(self) -> Option<Phase> {
        match self {
            Phase::A => Some(Phase::B),
            Phase::B => Some(Phase::C),
            Phase::C => None,
        }
    }

    /// Zero-based position in the cycle
    pub const fn index(self) -> usize {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Raw physical readings from the sensor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMeasurement {
    /// Temperature in °C
    #[serde(serialize_with = "finite_or_null", deserialize_with = "null_as_nan")]
    pub temp_c: f32,
    /// Relative humidity in %
    #[serde(serialize_with = "finite_or_null", deserialize_with = "null_as_nan")]
    pub humidity_pct: f32,
    /// Barometric pressure in hPa
    #[serde(serialize_with = "finite_or_null", deserialize_with = "null_as_nan")]
    pub pressure_hpa: f32,
    /// Gas-sensor resistance in Ω
    #[serde(serialize_with = "finite_or_null", deserialize_with = "null_as_nan")]
    pub gas_res_ohm: f32,
}

fn finite_or_null<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f32(*value)
    } else {
        serializer.serialize_none()
    }
}

fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
}

/// Metrics computed by the sensor's signal-processing library
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Indoor air-quality index
    #[serde(default, skip_serializing_if = "unavailable")]
    pub iaq: Option<f32>,
    /// VOC index
    #[serde(default, skip_serializing_if = "unavailable")]
    pub voc_index: Option<f32>,
    /// CO2 equivalent in ppm
    #[serde(default, skip_serializing_if = "unavailable")]
    pub co2_eq: Option<f32>,
    /// Breath-VOC equivalent in ppm
    #[serde(default, skip_serializing_if = "unavailable")]
    pub breath_voc_eq: Option<f32>,
}

fn unavailable(value: &Option<f32>) -> bool {
    !matches!(value, Some(v) if v.is_finite())
}

impl DerivedMetrics {
    /// No derived metric available
    pub const NONE: Self = Self {
        iaq: None,
        voc_index: None,
        co2_eq: None,
        breath_voc_eq: None,
    };
}

/// One sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Phase the reading was taken in
    #[serde(rename = "mode")]
    pub phase: Phase,
    /// Monotonic counter at acquisition
    pub t_ms: Millis,
    /// Heater profile step index
    pub heater_step: u8,
    /// Raw measurements
    pub raw: RawMeasurement,
    /// Derived metrics
    #[serde(rename = "bsec")]
    pub derived: DerivedMetrics,
}

impl Sample {
    /// Sample with raw readings only
    pub const fn raw(phase: Phase, t_ms: Millis, heater_step: u8, raw: RawMeasurement) -> Self {
        Self {
            phase,
            t_ms,
            heater_step,
            raw,
            derived: DerivedMetrics::NONE,
        }
    }
}
