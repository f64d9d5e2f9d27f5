//! Sensor backends
//!
//! [`SimulatedSensor`] stands in for the gas sensor on hosts and in tests.
//! Its readings are a pure function of the counter value, so a run is
//! reproducible from the clock alone.
//!
//! [`PhaseConfigFiles`] holds the per-phase configuration blobs read from
//! `config/config_{A,B,C}.bmeconfig`. A phase without a file uses the
//! sensor's built-in profile; a file that exists but is empty is rejected
//! when the phase is loaded.

use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::constants::protocol::PHASE_CONFIG_DIR;
use crate::errors::StorageError;
use crate::sample::{DerivedMetrics, Phase, RawMeasurement, Sample};
use crate::storage::{join, Storage};
use crate::time::Millis;
use crate::traits::{SensorFault, SensorPort};

/// Per-phase configuration blobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseConfigFiles {
    blobs: [Option<Vec<u8>>; 3],
}

impl PhaseConfigFiles {
    /// File name of the blob for `phase`
    pub fn file_name(phase: Phase) -> &'static str {
        match phase {
            Phase::A => "config_A.bmeconfig",
            Phase::B => "config_B.bmeconfig",
            Phase::C => "config_C.bmeconfig",
        }
    }

    /// Read whatever blobs exist on `storage`
    pub fn load<S: Storage + ?Sized>(storage: &S) -> Self {
        let mut files = Self::default();
        for phase in Phase::ALL {
            let path = join(PHASE_CONFIG_DIR, Self::file_name(phase));
            match storage.read(&path) {
                Ok(blob) => {
                    info!("phase {} config: {} bytes", phase, blob.len());
                    files.blobs[phase.index()] = Some(blob);
                }
                Err(StorageError::NotFound) => debug!("phase {} config: built-in", phase),
                Err(err) => warn!("phase {} config unreadable: {}", phase, err),
            }
        }
        files
    }

    /// Use `blob` for `phase`
    pub fn set(&mut self, phase: Phase, blob: Vec<u8>) {
        self.blobs[phase.index()] = Some(blob);
    }

    /// Blob for `phase`, `None` for the built-in profile
    pub fn blob(&self, phase: Phase) -> Option<&[u8]> {
        self.blobs[phase.index()].as_deref()
    }
}

/// Deterministic stand-in for the gas sensor
#[derive(Debug, Clone, Default)]
pub struct SimulatedSensor {
    configs: PhaseConfigFiles,
    active: Option<Phase>,
    rejected: Option<Phase>,
}

impl SimulatedSensor {
    /// Sensor using built-in profiles
    pub fn new() -> Self {
        Self::default()
    }

    /// Sensor using `configs` where present
    pub fn with_configs(configs: PhaseConfigFiles) -> Self {
        Self {
            configs,
            ..Self::default()
        }
    }

    /// Refuse the configuration of `phase` (fault injection)
    pub fn reject_phase(&mut self, phase: Option<Phase>) {
        self.rejected = phase;
    }

    /// Phase whose configuration was applied last
    pub fn active_phase(&self) -> Option<Phase> {
        self.active
    }

    /// Reading at counter value `t_ms`
    pub fn reading(phase: Phase, t_ms: Millis) -> Sample {
        let step = (t_ms / 200) % 16;
        let seconds = t_ms / 1000;
        Sample {
            phase,
            t_ms,
            heater_step: step as u8,
            raw: RawMeasurement {
                temp_c: 30.0 + step as f32,
                humidity_pct: 40.0 + (seconds % 10) as f32,
                pressure_hpa: 1000.0,
                gas_res_ohm: 100_000.0 + 1000.0 * step as f32,
            },
            derived: DerivedMetrics {
                iaq: Some(50.0 + step as f32),
                voc_index: Some(100.0 + (seconds % 20) as f32),
                co2_eq: Some(500.0),
                breath_voc_eq: Some(0.8),
            },
        }
    }
}

impl SensorPort for SimulatedSensor {
    fn apply_phase_config(&mut self, phase: Phase) -> Result<(), SensorFault> {
        if self.rejected == Some(phase) {
            return Err(SensorFault("configuration refused"));
        }
        if let Some(blob) = self.configs.blob(phase) {
            if blob.is_empty() {
                return Err(SensorFault("invalid config data"));
            }
        }
        self.active = Some(phase);
        Ok(())
    }

    fn poll_sample(&mut self, phase: Phase, now: Millis) -> Option<Sample> {
        Some(Self::reading(phase, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn readings_follow_the_counter() {
        let s = SimulatedSensor::reading(Phase::B, 1200);
        assert_eq!(s.heater_step, 6);
        assert_eq!(s.raw.temp_c, 36.0);
        assert_eq!(s.raw.humidity_pct, 41.0);
        assert_eq!(s.raw.gas_res_ohm, 106_000.0);
        assert_eq!(s.derived.iaq, Some(56.0));
        assert_eq!(s.derived.voc_index, Some(101.0));

        // Heater step wraps every 16 steps
        assert_eq!(SimulatedSensor::reading(Phase::A, 3200).heater_step, 0);
    }

    #[test]
    fn config_files_are_optional() {
        let mut storage = MemoryStorage::new();
        storage.create_dir_all("config").unwrap();
        storage.write("config/config_B.bmeconfig", &[1, 2, 3]).unwrap();

        let files = PhaseConfigFiles::load(&storage);
        assert_eq!(files.blob(Phase::A), None);
        assert_eq!(files.blob(Phase::B), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn empty_config_blob_is_rejected() {
        let mut configs = PhaseConfigFiles::default();
        configs.set(Phase::C, Vec::new());
        let mut sensor = SimulatedSensor::with_configs(configs);

        assert!(sensor.apply_phase_config(Phase::A).is_ok());
        assert_eq!(sensor.active_phase(), Some(Phase::A));
        assert!(sensor.apply_phase_config(Phase::C).is_err());
        assert_eq!(sensor.active_phase(), Some(Phase::A));
    }
}
