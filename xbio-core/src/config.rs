//! Runtime configuration
//!
//! Every field defaults to the compile-time value in [`crate::constants`],
//! so an empty document (`{}`) is a valid configuration.
//!
//! ```json
//! {"device_id":"XBIO-LAB-2",
//!  "acquisition":{"sample_capacity":2000,"phase_b_ms":5000},
//!  "transfer":{"chunk_size":180}}
//! ```

use alloc::string::String;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::buffers::{MAX_CHUNK_SIZE, MAX_DEVICE_ID_LEN};
use crate::constants::protocol::DEFAULT_DEVICE_ID;
use crate::constants::{
    DEFAULT_CHUNK_INTERVAL_MS, DEFAULT_CHUNK_SIZE, DEFAULT_SAMPLE_CAPACITY,
    DEFAULT_SAMPLE_INTERVAL_MS, PHASE_A_DURATION_MS, PHASE_B_DURATION_MS, PHASE_C_DURATION_MS,
};
use crate::context::DeviceId;
use crate::errors::ConfigError;
use crate::sample::Phase;
use crate::time::Millis;
use crate::traits::CredentialStore;

/// Credential key holding a provisioned device identity
pub const DEVICE_ID_KEY: &str = "device_id";

/// Acquisition cycle timing and buffer sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sample buffer capacity, allocated once at boot
    pub sample_capacity: usize,
    /// Minimum spacing between sample polls
    pub sample_interval_ms: Millis,
    /// Phase A duration
    pub phase_a_ms: Millis,
    /// Phase B duration
    pub phase_b_ms: Millis,
    /// Phase C duration
    pub phase_c_ms: Millis,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            phase_a_ms: PHASE_A_DURATION_MS,
            phase_b_ms: PHASE_B_DURATION_MS,
            phase_c_ms: PHASE_C_DURATION_MS,
        }
    }
}

impl AcquisitionConfig {
    /// Duration of `phase`
    pub const fn phase_duration(&self, phase: Phase) -> Millis {
        match phase {
            Phase::A => self.phase_a_ms,
            Phase::B => self.phase_b_ms,
            Phase::C => self.phase_c_ms,
        }
    }
}

/// Chunked transfer sizing and pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Payload bytes per chunk, excluding the 4-byte header
    pub chunk_size: usize,
    /// Minimum spacing between chunks
    pub chunk_interval_ms: Millis,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identity used when none is provisioned
    pub device_id: String,
    /// Acquisition settings
    pub acquisition: AcquisitionConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::from(DEFAULT_DEVICE_ID),
            acquisition: AcquisitionConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a JSON document
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });

        if self.device_id.is_empty() || self.device_id.len() > MAX_DEVICE_ID_LEN {
            return invalid("device_id", "must be 1 to 32 bytes");
        }
        if self.acquisition.sample_capacity == 0 {
            return invalid("acquisition.sample_capacity", "must be non-zero");
        }
        if self.acquisition.sample_interval_ms == 0 {
            return invalid("acquisition.sample_interval_ms", "must be non-zero");
        }
        for phase in Phase::ALL {
            if self.acquisition.phase_duration(phase) == 0 {
                return invalid("acquisition.phase_*_ms", "must be non-zero");
            }
        }
        if self.transfer.chunk_size == 0 || self.transfer.chunk_size > MAX_CHUNK_SIZE {
            return invalid("transfer.chunk_size", "must be 1 to 512 bytes");
        }
        Ok(())
    }

    /// Device identity: provisioned value, then configured value, then default
    pub fn resolve_device_id<C: CredentialStore + ?Sized>(&self, credentials: &C) -> DeviceId {
        if let Some(stored) = credentials.lookup(DEVICE_ID_KEY) {
            match DeviceId::try_from(stored.as_str()) {
                Ok(id) if !id.is_empty() => return id,
                _ => warn!("provisioned device id {:?} unusable, ignoring", stored),
            }
        }
        DeviceId::try_from(self.device_id.as_str())
            .ok()
            .filter(|id| !id.is_empty())
            .or_else(|| DeviceId::try_from(DEFAULT_DEVICE_ID).ok())
            .unwrap_or_default()
    }
}
