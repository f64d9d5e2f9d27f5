//! Device context and acquisition states
//!
//! [`DeviceContext`] is the process-wide record the acquisition machine
//! mutates and the transport reads: current state, cycle counter, identity,
//! the sample buffer, phase bookkeeping and the last error code.
//! One instance exists per device, owned by the acquisition machine.

use core::fmt;

use crate::buffer::SampleBuffer;
use crate::constants::buffers::STATUS_RECORD_LEN;
use crate::constants::protocol::{ERR_CONFIG_A, ERR_CONFIG_B, ERR_CONFIG_C, ERR_NONE};
use crate::sample::Phase;
use crate::time::{Millis, Timestamp};

/// Device identity string
pub type DeviceId = heapless::String<{ crate::constants::buffers::MAX_DEVICE_ID_LEN }>;

/// Acquisition machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Waiting for a trigger
    Idle,
    /// Applying the sensor configuration of a phase
    LoadConfig(Phase),
    /// Collecting samples for a phase
    Measure(Phase),
    /// Writing the finished cycle to storage
    SaveResults,
    /// A session is stored and can be synced
    ReadyForSync,
    /// Cycle abandoned; see `last_error`
    Error,
}

impl DeviceState {
    /// One-byte code carried in the status notification
    pub const fn code(self) -> u8 {
        match self {
            DeviceState::Idle => 0,
            DeviceState::LoadConfig(Phase::A) => 1,
            DeviceState::Measure(Phase::A) => 2,
            DeviceState::LoadConfig(Phase::B) => 3,
            DeviceState::Measure(Phase::B) => 4,
            DeviceState::LoadConfig(Phase::C) => 5,
            DeviceState::Measure(Phase::C) => 6,
            DeviceState::SaveResults => 7,
            DeviceState::ReadyForSync => 8,
            DeviceState::Error => 9,
        }
    }

    /// Inverse of [`DeviceState::code`]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => DeviceState::Idle,
            1 => DeviceState::LoadConfig(Phase::A),
            2 => DeviceState::Measure(Phase::A),
            3 => DeviceState::LoadConfig(Phase::B),
            4 => DeviceState::Measure(Phase::B),
            5 => DeviceState::LoadConfig(Phase::C),
            6 => DeviceState::Measure(Phase::C),
            7 => DeviceState::SaveResults,
            8 => DeviceState::ReadyForSync,
            9 => DeviceState::Error,
            _ => return None,
        })
    }

    /// A trigger may start a new cycle from this state
    pub const fn accepts_trigger(self) -> bool {
        matches!(
            self,
            DeviceState::Idle | DeviceState::ReadyForSync | DeviceState::Error
        )
    }

    /// Phase being measured, if any
    pub const fn measuring(self) -> Option<Phase> {
        match self {
            DeviceState::Measure(phase) => Some(phase),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Idle => write!(f, "IDLE"),
            DeviceState::LoadConfig(phase) => write!(f, "LOAD_CONFIG_{}", phase),
            DeviceState::Measure(phase) => write!(f, "MEASURE_{}", phase),
            DeviceState::SaveResults => write!(f, "SAVE_RESULTS"),
            DeviceState::ReadyForSync => write!(f, "READY_FOR_SYNC"),
            DeviceState::Error => write!(f, "ERROR"),
        }
    }
}

/// Error code recorded when a phase configuration is rejected
pub const fn config_error_code(phase: Phase) -> u8 {
    match phase {
        Phase::A => ERR_CONFIG_A,
        Phase::B => ERR_CONFIG_B,
        Phase::C => ERR_CONFIG_C,
    }
}

/// Process-wide acquisition state
#[derive(Debug)]
pub struct DeviceContext {
    /// Current machine state
    pub state: DeviceState,
    /// Identifier of the current (or last) cycle
    pub cycle_id: u32,
    /// Device identity
    pub device_id: DeviceId,
    /// Samples of the current cycle
    pub samples: SampleBuffer,
    /// Counter value when `state` was entered
    pub state_started_ms: Millis,
    /// Wall-clock time the current cycle was triggered
    pub cycle_started_at: Timestamp,
    /// Completion flags per phase, indexed by [`Phase::index`]
    pub phase_done: [bool; 3],
    /// Last acquisition error code, [`ERR_NONE`] when clear
    pub last_error: u8,
}

impl DeviceContext {
    /// Fresh context in `Idle`
    pub fn new(device_id: DeviceId, samples: SampleBuffer) -> Self {
        Self {
            state: DeviceState::Idle,
            cycle_id: 0,
            device_id,
            samples,
            state_started_ms: 0,
            cycle_started_at: 0,
            phase_done: [false; 3],
            last_error: ERR_NONE,
        }
    }

    /// Whether `phase` completed in the current cycle
    pub fn is_phase_done(&self, phase: Phase) -> bool {
        self.phase_done[phase.index()]
    }

    /// Status record for the transport
    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.state,
            sample_count: self.samples.count(),
            last_error: self.last_error,
        }
    }
}

/// Snapshot sent after every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// State entered
    pub state: DeviceState,
    /// Samples buffered so far
    pub sample_count: usize,
    /// Last error code
    pub last_error: u8,
}

impl StatusReport {
    /// Wire record: state code, low byte of count, error code
    pub fn to_bytes(&self) -> [u8; STATUS_RECORD_LEN] {
        [self.state.code(), (self.sample_count & 0xFF) as u8, self.last_error]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for code in 0..=9 {
            let state = DeviceState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(DeviceState::from_code(10), None);
    }

    #[test]
    fn only_passive_states_accept_triggers() {
        assert!(DeviceState::Idle.accepts_trigger());
        assert!(DeviceState::ReadyForSync.accepts_trigger());
        assert!(DeviceState::Error.accepts_trigger());
        assert!(!DeviceState::LoadConfig(Phase::B).accepts_trigger());
        assert!(!DeviceState::Measure(Phase::C).accepts_trigger());
        assert!(!DeviceState::SaveResults.accepts_trigger());
    }

    #[test]
    fn status_record_uses_low_byte_of_count() {
        let report = StatusReport {
            state: DeviceState::Measure(Phase::B),
            sample_count: 0x1_2C,
            last_error: 0,
        };
        assert_eq!(report.to_bytes(), [4, 0x2C, 0]);
    }

    #[test]
    fn state_names() {
        assert_eq!(alloc::format!("{}", DeviceState::LoadConfig(Phase::C)), "LOAD_CONFIG_C");
        assert_eq!(alloc::format!("{}", DeviceState::ReadyForSync), "READY_FOR_SYNC");
    }
}
