//! Seams between the core and its collaborators
//!
//! The core never touches the radio, the sensor registers or the flash
//! directly. It talks to them through these traits:
//!
//! - [`SensorPort`]: phase configuration and the sample producer
//! - [`StateSink`]: state notifications out
//! - [`SyncSink`]: chunk, completion and error notifications out
//! - [`CredentialStore`]: persisted identity lookup
//!
//! The file read/write primitive is [`crate::storage::Storage`].

use alloc::string::String;

use crate::context::StatusReport;
use crate::errors::FrameError;
use crate::sample::{Phase, Sample};
use crate::time::Millis;

/// Opaque failure reported by a sensor backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault(pub &'static str);

/// Sensor driver as seen by the acquisition machine
pub trait SensorPort {
    /// Apply the heater/processing configuration of `phase`
    fn apply_phase_config(&mut self, phase: Phase) -> Result<(), SensorFault>;

    /// Produce a sample if one is ready
    ///
    /// Called at most once per sample interval while measuring. `None`
    /// means nothing was ready this time; the phase still ends on schedule.
    fn poll_sample(&mut self, phase: Phase, now: Millis) -> Option<Sample>;
}

impl<S: SensorPort + ?Sized> SensorPort for &mut S {
    fn apply_phase_config(&mut self, phase: Phase) -> Result<(), SensorFault> {
        (**self).apply_phase_config(phase)
    }

    fn poll_sample(&mut self, phase: Phase, now: Millis) -> Option<Sample> {
        (**self).poll_sample(phase, now)
    }
}

/// Receiver of acquisition state changes
pub trait StateSink {
    /// Called after every state machine transition
    fn on_state_changed(&mut self, status: &StatusReport);
}

/// Receiver of sync transfer output
pub trait SyncSink {
    /// One data chunk of a transfer
    ///
    /// An error means the chunk did not go out; the transfer is abandoned.
    fn on_chunk(&mut self, payload: &[u8], index: u16, total: u16) -> Result<(), FrameError>;

    /// Transfer or delete finished
    fn on_sync_complete(&mut self);

    /// Command or transfer failed
    fn on_sync_error(&mut self, message: &str);
}

/// Persisted key/value lookup (identity, pairing data)
pub trait CredentialStore {
    /// Value stored under `key`
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Credential store with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn lookup(&self, _key: &str) -> Option<String> {
        None
    }
}
