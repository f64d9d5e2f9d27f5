//! Shared fixtures for integration tests
//!
//! - [`RecordingLink`]: captures notifications per characteristic
//! - [`run_until`]: drives a device on a mock clock
//! - [`fast_config`]: short phases so a full cycle takes few ticks

#![allow(dead_code)]

use xbio_core::{
    config::DeviceConfig,
    frame::{self, ChunkAssembler, Frame},
    runtime::Device,
    storage::Storage,
    time::MockTimeSource,
    traits::SensorPort,
    transport::{Characteristic, Link},
    DeviceState, StatusReport,
};

/// Notifications seen by the "radio"
#[derive(Debug, Default)]
pub struct RecordingLink {
    pub sent: Vec<(Characteristic, Vec<u8>)>,
}

impl RecordingLink {
    /// Decoded status records, oldest first
    pub fn statuses(&self) -> Vec<[u8; 3]> {
        self.sent
            .iter()
            .filter(|(ch, _)| *ch == Characteristic::Status)
            .map(|(_, bytes)| [bytes[0], bytes[1], bytes[2]])
            .collect()
    }

    /// Raw session-data frames, oldest first
    pub fn data_frames(&self) -> Vec<Vec<u8>> {
        self.sent
            .iter()
            .filter(|(ch, _)| *ch == Characteristic::SessionData)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// Error sentinel messages, oldest first
    pub fn sync_errors(&self) -> Vec<String> {
        self.data_frames()
            .iter()
            .filter_map(|f| match frame::decode(f) {
                Ok(Frame::Error(msg)) => Some(msg.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Feed every data frame through a fresh assembler
    pub fn reassemble(&self) -> Result<Option<Vec<u8>>, xbio_core::FrameError> {
        let mut rx = ChunkAssembler::new();
        let mut out = None;
        for f in self.data_frames() {
            if let Some(bytes) = rx.push(&f)? {
                out = Some(bytes);
            }
        }
        Ok(out)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Link for RecordingLink {
    fn notify(&mut self, ch: Characteristic, bytes: &[u8]) {
        self.sent.push((ch, bytes.to_vec()));
    }
}

/// Status code of a recorded status record
pub fn state_of(record: [u8; 3]) -> DeviceState {
    DeviceState::from_code(record[0]).expect("valid state code")
}

/// Status record as sent on the wire
pub fn record(status: StatusReport) -> [u8; 3] {
    status.to_bytes()
}

/// Config with 1 s / 0.5 s / 1 s phases and 100 ms sampling
pub fn fast_config() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.acquisition.phase_a_ms = 1_000;
    config.acquisition.phase_b_ms = 500;
    config.acquisition.phase_c_ms = 1_000;
    config.acquisition.sample_interval_ms = 100;
    config.transfer.chunk_size = 64;
    config.transfer.chunk_interval_ms = 20;
    config
}

/// Poll every `step_ms` until `done` holds or `limit` polls have run
///
/// Returns the number of polls made.
pub fn run_until<'q, 'c, S, P, F>(
    device: &mut Device<'q, &'c MockTimeSource, S, P, RecordingLink>,
    clock: &MockTimeSource,
    step_ms: u32,
    limit: usize,
    mut done: F,
) -> usize
where
    S: Storage,
    P: SensorPort,
    F: FnMut(&Device<'q, &'c MockTimeSource, S, P, RecordingLink>) -> bool,
{
    for polls in 0..limit {
        if done(device) {
            return polls;
        }
        device.poll();
        clock.advance(step_ms);
    }
    panic!("condition not reached after {} polls", limit);
}
