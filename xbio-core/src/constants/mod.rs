//! Constants for the X-BIO core
//!
//! Tuning values shared by the acquisition machine, the session store and
//! the sync engine. Runtime configuration ([`crate::config::DeviceConfig`])
//! starts from these defaults.
//!
//! ## Organization
//!
//! - **Buffers**: sample capacity, chunk payload, queue depths
//! - **Time**: phase durations and pacing intervals
//! - **Protocol**: opcodes, sentinels, status/error codes, GATT UUIDs

/// Buffer sizes and memory limits.
pub mod buffers;

/// Phase durations, sampling and pacing intervals.
pub mod time;

/// Wire-level identifiers: opcodes, sentinels, error codes and UUIDs.
pub mod protocol;

pub use buffers::{DEFAULT_CHUNK_SIZE, DEFAULT_SAMPLE_CAPACITY, FRAME_HEADER_LEN};
pub use time::{
    DEFAULT_CHUNK_INTERVAL_MS, DEFAULT_SAMPLE_INTERVAL_MS, PHASE_A_DURATION_MS,
    PHASE_B_DURATION_MS, PHASE_C_DURATION_MS,
};
