//! Acquisition and sync core for the X-BIO sensing node
//!
//! Runs a three-phase gas-sensing cycle, keeps its samples in a buffer
//! allocated once at boot, stores each finished cycle as a JSON session
//! and streams sessions to a paired phone in paced chunks.
//!
//! Key constraints:
//! - No allocation after boot in the acquisition path
//! - Single-threaded cooperative loop; radio callbacks only enqueue
//! - Wrapping-safe timing on a 32-bit millisecond counter
//!
//! ```no_run
//! use xbio_core::{
//!     config::DeviceConfig, queue::InboundQueue, sensor::SimulatedSensor,
//!     storage::MemoryStorage, time::SystemClock, traits::NoCredentials,
//!     transport::{Characteristic, Link}, Device,
//! };
//!
//! struct Radio;
//! impl Link for Radio {
//!     fn notify(&mut self, _ch: Characteristic, _bytes: &[u8]) {}
//! }
//!
//! let config = DeviceConfig::default();
//! let mut queue = InboundQueue::new();
//! let (_tx, rx) = queue.split();
//! let mut device = Device::new(
//!     &config,
//!     config.resolve_device_id(&NoCredentials),
//!     SystemClock::new(),
//!     MemoryStorage::new(),
//!     SimulatedSensor::new(),
//!     Radio,
//!     rx,
//! );
//!
//! device.trigger();
//! loop {
//!     device.poll();
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod buffer;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod frame;
pub mod machine;
pub mod queue;
pub mod runtime;
pub mod sample;
pub mod sensor;
pub mod session;
pub mod storage;
pub mod time;
pub mod traits;
pub mod transfer;
pub mod transport;

#[cfg(feature = "std")]
pub mod concurrent;

// Public API
pub use buffer::SampleBuffer;
pub use config::DeviceConfig;
pub use context::{DeviceContext, DeviceState, StatusReport};
pub use errors::{ConfigError, FrameError, StorageError, StoreError, TransferError};
pub use machine::AcquisitionMachine;
pub use runtime::Device;
pub use sample::{Phase, Sample};
pub use session::{SessionName, SessionStore};
pub use storage::Storage;
pub use transfer::{SyncState, TransferEngine};
pub use traits::{SensorPort, StateSink, SyncSink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
