//! Dual-Task Sensor Sharing
//!
//! ## Overview
//!
//! Variant of the cooperative loop in which sensing runs on its own worker
//! thread (the second core on the S3) while the control loop keeps running
//! the state machine and the sync engine.
//!
//! ```text
//!  sensing worker                               control loop
//!  ──────────────                               ────────────
//!  lock driver ─ read ─ unlock                  apply config: lock driver ─ unlock
//!        │                                      poll_sample:  take latest reading
//!        ↓                                                         ↑
//!  publish ──────────→ [ LatestReading slot ] ─────────────────────┘
//! ```
//!
//! ## Locking Rules
//!
//! - The driver mutex is held only for one hardware access (one read or one
//!   configuration write). Nothing derived from a reading is computed under
//!   it.
//! - The control loop never waits on the worker: the reading slot has its
//!   own short critical section and `poll_sample` takes whatever is there.
//! - A reading not taken before the next one arrives is overwritten.
//!
//! Poisoned locks are recovered: the guarded data is plain values.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use crate::sample::{Phase, Sample};
use crate::time::{Millis, TimeSource};
use crate::traits::{SensorFault, SensorPort};

const NO_PHASE: u8 = u8::MAX;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hardware driver shared by the two tasks
pub struct SharedSensor<D> {
    driver: Mutex<D>,
}

impl<D: SensorPort> SharedSensor<D> {
    /// Wrap `driver`
    pub fn new(driver: D) -> Self {
        Self {
            driver: Mutex::new(driver),
        }
    }

    /// Apply a phase configuration under the driver lock
    pub fn configure(&self, phase: Phase) -> Result<(), SensorFault> {
        lock(&self.driver).apply_phase_config(phase)
    }

    /// One hardware read under the driver lock
    pub fn read(&self, phase: Phase, now: Millis) -> Option<Sample> {
        lock(&self.driver).poll_sample(phase, now)
    }
}

/// Most recent reading, overwritten by each new one
#[derive(Debug, Default)]
pub struct LatestReading {
    slot: Mutex<Option<Sample>>,
}

impl LatestReading {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held reading
    pub fn publish(&self, sample: Sample) {
        *lock(&self.slot) = Some(sample);
    }

    /// Remove and return the held reading
    pub fn take(&self) -> Option<Sample> {
        lock(&self.slot).take()
    }
}

struct Shared<D> {
    sensor: SharedSensor<D>,
    latest: LatestReading,
    /// Phase being sampled, [`NO_PHASE`] when idle
    phase: AtomicU8,
    running: AtomicBool,
}

fn encode_phase(phase: Option<Phase>) -> u8 {
    phase.map_or(NO_PHASE, |p| p.index() as u8)
}

fn decode_phase(raw: u8) -> Option<Phase> {
    Phase::ALL.get(usize::from(raw)).copied()
}

/// Sensing worker thread and its control-loop port
pub struct SensingWorker<D: SensorPort + Send + 'static> {
    shared: Arc<Shared<D>>,
    handle: Option<JoinHandle<()>>,
}

impl<D: SensorPort + Send + 'static> SensingWorker<D> {
    /// Start sampling `driver` every `interval_ms` on a new thread
    pub fn spawn<T>(driver: D, clock: T, interval_ms: Millis) -> std::io::Result<Self>
    where
        T: TimeSource + Send + 'static,
    {
        let shared = Arc::new(Shared {
            sensor: SharedSensor::new(driver),
            latest: LatestReading::new(),
            phase: AtomicU8::new(NO_PHASE),
            running: AtomicBool::new(true),
        });

        let worker = Arc::clone(&shared);
        let interval = Duration::from_millis(u64::from(interval_ms.max(1)));
        let handle = thread::Builder::new()
            .name("xbio-sensing".into())
            .spawn(move || {
                info!("sensing worker started");
                while worker.running.load(Ordering::Acquire) {
                    if let Some(phase) = decode_phase(worker.phase.load(Ordering::Acquire)) {
                        // Lock scope ends inside `read`.
                        let reading = worker.sensor.read(phase, clock.now_ms());
                        if let Some(sample) = reading {
                            worker.latest.publish(sample);
                        }
                    }
                    thread::sleep(interval);
                }
                info!("sensing worker stopped");
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Control-loop side of the worker
    pub fn port(&self) -> WorkerPort<D> {
        WorkerPort {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop and join the worker thread
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<D: SensorPort + Send + 'static> Drop for SensingWorker<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`SensorPort`] backed by a [`SensingWorker`]
pub struct WorkerPort<D> {
    shared: Arc<Shared<D>>,
}

impl<D: SensorPort> SensorPort for WorkerPort<D> {
    fn apply_phase_config(&mut self, phase: Phase) -> Result<(), SensorFault> {
        // Stale readings from the previous phase must not leak into this one.
        self.shared.phase.store(NO_PHASE, Ordering::Release);
        let _ = self.shared.latest.take();

        self.shared.sensor.configure(phase)?;
        self.shared.phase.store(encode_phase(Some(phase)), Ordering::Release);
        debug!("worker sampling phase {}", phase);
        Ok(())
    }

    fn poll_sample(&mut self, phase: Phase, _now: Millis) -> Option<Sample> {
        self.shared.latest.take().filter(|sample| sample.phase == phase)
    }
}
