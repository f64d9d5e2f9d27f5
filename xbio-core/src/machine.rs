//! Acquisition State Machine
//!
//! ## Overview
//!
//! Drives one device through repeated acquisition cycles:
//!
//! ```text
//!            trigger
//!  Idle ──────────────→ LoadConfig(A) → Measure(A) → LoadConfig(B) → Measure(B)
//!   ↑                                                                    │
//!   │    Error ←── (config or save failure)        LoadConfig(C) ←───────┘
//!   │      │ trigger                                    │
//!   │      ↓                                            ↓
//!   │  LoadConfig(A)                     Measure(C) → SaveResults → ReadyForSync
//!   │                                                                    │
//!   └───────────────── trigger starts the next cycle ────────────────────┘
//! ```
//!
//! ## Timing
//!
//! Phases end on the monotonic clock, never on sample count: a phase is
//! over once `elapsed > duration`, however many samples the producer
//! managed to deliver. Elapsed time is computed with wrapping subtraction.
//! While measuring, the producer is polled at most once per sample
//! interval; the first poll of a phase happens on its first tick.
//!
//! ## Notifications
//!
//! The state sink hears about every transition, including the one made by
//! the trigger. A device in `Error` re-notifies on every tick so a newly
//! connected observer still learns the code.

use log::{debug, error, info, warn};

use crate::config::AcquisitionConfig;
use crate::constants::protocol::{ERR_BUFFER_ALLOC, ERR_NONE, ERR_SAVE};
use crate::context::{config_error_code, DeviceContext, DeviceState};
use crate::sample::{Phase, Sample};
use crate::session::{SessionName, SessionStore};
use crate::storage::Storage;
use crate::time::{elapsed_ms, Millis, TimeSource};
use crate::traits::{SensorPort, StateSink};

/// Multi-phase acquisition controller
#[derive(Debug)]
pub struct AcquisitionMachine<T: TimeSource> {
    ctx: DeviceContext,
    clock: T,
    config: AcquisitionConfig,
    /// Counter value of the last producer poll in the current phase
    last_sample_ms: Option<Millis>,
    /// Name of the most recently saved session
    last_saved: Option<SessionName>,
}

impl<T: TimeSource> AcquisitionMachine<T> {
    /// Machine owning `ctx`
    ///
    /// A context whose buffer has no capacity starts in `Error` with the
    /// allocation code.
    pub fn new(mut ctx: DeviceContext, clock: T, config: AcquisitionConfig) -> Self {
        if ctx.samples.capacity() == 0 {
            error!("sample buffer unavailable");
            ctx.state = DeviceState::Error;
            ctx.last_error = ERR_BUFFER_ALLOC;
        }
        ctx.state_started_ms = clock.now_ms();
        Self {
            ctx,
            clock,
            config,
            last_sample_ms: None,
            last_saved: None,
        }
    }

    /// Device context
    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Current state
    pub fn state(&self) -> DeviceState {
        self.ctx.state
    }

    /// Clock driving the machine
    pub fn clock(&self) -> &T {
        &self.clock
    }

    /// Most recently saved session
    pub fn last_saved(&self) -> Option<&SessionName> {
        self.last_saved.as_ref()
    }

    fn enter(&mut self, state: DeviceState) {
        debug!("{} -> {}", self.ctx.state, state);
        self.ctx.state = state;
        self.ctx.state_started_ms = self.clock.now_ms();
    }

    fn fail(&mut self, code: u8) {
        self.ctx.last_error = code;
        self.enter(DeviceState::Error);
    }

    /// External trigger
    ///
    /// Starts a new cycle from `Idle`, `ReadyForSync` or `Error`; ignored in
    /// every other state. Returns whether a cycle started.
    pub fn on_trigger<N: StateSink + ?Sized>(&mut self, sink: &mut N) -> bool {
        if !self.ctx.state.accepts_trigger() {
            debug!("trigger ignored in {}", self.ctx.state);
            return false;
        }
        if self.ctx.samples.capacity() == 0 {
            warn!("trigger refused: no sample buffer");
            sink.on_state_changed(&self.ctx.status());
            return false;
        }

        self.ctx.cycle_id = self.ctx.cycle_id.wrapping_add(1);
        self.ctx.samples.reset();
        self.ctx.phase_done = [false; 3];
        self.ctx.last_error = ERR_NONE;
        self.ctx.cycle_started_at = self.clock.timestamp();
        info!("cycle {} started", self.ctx.cycle_id);

        self.enter(DeviceState::LoadConfig(Phase::A));
        sink.on_state_changed(&self.ctx.status());
        true
    }

    /// Sample delivered by the producer outside of [`Self::tick`]
    ///
    /// Appended only while measuring; dropped otherwise.
    pub fn on_sample(&mut self, sample: Sample) -> bool {
        if self.ctx.state.measuring().is_none() {
            debug!("sample dropped in {}", self.ctx.state);
            return false;
        }
        self.ctx.samples.append(sample);
        true
    }

    /// Advance the machine by one cooperative step
    pub fn tick<P, S, N>(&mut self, sensor: &mut P, store: &mut SessionStore<S>, sink: &mut N)
    where
        P: SensorPort + ?Sized,
        S: Storage,
        N: StateSink + ?Sized,
    {
        match self.ctx.state {
            DeviceState::Idle | DeviceState::ReadyForSync => {}

            DeviceState::LoadConfig(phase) => {
                match sensor.apply_phase_config(phase) {
                    Ok(()) => {
                        self.last_sample_ms = None;
                        self.enter(DeviceState::Measure(phase));
                    }
                    Err(fault) => {
                        error!("phase {} config rejected: {}", phase, fault.0);
                        self.fail(config_error_code(phase));
                    }
                }
                sink.on_state_changed(&self.ctx.status());
            }

            DeviceState::Measure(phase) => {
                let now = self.clock.now_ms();
                let due = self
                    .last_sample_ms
                    .map_or(true, |last| elapsed_ms(last, now) >= self.config.sample_interval_ms);
                if due {
                    self.last_sample_ms = Some(now);
                    if let Some(sample) = sensor.poll_sample(phase, now) {
                        self.ctx.samples.append(sample);
                    }
                }

                if elapsed_ms(self.ctx.state_started_ms, now) > self.config.phase_duration(phase) {
                    self.ctx.phase_done[phase.index()] = true;
                    info!("phase {} done, {} samples buffered", phase, self.ctx.samples.count());
                    let next = match phase.next() {
                        Some(next) => DeviceState::LoadConfig(next),
                        None => DeviceState::SaveResults,
                    };
                    self.enter(next);
                    sink.on_state_changed(&self.ctx.status());
                }
            }

            DeviceState::SaveResults => {
                match store.save(&self.ctx, self.clock.timestamp()) {
                    Ok(name) => {
                        self.last_saved = Some(name);
                        self.enter(DeviceState::ReadyForSync);
                    }
                    Err(err) => {
                        error!("cycle {} not saved: {}", self.ctx.cycle_id, err);
                        self.fail(ERR_SAVE);
                    }
                }
                sink.on_state_changed(&self.ctx.status());
            }

            DeviceState::Error => sink.on_state_changed(&self.ctx.status()),
        }
    }
}
