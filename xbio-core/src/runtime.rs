//! Cooperative device runtime
//!
//! [`Device`] owns every part of the core and wires them together. One
//! call to [`Device::poll`] is one tick of the control loop:
//!
//! 1. drain the inbound queue (triggers, sync commands)
//! 2. step the acquisition machine
//! 3. step the transfer engine
//!
//! All state mutation happens inside `poll`, on the caller's thread.

use alloc::vec::Vec;

use log::{error, info};

use crate::buffer::SampleBuffer;
use crate::config::DeviceConfig;
use crate::context::{DeviceContext, DeviceId};
use crate::errors::TransferError;
use crate::machine::AcquisitionMachine;
use crate::queue::{Inbound, InboundConsumer};
use crate::session::SessionStore;
use crate::storage::Storage;
use crate::time::TimeSource;
use crate::transfer::TransferEngine;
use crate::transport::{Characteristic, GattTransport, Link};
use crate::traits::SensorPort;

/// Single owner of the acquisition and sync state of one device
pub struct Device<'q, T, S, P, L>
where
    T: TimeSource + Clone,
    S: Storage,
    P: SensorPort,
    L: Link,
{
    machine: AcquisitionMachine<T>,
    engine: TransferEngine<T>,
    store: SessionStore<S>,
    sensor: P,
    transport: GattTransport<L>,
    inbound: InboundConsumer<'q>,
}

impl<'q, T, S, P, L> Device<'q, T, S, P, L>
where
    T: TimeSource + Clone,
    S: Storage,
    P: SensorPort,
    L: Link,
{
    /// Assemble a device
    ///
    /// The sample buffer is allocated here, once. If the allocation fails
    /// the device comes up in `Error` with the allocation code.
    pub fn new(
        config: &DeviceConfig,
        device_id: DeviceId,
        clock: T,
        storage: S,
        sensor: P,
        link: L,
        inbound: InboundConsumer<'q>,
    ) -> Self {
        let capacity = config.acquisition.sample_capacity;
        let samples = SampleBuffer::try_with_capacity(capacity).unwrap_or_else(|err| {
            error!("cannot allocate {} samples: {}", capacity, err);
            SampleBuffer::unallocated()
        });
        info!("device {} up, buffer for {} samples", device_id, samples.capacity());

        let ctx = DeviceContext::new(device_id, samples);
        let engine = TransferEngine::new(clock.clone(), config.transfer.clone());
        let chunk_size = engine.chunk_size();
        Self {
            machine: AcquisitionMachine::new(ctx, clock, config.acquisition.clone()),
            engine,
            store: SessionStore::new(storage),
            sensor,
            transport: GattTransport::new(link, chunk_size),
            inbound,
        }
    }

    /// One cooperative tick
    pub fn poll(&mut self) {
        while let Some(msg) = self.inbound.dequeue() {
            self.dispatch(msg);
        }
        self.machine
            .tick(&mut self.sensor, &mut self.store, &mut self.transport);
        self.engine.tick(&mut self.store, &mut self.transport);
    }

    fn dispatch(&mut self, msg: Inbound) {
        match msg {
            Inbound::Trigger => {
                self.trigger();
            }
            Inbound::Sync { opcode, payload } => {
                let _ = self.sync_command(opcode, &payload);
            }
        }
    }

    /// Start a cycle (button press or control write)
    pub fn trigger(&mut self) -> bool {
        self.machine.on_trigger(&mut self.transport)
    }

    /// Run a sync command immediately
    pub fn sync_command(&mut self, opcode: u8, payload: &[u8]) -> Result<(), TransferError> {
        self.engine
            .handle_command(opcode, payload, &mut self.store, &mut self.transport)
    }

    /// Value served for a client read of `ch`
    pub fn read_characteristic(&self, ch: Characteristic) -> Vec<u8> {
        match ch {
            Characteristic::Status => self.machine.context().status().to_bytes().to_vec(),
            Characteristic::SessionList => self.store.list_json().into_bytes(),
            _ => Vec::new(),
        }
    }

    /// Acquisition machine
    pub fn machine(&self) -> &AcquisitionMachine<T> {
        &self.machine
    }

    /// Transfer engine
    pub fn engine(&self) -> &TransferEngine<T> {
        &self.engine
    }

    /// Session store
    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// Session store, mutably
    pub fn store_mut(&mut self) -> &mut SessionStore<S> {
        &mut self.store
    }

    /// Sensor
    pub fn sensor_mut(&mut self) -> &mut P {
        &mut self.sensor
    }

    /// Transport adapter
    pub fn transport(&self) -> &GattTransport<L> {
        &self.transport
    }

    /// Transport adapter, mutably
    pub fn transport_mut(&mut self) -> &mut GattTransport<L> {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeviceState;
    use crate::queue::{post, InboundQueue};
    use crate::sensor::SimulatedSensor;
    use crate::storage::MemoryStorage;
    use crate::time::MockTimeSource;
    use crate::traits::NoCredentials;

    #[derive(Default)]
    struct Count(usize);

    impl Link for Count {
        fn notify(&mut self, _ch: Characteristic, _bytes: &[u8]) {
            self.0 += 1;
        }
    }

    #[test]
    fn queued_trigger_runs_on_next_poll() {
        let clock = MockTimeSource::new(0);
        let mut queue = InboundQueue::new();
        let (mut tx, rx) = queue.split();
        let config = DeviceConfig::default();
        let mut device = Device::new(
            &config,
            config.resolve_device_id(&NoCredentials),
            &clock,
            MemoryStorage::new(),
            SimulatedSensor::new(),
            Count::default(),
            rx,
        );

        post(&mut tx, Inbound::Trigger);
        assert_eq!(device.machine().state(), DeviceState::Idle);

        device.poll();
        // Trigger, then the LoadConfig tick in the same poll
        assert_eq!(device.machine().state(), DeviceState::Measure(crate::sample::Phase::A));
        assert_eq!(device.transport().link().0, 2);
        assert_eq!(device.read_characteristic(Characteristic::Status), [2, 0, 0]);
        assert_eq!(device.read_characteristic(Characteristic::SessionList), b"[]");
    }

    #[test]
    fn oversized_capacity_boots_into_error() {
        let clock = MockTimeSource::new(0);
        let mut queue = InboundQueue::new();
        let (_tx, rx) = queue.split();
        let mut config = DeviceConfig::default();
        config.acquisition.sample_capacity = usize::MAX;

        let mut device = Device::new(
            &config,
            DeviceId::new(),
            &clock,
            MemoryStorage::new(),
            SimulatedSensor::new(),
            Count::default(),
            rx,
        );
        assert_eq!(device.machine().state(), DeviceState::Error);
        assert!(!device.trigger());
        assert_eq!(device.read_characteristic(Characteristic::Status), [9, 0, 1]);
    }
}
