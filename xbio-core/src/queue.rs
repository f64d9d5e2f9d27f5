//! Inbound Message Queue
//!
//! ## Overview
//!
//! Writes from the radio arrive in the transport's callback context (an
//! interrupt or the stack's own task). They must not touch the state
//! machine from there. The transport only pushes an [`Inbound`] message
//! into a bounded single-producer/single-consumer queue; the control loop
//! drains it at the start of every tick.
//!
//! ```text
//! radio callback                         control loop
//!      │  push (never blocks)                 │ pop until empty
//!      ↓                                      ↓
//!  Producer ───→ [ spsc ring, 7 slots ] ───→ Consumer
//! ```
//!
//! ## Backpressure
//!
//! A full queue drops the new message and the push reports it. With a tick
//! every few milliseconds and a human-driven client, seven pending writes
//! is already far past normal use.
//!
//! The ring is `heapless::spsc::Queue`: lock-free, no allocation, `Send`
//! halves, so the producer may live on another thread or in an ISR.

use heapless::spsc::{Consumer, Producer, Queue};
use log::warn;

use crate::constants::buffers::{INBOUND_QUEUE_SIZE, MAX_COMMAND_PAYLOAD};

/// Sync command payload
pub type CommandPayload = heapless::Vec<u8, MAX_COMMAND_PAYLOAD>;

/// Message from the transport to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Start a new acquisition cycle
    Trigger,
    /// Sync command with its raw payload
    Sync {
        /// Wire opcode
        opcode: u8,
        /// Payload bytes, cut at [`MAX_COMMAND_PAYLOAD`]
        payload: CommandPayload,
    },
}

impl Inbound {
    /// Sync message copying at most [`MAX_COMMAND_PAYLOAD`] bytes of `payload`
    ///
    /// A payload longer than any valid session name keeps one byte too many,
    /// so it still fails name validation downstream.
    pub fn sync(opcode: u8, payload: &[u8]) -> Self {
        let keep = payload.len().min(MAX_COMMAND_PAYLOAD);
        let mut bytes = CommandPayload::new();
        // `keep` never exceeds the capacity.
        let _ = bytes.extend_from_slice(&payload[..keep]);
        Inbound::Sync {
            opcode,
            payload: bytes,
        }
    }
}

/// Backing storage of the inbound queue
pub type InboundQueue = Queue<Inbound, INBOUND_QUEUE_SIZE>;

/// Transport-side half
pub type InboundProducer<'q> = Producer<'q, Inbound, INBOUND_QUEUE_SIZE>;

/// Control-loop half
pub type InboundConsumer<'q> = Consumer<'q, Inbound, INBOUND_QUEUE_SIZE>;

/// Push `msg`, dropping it when the queue is full
pub fn post(producer: &mut InboundProducer<'_>, msg: Inbound) -> bool {
    match producer.enqueue(msg) {
        Ok(()) => true,
        Err(dropped) => {
            warn!("inbound queue full, dropping {:?}", dropped);
            false
        }
    }
}
