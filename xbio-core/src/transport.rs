//! GATT transport adapter
//!
//! Binds the core to a BLE-style link with one service and five
//! characteristics:
//!
//! | Characteristic | Access        | Content                                 |
//! |----------------|---------------|-----------------------------------------|
//! | control        | write         | `0x01` starts a cycle                   |
//! | status         | read, notify  | 3-byte status record                    |
//! | session list   | read          | JSON array of session filenames         |
//! | session data   | read, notify  | chunk frames and sentinels              |
//! | sync control   | write         | opcode byte followed by the payload     |
//!
//! Outbound, [`GattTransport`] is the state and sync sink of the core and
//! turns callbacks into notifications on a [`Link`]. Inbound,
//! [`InboundRouter`] turns characteristic writes into queued messages.

use log::{debug, warn};

use crate::constants::protocol::{
    CTRL_CHAR_UUID, CTRL_TRIGGER, SERVICE_UUID, SESSION_DATA_UUID, SESSION_LIST_UUID,
    STATUS_CHAR_UUID, SYNC_CTRL_UUID,
};
use crate::context::StatusReport;
use crate::errors::FrameError;
use crate::frame;
use crate::queue::{post, Inbound, InboundProducer};
use crate::traits::{StateSink, SyncSink};

/// Characteristics of the X-BIO service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Trigger input
    Control,
    /// State notifications
    Status,
    /// Stored session names
    SessionList,
    /// Chunk frames
    SessionData,
    /// Sync command input
    SyncControl,
}

impl Characteristic {
    /// UUID of the primary service holding every characteristic
    pub const SERVICE_UUID: &'static str = SERVICE_UUID;

    /// Every characteristic of the service
    pub const ALL: [Characteristic; 5] = [
        Characteristic::Control,
        Characteristic::Status,
        Characteristic::SessionList,
        Characteristic::SessionData,
        Characteristic::SyncControl,
    ];

    /// 128-bit UUID in canonical form
    pub const fn uuid(self) -> &'static str {
        match self {
            Characteristic::Control => CTRL_CHAR_UUID,
            Characteristic::Status => STATUS_CHAR_UUID,
            Characteristic::SessionList => SESSION_LIST_UUID,
            Characteristic::SessionData => SESSION_DATA_UUID,
            Characteristic::SyncControl => SYNC_CTRL_UUID,
        }
    }

    /// Characteristic with `uuid`, case-insensitive
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ch| ch.uuid().eq_ignore_ascii_case(uuid))
    }

    /// Accepts client writes
    pub const fn writable(self) -> bool {
        matches!(self, Characteristic::Control | Characteristic::SyncControl)
    }
}

/// Notification primitive of the radio stack
pub trait Link {
    /// Notify subscribers of `ch` with `bytes`
    fn notify(&mut self, ch: Characteristic, bytes: &[u8]);
}

impl<L: Link + ?Sized> Link for &mut L {
    fn notify(&mut self, ch: Characteristic, bytes: &[u8]) {
        (**self).notify(ch, bytes)
    }
}

/// Outbound half of the adapter
#[derive(Debug)]
pub struct GattTransport<L: Link> {
    link: L,
    chunk_size: usize,
}

impl<L: Link> GattTransport<L> {
    /// Adapter over `link`; error messages are cut to `chunk_size` bytes
    pub fn new(link: L, chunk_size: usize) -> Self {
        Self { link, chunk_size }
    }

    /// Underlying link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Underlying link, mutably
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

impl<L: Link> StateSink for GattTransport<L> {
    fn on_state_changed(&mut self, status: &StatusReport) {
        self.link.notify(Characteristic::Status, &status.to_bytes());
    }
}

impl<L: Link> SyncSink for GattTransport<L> {
    fn on_chunk(&mut self, payload: &[u8], index: u16, total: u16) -> Result<(), FrameError> {
        let bytes = frame::encode_chunk(index, total, payload)?;
        self.link.notify(Characteristic::SessionData, &bytes);
        Ok(())
    }

    fn on_sync_complete(&mut self) {
        self.link.notify(Characteristic::SessionData, &frame::encode_complete());
    }

    fn on_sync_error(&mut self, message: &str) {
        let bytes = frame::encode_error(message, self.chunk_size);
        self.link.notify(Characteristic::SessionData, &bytes);
    }
}

/// Inbound half of the adapter, called from the radio's write callback
pub struct InboundRouter<'q> {
    producer: InboundProducer<'q>,
}

impl<'q> InboundRouter<'q> {
    /// Router feeding `producer`
    pub fn new(producer: InboundProducer<'q>) -> Self {
        Self { producer }
    }

    /// Client wrote `data` to `ch`
    ///
    /// Returns whether a message was queued. Nothing is executed here.
    pub fn on_write(&mut self, ch: Characteristic, data: &[u8]) -> bool {
        match ch {
            Characteristic::Control => match data.first() {
                Some(&CTRL_TRIGGER) => post(&mut self.producer, Inbound::Trigger),
                _ => {
                    warn!("unknown control write {:02X?}", data);
                    false
                }
            },
            Characteristic::SyncControl => match data.split_first() {
                Some((&opcode, payload)) => {
                    debug!("sync write 0x{:02X}, {} byte payload", opcode, payload.len());
                    post(&mut self.producer, Inbound::sync(opcode, payload))
                }
                None => {
                    warn!("empty sync control write");
                    false
                }
            },
            _ => {
                warn!("write to read-only characteristic {:?}", ch);
                false
            }
        }
    }
}
