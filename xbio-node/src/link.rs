//! Console "radio": notifications go to stdout

use std::fmt::Write as _;

use log::{info, warn};
use xbio_core::frame::ChunkAssembler;
use xbio_core::transport::{Characteristic, Link};
use xbio_core::DeviceState;

/// Lower-case hex, no separators
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Human-readable status record
pub fn describe_status(bytes: &[u8]) -> String {
    match bytes {
        [code, count, err] => match DeviceState::from_code(*code) {
            Some(state) => format!("{} samples={} err={}", state, count, err),
            None => format!("state?{} samples={} err={}", code, count, err),
        },
        _ => format!("malformed status {}", hex(bytes)),
    }
}

/// Prints every notification; in loopback mode session data is also
/// reassembled the way the phone would
pub struct ConsoleLink {
    loopback: Option<ChunkAssembler>,
}

impl ConsoleLink {
    pub fn new(loopback: bool) -> Self {
        Self {
            loopback: loopback.then(ChunkAssembler::new),
        }
    }

    fn receive(&mut self, frame: &[u8]) {
        let Some(assembler) = self.loopback.as_mut() else {
            return;
        };
        match assembler.push(frame) {
            Ok(Some(bytes)) => info!("loopback: session received, {} bytes", bytes.len()),
            Ok(None) => {}
            Err(err) => warn!("loopback: {}", err),
        }
    }
}

impl Link for ConsoleLink {
    fn notify(&mut self, ch: Characteristic, bytes: &[u8]) {
        match ch {
            Characteristic::Status => println!("status {}", describe_status(bytes)),
            Characteristic::SessionData => {
                println!("data {}", hex(bytes));
                self.receive(bytes);
            }
            other => println!("{:?} {}", other, hex(bytes)),
        }
    }
}
