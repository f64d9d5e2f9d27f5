//! Line-oriented stand-in for the radio
//!
//! Each stdin line is one client action:
//!
//! | Line               | Effect                                   |
//! |--------------------|------------------------------------------|
//! | `trigger`          | control write `01`                       |
//! | `latest`           | sync write `01`                          |
//! | `send <name>`      | sync write `02` + name                   |
//! | `delete <name>`    | sync write `03` + name                   |
//! | `delete-all`       | sync write `04`                          |
//! | `write <ch> <hex>` | raw write; `ch` is a short name or UUID  |
//! | `status`, `list`   | read the characteristic                  |
//! | `quit`             | stop the node                            |

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use log::{info, warn};
use thiserror_no_std::Error;
use xbio_core::constants::protocol::{
    CTRL_TRIGGER, OP_DELETE_ALL, OP_DELETE_SESSION, OP_SEND_BY_FILENAME, OP_SEND_LATEST,
};
use xbio_core::transport::{Characteristic, InboundRouter};

pub const HELP: &str = "commands: trigger | latest | send <name> | delete <name> | delete-all | \
write <control|sync|uuid> <hex> | status | list | quit";

/// Parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Write(Characteristic, Vec<u8>),
    Read(Characteristic),
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("unknown characteristic {0:?}")]
    UnknownCharacteristic(String),

    #[error("{0:?} is not writable")]
    ReadOnly(Characteristic),

    #[error("bad hex {0:?}")]
    BadHex(String),
}

fn characteristic(name: &str) -> Result<Characteristic, ConsoleError> {
    match name {
        "control" => Ok(Characteristic::Control),
        "status" => Ok(Characteristic::Status),
        "list" => Ok(Characteristic::SessionList),
        "data" => Ok(Characteristic::SessionData),
        "sync" => Ok(Characteristic::SyncControl),
        other => Characteristic::from_uuid(other)
            .ok_or_else(|| ConsoleError::UnknownCharacteristic(other.to_string())),
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, ConsoleError> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return Err(ConsoleError::BadHex(text.to_string()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ConsoleError::BadHex(text.to_string()))
        })
        .collect()
}

fn sync_write(opcode: u8, name: &str) -> Line {
    let mut bytes = vec![opcode];
    bytes.extend_from_slice(name.as_bytes());
    Line::Write(Characteristic::SyncControl, bytes)
}

/// Parse one line; blank lines are `None`
pub fn parse(line: &str) -> Result<Option<Line>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let argument = |what: &'static str| {
        if rest.is_empty() {
            Err(ConsoleError::MissingArgument(what))
        } else {
            Ok(rest)
        }
    };

    let parsed = match command {
        "trigger" => Line::Write(Characteristic::Control, vec![CTRL_TRIGGER]),
        "latest" => Line::Write(Characteristic::SyncControl, vec![OP_SEND_LATEST]),
        "send" => sync_write(OP_SEND_BY_FILENAME, argument("send")?),
        "delete" => sync_write(OP_DELETE_SESSION, argument("delete")?),
        "delete-all" => Line::Write(Characteristic::SyncControl, vec![OP_DELETE_ALL]),
        "write" => {
            let (target, hex) = argument("write")?
                .split_once(char::is_whitespace)
                .ok_or(ConsoleError::MissingArgument("write"))?;
            let ch = characteristic(target)?;
            if !ch.writable() {
                return Err(ConsoleError::ReadOnly(ch));
            }
            Line::Write(ch, decode_hex(hex)?)
        }
        "status" => Line::Read(Characteristic::Status),
        "list" => Line::Read(Characteristic::SessionList),
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(parsed))
}

/// Read lines until `quit` or end of input, then clear `running`
///
/// Writes go through `router` exactly as radio writes would. Reads are
/// handed to the control loop, which owns the device.
pub fn serve<R: BufRead>(
    input: R,
    mut router: InboundRouter<'_>,
    reads: Sender<Characteristic>,
    running: &AtomicBool,
) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("console read failed: {}", err);
                break;
            }
        };
        match parse(&line) {
            Ok(None) => {}
            Ok(Some(Line::Write(ch, bytes))) => {
                if !router.on_write(ch, &bytes) {
                    warn!("write to {:?} not queued", ch);
                }
            }
            Ok(Some(Line::Read(ch))) => {
                if reads.send(ch).is_err() {
                    break;
                }
            }
            Ok(Some(Line::Help)) => println!("{}", HELP),
            Ok(Some(Line::Quit)) => break,
            Err(err) => warn!("{}; try `help`", err),
        }
    }
    info!("console closed");
    running.store(false, Ordering::Release);
}
