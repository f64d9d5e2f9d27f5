//! X-BIO node on a host machine
//!
//! Sessions are written under a data directory, the gas sensor is
//! simulated and stdin/stdout stand in for the BLE link (see [`console`]).
//!
//! ```text
//! xbio-node [--config <file.json>] [--data <dir>] [--dual-task] [--loopback]
//! ```
//!
//! Log verbosity follows `RUST_LOG`. `XBIO_DEVICE_ID` overrides the
//! configured device id.

mod console;
mod link;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{error, info};
use xbio_core::concurrent::SensingWorker;
use xbio_core::constants::time::HOST_TICK_INTERVAL_MS;
use xbio_core::context::DeviceId;
use xbio_core::queue::InboundQueue;
use xbio_core::sensor::{PhaseConfigFiles, SimulatedSensor};
use xbio_core::storage::FsStorage;
use xbio_core::time::SystemClock;
use xbio_core::traits::{CredentialStore, SensorPort};
use xbio_core::transport::{Characteristic, InboundRouter};
use xbio_core::{Device, DeviceConfig};

use crate::link::{describe_status, ConsoleLink};

const DEFAULT_DATA_DIR: &str = "xbio-data";

/// Command-line options
#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    config: Option<PathBuf>,
    data_dir: PathBuf,
    dual_task: bool,
    loopback: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dual_task: false,
            loopback: false,
        }
    }
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    options.config = Some(args.next().ok_or("--config needs a path")?.into());
                }
                "--data" => {
                    options.data_dir = args.next().ok_or("--data needs a directory")?.into();
                }
                "--dual-task" => options.dual_task = true,
                "--loopback" => options.loopback = true,
                other => return Err(format!("unknown argument {:?}", other)),
            }
        }
        Ok(options)
    }
}

/// Provisioned values from `XBIO_<KEY>` environment variables
struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(format!("XBIO_{}", key.to_ascii_uppercase())).ok()
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DeviceConfig, String> {
    let Some(path) = path else {
        return Ok(DeviceConfig::default());
    };
    let bytes = std::fs::read(path).map_err(|err| format!("{}: {}", path.display(), err))?;
    DeviceConfig::from_json(&bytes).map_err(|err| format!("{}: {}", path.display(), err))
}

fn print_read(ch: Characteristic, value: &[u8]) {
    match ch {
        Characteristic::Status => println!("status {}", describe_status(value)),
        Characteristic::SessionList => match serde_json::from_slice::<Vec<String>>(value) {
            Ok(names) if names.is_empty() => println!("no sessions"),
            Ok(names) => names.iter().for_each(|name| println!("session {}", name)),
            Err(err) => error!("session list unreadable: {}", err),
        },
        other => println!("{:?} {}", other, link::hex(value)),
    }
}

/// Run the cooperative loop until the console closes
fn run<P: SensorPort>(config: &DeviceConfig, id: DeviceId, storage: FsStorage, sensor: P, loopback: bool) {
    let mut queue = InboundQueue::new();
    let (tx, rx) = queue.split();
    let (reads_tx, reads_rx) = mpsc::channel();
    let running = AtomicBool::new(true);
    let tick = Duration::from_millis(HOST_TICK_INTERVAL_MS);

    let mut device = Device::new(
        config,
        id,
        SystemClock::new(),
        storage,
        sensor,
        ConsoleLink::new(loopback),
        rx,
    );

    thread::scope(|s| {
        let running = &running;
        s.spawn(move || console::serve(io::stdin().lock(), InboundRouter::new(tx), reads_tx, running));

        while running.load(Ordering::Acquire) {
            while let Ok(ch) = reads_rx.try_recv() {
                print_read(ch, &device.read_characteristic(ch));
            }
            device.poll();
            thread::sleep(tick);
        }
    });
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("usage: xbio-node [--config <file>] [--data <dir>] [--dual-task] [--loopback]");
            return ExitCode::from(2);
        }
    };

    let config = match load_config(options.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            error!("bad configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let storage = match FsStorage::new(&options.data_dir) {
        Ok(storage) => storage,
        Err(err) => {
            error!("data directory {}: {}", options.data_dir.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let id = config.resolve_device_id(&EnvCredentials);
    let sensor = SimulatedSensor::with_configs(PhaseConfigFiles::load(&storage));
    info!("xbio-node {} as {}, data in {}", xbio_core::VERSION, id, options.data_dir.display());
    info!("service {}", Characteristic::SERVICE_UUID);
    println!("{}", console::HELP);

    if options.dual_task {
        let interval = (config.acquisition.sample_interval_ms / 4).max(1);
        let mut worker = match SensingWorker::spawn(sensor, SystemClock::new(), interval) {
            Ok(worker) => worker,
            Err(err) => {
                error!("cannot start sensing worker: {}", err);
                return ExitCode::FAILURE;
            }
        };
        info!("dual-task mode, worker sampling every {} ms", interval);
        run(&config, id, storage, worker.port(), options.loopback);
        worker.stop();
    } else {
        run(&config, id, storage, sensor, options.loopback);
    }

    info!("shutting down");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_options() {
        assert_eq!(Options::parse(args(&[])).unwrap(), Options::default());

        let options = Options::parse(args(&["--config", "c.json", "--dual-task", "--data", "/tmp/x"])).unwrap();
        assert_eq!(options.config, Some(PathBuf::from("c.json")));
        assert_eq!(options.data_dir, PathBuf::from("/tmp/x"));
        assert!(options.dual_task);
        assert!(!options.loopback);

        assert!(Options::parse(args(&["--config"])).is_err());
        assert!(Options::parse(args(&["--fast"])).is_err());
    }

    #[test]
    fn config_file_is_validated() {
        let dir = std::env::temp_dir().join(format!("xbio-node-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(&good, br#"{"transfer":{"chunk_size":128}}"#).unwrap();
        std::fs::write(&bad, br#"{"transfer":{"chunk_size":0}}"#).unwrap();

        assert_eq!(load_config(Some(&good)).unwrap().transfer.chunk_size, 128);
        assert!(load_config(Some(&bad)).is_err());
        assert!(load_config(Some(&dir.join("missing.json"))).is_err());
        assert_eq!(load_config(None).unwrap(), DeviceConfig::default());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
