//! Session Persistence
//!
//! ## Overview
//!
//! A session is the durable record of one completed cycle. The store writes
//! one JSON document per cycle under the `sessions` directory of a
//! [`Storage`] backend and later enumerates, loads and deletes them for the
//! sync engine.
//!
//! ## File Naming
//!
//! ```text
//! 2024-05-01T10-00-00Z_cycle_0007.json
//! └──── start time ───┘      └ id ┘
//! ```
//!
//! The start time is UTC with second precision and `:` replaced by `-`, so
//! lexical order of names is chronological order of cycle starts.
//!
//! ## Document Layout
//!
//! ```json
//! {"version":1,"device_id":"XBIO-S3","cycle_id":7,
//!  "started_at":"2024-05-01T10:00:00Z","ended_at":"2024-05-01T10:00:50Z",
//!  "samples":[{"mode":"A","t_ms":0,...}]}
//! ```
//!
//! ## Names From the Link
//!
//! Names received from a client go through [`parse_session_name`] before
//! they reach storage: valid UTF-8, at most 64 bytes, no path separators,
//! no `..`.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::buffers::MAX_SESSION_NAME_LEN;
use crate::constants::protocol::{SESSIONS_DIR, SESSION_FORMAT_VERSION};
use crate::context::DeviceContext;
use crate::errors::{StorageError, StoreError};
use crate::sample::Sample;
use crate::storage::{join, Storage};
use crate::time::Timestamp;

/// Bare session filename, no directory prefix
pub type SessionName = heapless::String<MAX_SESSION_NAME_LEN>;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const FILENAME_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

fn utc(ms: Timestamp) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

/// ISO-8601 UTC rendering with second precision
pub fn iso8601(ms: Timestamp) -> String {
    alloc::format!("{}", utc(ms).format(ISO_FORMAT))
}

/// Filename for the cycle `cycle_id` started at `started_at`
///
/// Pure: equal inputs give equal names.
pub fn build_filename(started_at: Timestamp, cycle_id: u32) -> SessionName {
    let mut name = SessionName::new();
    // At most 20 + 7 + 10 + 5 bytes, always fits.
    let _ = write!(
        name,
        "{}_cycle_{:04}.json",
        utc(started_at).format(FILENAME_TIME_FORMAT),
        cycle_id
    );
    name
}

/// Validate a client-supplied session name
pub fn parse_session_name(raw: &[u8]) -> Result<SessionName, StoreError> {
    let text = core::str::from_utf8(raw).map_err(|_| StoreError::InvalidName)?;
    if text.is_empty() || text.contains(['/', '\\']) || text.contains("..") {
        return Err(StoreError::InvalidName);
    }
    let mut name = SessionName::new();
    name.push_str(text).map_err(|_| StoreError::InvalidName)?;
    Ok(name)
}

/// Cycle metadata written at the top of a session document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    /// Cycle identifier
    pub cycle_id: u32,
    /// Device identity
    pub device_id: String,
    /// Wall-clock time at trigger
    pub started_at: Timestamp,
    /// Wall-clock time at save
    pub ended_at: Timestamp,
}

impl SessionMeta {
    /// Metadata of the cycle held by `ctx`, ending at `ended_at`
    pub fn from_context(ctx: &DeviceContext, ended_at: Timestamp) -> Self {
        Self {
            cycle_id: ctx.cycle_id,
            device_id: String::from(ctx.device_id.as_str()),
            started_at: ctx.cycle_started_at,
            ended_at,
        }
    }

    /// Filename this session is stored under
    pub fn filename(&self) -> SessionName {
        build_filename(self.started_at, self.cycle_id)
    }
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    version: u32,
    device_id: &'a str,
    cycle_id: u32,
    started_at: String,
    ended_at: String,
    samples: &'a [Sample],
}

/// Parsed session document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionDocument {
    /// Format version
    pub version: u32,
    /// Device identity
    pub device_id: String,
    /// Cycle identifier
    pub cycle_id: u32,
    /// ISO-8601 start time
    pub started_at: String,
    /// ISO-8601 end time
    pub ended_at: String,
    /// Samples in acquisition order
    pub samples: Vec<Sample>,
}

impl SessionDocument {
    /// Parse session file contents
    pub fn parse(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode a session document
pub fn encode_session(meta: &SessionMeta, samples: &[Sample]) -> Result<Vec<u8>, StoreError> {
    let doc = DocumentOut {
        version: SESSION_FORMAT_VERSION,
        device_id: &meta.device_id,
        cycle_id: meta.cycle_id,
        started_at: iso8601(meta.started_at),
        ended_at: iso8601(meta.ended_at),
        samples,
    };
    Ok(serde_json::to_vec(&doc)?)
}

/// Session files on a storage backend
#[derive(Debug)]
pub struct SessionStore<S: Storage> {
    storage: S,
    dir: &'static str,
}

impl<S: Storage> SessionStore<S> {
    /// Store using the default `sessions` directory
    pub fn new(storage: S) -> Self {
        Self::with_dir(storage, SESSIONS_DIR)
    }

    /// Store using `dir` for session files
    pub fn with_dir(storage: S, dir: &'static str) -> Self {
        Self { storage, dir }
    }

    /// Backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Backend, mutably
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Release the backend
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn path(&self, name: &str) -> String {
        join(self.dir, name)
    }

    /// Persist the cycle held by `ctx`
    ///
    /// Fails with [`StoreError::EmptyBuffer`] and writes nothing when no
    /// samples were collected. Write failures are reported, not retried.
    pub fn save(&mut self, ctx: &DeviceContext, ended_at: Timestamp) -> Result<SessionName, StoreError> {
        if ctx.samples.is_empty() {
            warn!("cycle {} has no samples, nothing saved", ctx.cycle_id);
            return Err(StoreError::EmptyBuffer);
        }

        let meta = SessionMeta::from_context(ctx, ended_at);
        let bytes = encode_session(&meta, ctx.samples.as_slice())?;
        let name = meta.filename();

        let path = self.path(&name);
        self.storage.create_dir_all(self.dir)?;
        self.storage.write(&path, &bytes)?;

        info!(
            "saved session {} ({} samples, {} bytes)",
            name,
            ctx.samples.count(),
            bytes.len()
        );
        Ok(name)
    }

    /// Session filenames in name order; empty when the directory is absent
    pub fn list(&self) -> Result<Vec<SessionName>, StoreError> {
        let entries = match self.storage.list(self.dir) {
            Ok(entries) => entries,
            Err(StorageError::NotFound) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().filter(|e| !e.is_dir) {
            let mut name = SessionName::new();
            if name.push_str(&entry.name).is_ok() {
                names.push(name);
            } else {
                warn!("skipping over-long session name {}", entry.name);
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }

    /// JSON array of session filenames, `[]` when there are none
    pub fn list_json(&self) -> String {
        let names = match self.list() {
            Ok(names) => names,
            Err(err) => {
                error!("session list failed: {}", err);
                Vec::new()
            }
        };
        let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        serde_json::to_string(&names).unwrap_or_else(|_| String::from("[]"))
    }

    /// Contents of session `name`, replacing `out`
    ///
    /// Returns the byte count. Absent and empty files are errors.
    pub fn load_into(&self, name: &str, out: &mut Vec<u8>) -> Result<usize, StoreError> {
        let name = parse_session_name(name.as_bytes())?;
        match self.storage.read_into(&self.path(&name), out) {
            Ok(()) => {}
            Err(StorageError::NotFound) => return Err(StoreError::NotFound(name)),
            Err(err) => return Err(err.into()),
        }
        if out.is_empty() {
            return Err(StoreError::EmptyFile(name));
        }
        debug!("loaded {} ({} bytes)", name, out.len());
        Ok(out.len())
    }

    /// Contents of session `name`
    pub fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        self.load_into(name, &mut out)?;
        Ok(out)
    }

    /// Remove session `name`
    pub fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        let name = parse_session_name(name.as_bytes())?;
        let path = self.path(&name);
        if !self.storage.exists(&path) {
            return Err(StoreError::NotFound(name));
        }
        self.storage.remove(&path)?;
        info!("deleted session {}", name);
        Ok(())
    }

    /// Remove every session file
    ///
    /// Attempts all files even after a failure and reports the number
    /// removed. Any file left behind makes the whole call fail. Not atomic.
    pub fn delete_all(&mut self) -> Result<usize, StoreError> {
        let entries = self.storage.list(self.dir)?;

        let mut removed = 0;
        let mut failed = 0;
        for entry in entries.iter().filter(|e| !e.is_dir) {
            let path = self.path(&entry.name);
            match self.storage.remove(&path) {
                Ok(()) => {
                    debug!("deleted {}", path);
                    removed += 1;
                }
                Err(err) => {
                    error!("failed to delete {}: {}", path, err);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(StoreError::PartialDelete { failed });
        }
        info!("deleted {} session(s)", removed);
        Ok(removed)
    }

    /// Most recently modified session, `None` when there are none
    ///
    /// Equal modification times resolve to the lexically greater name.
    pub fn latest(&self) -> Result<Option<SessionName>, StoreError> {
        let entries = match self.storage.list(self.dir) {
            Ok(entries) => entries,
            Err(StorageError::NotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let newest = entries
            .into_iter()
            .filter(|e| !e.is_dir && e.name.len() <= MAX_SESSION_NAME_LEN)
            .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

        Ok(newest.and_then(|entry| {
            let mut name = SessionName::new();
            name.push_str(&entry.name).ok().map(|_| name)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::context::DeviceId;
    use crate::sample::{Phase, RawMeasurement};
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;

    const MAY_1_2024: Timestamp = 1_714_557_600_000; // 2024-05-01T10:00:00Z

    fn context(samples: usize) -> DeviceContext {
        let mut buffer = SampleBuffer::try_with_capacity(16).unwrap();
        for i in 0..samples {
            let raw = RawMeasurement {
                temp_c: 30.0 + i as f32,
                humidity_pct: 40.0,
                pressure_hpa: 1000.0,
                gas_res_ohm: 100_000.0,
            };
            buffer.append(Sample::raw(Phase::A, i as u32 * 200, i as u8, raw));
        }
        let mut ctx = DeviceContext::new(DeviceId::try_from("XBIO-S3").unwrap(), buffer);
        ctx.cycle_id = 7;
        ctx.cycle_started_at = MAY_1_2024;
        ctx
    }

    #[test]
    fn filename_format() {
        assert_eq!(build_filename(MAY_1_2024, 7).as_str(), "2024-05-01T10-00-00Z_cycle_0007.json");
        assert_eq!(build_filename(0, 12345).as_str(), "1970-01-01T00-00-00Z_cycle_12345.json");
        assert_eq!(iso8601(MAY_1_2024 + 50_000), "2024-05-01T10:00:50Z");
    }

    #[test]
    fn save_writes_versioned_document() {
        let mut store = SessionStore::new(MemoryStorage::new());
        let name = store.save(&context(3), MAY_1_2024 + 50_000).unwrap();

        let bytes = store.load(&name).unwrap();
        let doc = SessionDocument::parse(&bytes).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.device_id, "XBIO-S3");
        assert_eq!(doc.cycle_id, 7);
        assert_eq!(doc.started_at, "2024-05-01T10:00:00Z");
        assert_eq!(doc.ended_at, "2024-05-01T10:00:50Z");
        assert_eq!(doc.samples.len(), 3);
        assert_eq!(doc.samples[2].raw.temp_c, 32.0);
    }

    #[test]
    fn nan_raw_reading_keeps_the_document_readable() {
        let mut ctx = context(0);
        let raw = RawMeasurement {
            temp_c: f32::NAN,
            humidity_pct: 40.0,
            pressure_hpa: 1000.0,
            gas_res_ohm: 100_000.0,
        };
        ctx.samples.append(Sample::raw(Phase::B, 400, 2, raw));
        ctx.samples.append(Sample::raw(Phase::B, 600, 3, RawMeasurement { temp_c: 31.5, ..raw }));

        let mut store = SessionStore::new(MemoryStorage::new());
        let name = store.save(&ctx, MAY_1_2024).unwrap();
        let doc = SessionDocument::parse(&store.load(&name).unwrap()).unwrap();

        assert_eq!(doc.samples.len(), 2);
        assert!(doc.samples[0].raw.temp_c.is_nan());
        assert_eq!(doc.samples[0].raw.gas_res_ohm, 100_000.0);
        assert_eq!(doc.samples[1].raw.temp_c, 31.5);
        assert_eq!(doc.samples[1].t_ms, 600);
    }

    #[test]
    fn empty_buffer_is_not_saved() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert_eq!(store.save(&context(0), 0), Err(StoreError::EmptyBuffer));
        assert_eq!(store.storage().file_count(), 0);
        assert!(!store.storage().exists(SESSIONS_DIR));
    }

    #[test]
    fn write_failure_is_reported() {
        let mut storage = MemoryStorage::new();
        storage.set_read_only(true);
        let mut store = SessionStore::new(storage);
        assert!(matches!(
            store.save(&context(2), 0),
            Err(StoreError::Storage(StorageError::Io(_)))
        ));
    }

    #[test]
    fn list_skips_directories_and_tolerates_absence() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.list_json(), "[]");

        store.save(&context(1), 0).unwrap();
        store.storage_mut().create_dir_all("sessions/archive").unwrap();

        let names = store.list().unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(store.list_json(), r#"["2024-05-01T10-00-00Z_cycle_0007.json"]"#);
    }

    #[test]
    fn load_rejects_missing_and_empty_files() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert!(matches!(store.load("nope.json"), Err(StoreError::NotFound(_))));

        store.storage_mut().create_dir_all("sessions").unwrap();
        store.storage_mut().write("sessions/empty.json", b"").unwrap();
        assert!(matches!(store.load("empty.json"), Err(StoreError::EmptyFile(_))));
    }

    #[test]
    fn latest_prefers_newest_write() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert_eq!(store.latest().unwrap(), None);

        let mut ctx = context(1);
        let first = store.save(&ctx, 0).unwrap();
        // Older start time, written later
        ctx.cycle_id = 8;
        ctx.cycle_started_at = MAY_1_2024 - 3_600_000;
        let second = store.save(&ctx, 0).unwrap();
        assert!(second.as_str() < first.as_str());

        assert_eq!(store.latest().unwrap(), Some(second));
    }

    #[test]
    fn latest_breaks_ties_by_name() {
        let mut storage = MemoryStorage::new();
        storage.create_dir_all("sessions").unwrap();
        storage.write("sessions/a.json", b"1").unwrap();
        storage.write("sessions/b.json", b"2").unwrap();
        storage.touch("sessions/a.json", 5).unwrap();
        storage.touch("sessions/b.json", 5).unwrap();

        let store = SessionStore::new(storage);
        assert_eq!(store.latest().unwrap().as_deref(), Some("b.json"));
    }

    #[test]
    fn delete_all_attempts_every_file() {
        let mut store = SessionStore::new(MemoryStorage::new());
        let mut ctx = context(1);
        for id in 1..=3 {
            ctx.cycle_id = id;
            store.save(&ctx, 0).unwrap();
        }
        let locked = store.path(&build_filename(MAY_1_2024, 2));
        store.storage_mut().lock(&locked);

        assert_eq!(store.delete_all(), Err(StoreError::PartialDelete { failed: 1 }));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn delete_all_without_directory_fails() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert!(store.delete_all().is_err());
    }

    #[test]
    fn delete_single_session() {
        let mut store = SessionStore::new(MemoryStorage::new());
        let name = store.save(&context(1), 0).unwrap();
        store.delete(&name).unwrap();
        assert!(matches!(store.delete(&name), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn hostile_names_are_rejected() {
        for raw in [&b""[..], b"../secret", b"a/b.json", b"a\\b", b"\xff\xfe"] {
            assert_eq!(parse_session_name(raw), Err(StoreError::InvalidName));
        }
        let long = [b'a'; MAX_SESSION_NAME_LEN + 1];
        assert_eq!(parse_session_name(&long), Err(StoreError::InvalidName));
        assert!(parse_session_name(b"2024-05-01T10-00-00Z_cycle_0007.json").is_ok());
    }

    proptest! {
        #[test]
        fn filenames_sort_chronologically(a in 0u64..4_000_000_000_000, b in 0u64..4_000_000_000_000, id in 0u32..10_000) {
            let (early, late) = (a.min(b) / 1000 * 1000, a.max(b) / 1000 * 1000);
            let (first, second) = (build_filename(early, id), build_filename(late, id));
            prop_assert_eq!(&first, &build_filename(early, id));
            prop_assert!(first.as_str() <= second.as_str());
        }
    }
}
