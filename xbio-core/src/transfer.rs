//! Chunked Session Transfer Engine
//!
//! ## Overview
//!
//! Streams stored sessions to the paired client and executes its delete
//! commands. One transfer is active at a time; the engine owns its state
//! and the loaded session bytes.
//!
//! ```text
//!              SendLatest / SendByFilename          DeleteSession
//!   Idle/Error ───────────────→ LoadingSession     Idle/Error ──→ DeletingFile
//!                                   │ next tick                      │ next tick
//!                                   ↓                                ↓
//!                             SendingChunks ── all sent ──→ Idle   Idle | Error
//!                                   │
//!                                   └─ load failure ─→ Error
//! ```
//!
//! ## Command Admission
//!
//! Commands are accepted only in `Idle` or `Error`. Anything arriving
//! mid-transfer is refused with [`TransferError::Busy`] and produces no
//! output at all: a half-sent file is never interrupted.
//!
//! ## Pacing
//!
//! At most one chunk per `chunk_interval_ms`. The interval also applies
//! before the first chunk (measured from the load) and before the
//! completion sentinel (measured from the last chunk). There is no
//! acknowledgment or retransmission; the client detects loss through the
//! total count.

use alloc::vec::Vec;

use log::{debug, error, info, warn};

use crate::config::TransferConfig;
use crate::constants::buffers::MAX_CHUNK_SIZE;
use crate::constants::protocol::{
    MAX_TOTAL_CHUNKS, OP_DELETE_ALL, OP_DELETE_SESSION, OP_SEND_BY_FILENAME, OP_SEND_LATEST,
};
use crate::errors::{StoreError, TransferError};
use crate::session::{parse_session_name, SessionName, SessionStore};
use crate::storage::Storage;
use crate::time::{elapsed_ms, Millis, TimeSource};
use crate::traits::SyncSink;

/// Transfer engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Ready for a command
    Idle,
    /// Session bytes are read on the next tick
    LoadingSession,
    /// Chunks are being emitted
    SendingChunks,
    /// File is removed on the next tick
    DeletingFile,
    /// Last command failed; accepts a new one
    Error,
}

impl SyncState {
    /// Whether a new command may start
    pub const fn accepts_command(self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Error)
    }
}

/// Sync command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOpcode {
    /// Stream the most recent session
    SendLatest,
    /// Stream the named session
    SendByFilename,
    /// Delete the named session
    DeleteSession,
    /// Delete every session
    DeleteAll,
}

impl SyncOpcode {
    /// Decode a wire opcode
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            OP_SEND_LATEST => Some(SyncOpcode::SendLatest),
            OP_SEND_BY_FILENAME => Some(SyncOpcode::SendByFilename),
            OP_DELETE_SESSION => Some(SyncOpcode::DeleteSession),
            OP_DELETE_ALL => Some(SyncOpcode::DeleteAll),
            _ => None,
        }
    }

    /// Wire opcode
    pub const fn byte(self) -> u8 {
        match self {
            SyncOpcode::SendLatest => OP_SEND_LATEST,
            SyncOpcode::SendByFilename => OP_SEND_BY_FILENAME,
            SyncOpcode::DeleteSession => OP_DELETE_SESSION,
            SyncOpcode::DeleteAll => OP_DELETE_ALL,
        }
    }
}

/// Outcome of one [`TransferEngine::poll_send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not sending; nothing emitted
    Idle,
    /// Chunk `index` of `total` emitted
    Chunk {
        /// Index just sent
        index: u16,
        /// Chunks in the transfer
        total: u16,
    },
    /// Completion sentinel emitted, engine back in `Idle`
    Complete,
}

/// Number of `chunk_size` chunks needed for `len` bytes
pub const fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

/// Session transfer state machine
#[derive(Debug)]
pub struct TransferEngine<T: TimeSource> {
    state: SyncState,
    filename: Option<SessionName>,
    data: Vec<u8>,
    chunk_index: u16,
    total_chunks: u16,
    last_chunk_ms: Millis,
    last_error: Option<TransferError>,
    clock: T,
    config: TransferConfig,
}

impl<T: TimeSource> TransferEngine<T> {
    /// Idle engine
    ///
    /// A chunk size outside `1..=MAX_CHUNK_SIZE` is clamped into that range.
    pub fn new(clock: T, mut config: TransferConfig) -> Self {
        let chunk_size = config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        if chunk_size != config.chunk_size {
            warn!("chunk size {} out of range, using {}", config.chunk_size, chunk_size);
            config.chunk_size = chunk_size;
        }
        Self {
            state: SyncState::Idle,
            filename: None,
            data: Vec::new(),
            chunk_index: 0,
            total_chunks: 0,
            last_chunk_ms: 0,
            last_error: None,
            clock,
            config,
        }
    }

    /// Current state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Session targeted by the current or last command
    pub fn filename(&self) -> Option<&SessionName> {
        self.filename.as_ref()
    }

    /// Next chunk index and total chunk count
    pub fn progress(&self) -> (u16, u16) {
        (self.chunk_index, self.total_chunks)
    }

    /// Last reported failure
    pub fn last_error(&self) -> Option<&TransferError> {
        self.last_error.as_ref()
    }

    /// Payload bytes per chunk
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Bytes of the loaded session
    pub fn loaded_len(&self) -> usize {
        self.data.len()
    }

    /// Report `err` without leaving the current state
    fn reject<N: SyncSink + ?Sized>(&mut self, err: TransferError, sink: &mut N) -> Result<(), TransferError> {
        warn!("sync command rejected: {}", err);
        sink.on_sync_error(err.client_message());
        self.last_error = Some(err.clone());
        Err(err)
    }

    /// Report `err` and move to `Error`
    fn fail<N: SyncSink + ?Sized>(&mut self, err: TransferError, sink: &mut N) -> Result<(), TransferError> {
        error!("sync failed: {}", err);
        self.state = SyncState::Error;
        self.data.clear();
        sink.on_sync_error(err.client_message());
        self.last_error = Some(err.clone());
        Err(err)
    }

    fn named(payload: &[u8]) -> Result<SessionName, TransferError> {
        if payload.is_empty() {
            return Err(TransferError::MissingFilename);
        }
        parse_session_name(payload).map_err(|_| TransferError::InvalidFilename)
    }

    /// Dispatch a sync command from the client
    ///
    /// Refused with [`TransferError::Busy`], and no output, unless the
    /// engine is `Idle` or `Error`. Every other failure has already been
    /// reported through `sink` when this returns.
    pub fn handle_command<S, N>(
        &mut self,
        opcode: u8,
        payload: &[u8],
        store: &mut SessionStore<S>,
        sink: &mut N,
    ) -> Result<(), TransferError>
    where
        S: Storage,
        N: SyncSink + ?Sized,
    {
        if !self.state.accepts_command() {
            warn!("sync command 0x{:02X} ignored: busy ({:?})", opcode, self.state);
            return Err(TransferError::Busy);
        }
        debug!("sync command 0x{:02X} ({} byte payload)", opcode, payload.len());

        let Some(command) = SyncOpcode::from_byte(opcode) else {
            return self.reject(TransferError::UnknownCommand(opcode), sink);
        };

        match command {
            SyncOpcode::SendLatest => match store.latest() {
                Ok(Some(name)) => {
                    info!("sending latest session {}", name);
                    self.start(name, SyncState::LoadingSession);
                    Ok(())
                }
                Ok(None) => self.fail(TransferError::NoSessions, sink),
                Err(err) => {
                    error!("session scan failed: {}", err);
                    self.fail(TransferError::NoSessions, sink)
                }
            },

            SyncOpcode::SendByFilename => match Self::named(payload) {
                Ok(name) => {
                    self.start(name, SyncState::LoadingSession);
                    Ok(())
                }
                Err(err) => self.reject(err, sink),
            },

            SyncOpcode::DeleteSession => match Self::named(payload) {
                Ok(name) => {
                    self.start(name, SyncState::DeletingFile);
                    Ok(())
                }
                Err(err) => self.reject(err, sink),
            },

            SyncOpcode::DeleteAll => {
                self.filename = None;
                self.data.clear();
                self.state = SyncState::Idle;
                match store.delete_all() {
                    Ok(removed) => {
                        info!("deleted all sessions ({})", removed);
                        self.last_error = None;
                        sink.on_sync_complete();
                        Ok(())
                    }
                    Err(err) => {
                        error!("delete all failed: {}", err);
                        self.reject(TransferError::DeleteAllFailed, sink)
                    }
                }
            }
        }
    }

    fn start(&mut self, name: SessionName, next: SyncState) {
        self.filename = Some(name);
        self.data.clear();
        self.chunk_index = 0;
        self.total_chunks = 0;
        self.last_error = None;
        self.state = next;
    }

    /// Advance the engine by one cooperative step
    pub fn tick<S, N>(&mut self, store: &mut SessionStore<S>, sink: &mut N)
    where
        S: Storage,
        N: SyncSink + ?Sized,
    {
        match self.state {
            SyncState::Idle | SyncState::Error => {}
            SyncState::LoadingSession => {
                let _ = self.load(store, sink);
            }
            SyncState::SendingChunks => {
                // WouldBlock is the pacing wait.
                let _ = self.poll_send(sink);
            }
            SyncState::DeletingFile => {
                let _ = self.delete(store, sink);
            }
        }
    }

    fn load<S, N>(&mut self, store: &mut SessionStore<S>, sink: &mut N) -> Result<(), TransferError>
    where
        S: Storage,
        N: SyncSink + ?Sized,
    {
        let Some(name) = self.filename.clone() else {
            return self.fail(TransferError::LoadFailed, sink);
        };

        match store.load_into(&name, &mut self.data) {
            Ok(_) => {}
            Err(StoreError::EmptyFile(_)) => return self.fail(TransferError::EmptyFile, sink),
            Err(err) => {
                error!("loading {} failed: {}", name, err);
                return self.fail(TransferError::LoadFailed, sink);
            }
        }

        let chunks = chunk_count(self.data.len(), self.config.chunk_size);
        let Ok(total) = u16::try_from(chunks) else {
            return self.fail(TransferError::TooLarge { chunks }, sink);
        };
        if total > MAX_TOTAL_CHUNKS {
            return self.fail(TransferError::TooLarge { chunks }, sink);
        }

        info!("loaded {} ({} bytes, {} chunks)", name, self.data.len(), total);
        self.chunk_index = 0;
        self.total_chunks = total;
        self.last_chunk_ms = self.clock.now_ms();
        self.state = SyncState::SendingChunks;
        Ok(())
    }

    /// Emit the next chunk once the pacing interval has passed
    ///
    /// `WouldBlock` while waiting on the interval. After the last chunk,
    /// the following call emits the completion sentinel, clears the loaded
    /// bytes (keeping their allocation) and returns the engine to `Idle`.
    pub fn poll_send<N: SyncSink + ?Sized>(&mut self, sink: &mut N) -> nb::Result<Progress, TransferError> {
        if self.state != SyncState::SendingChunks {
            return Ok(Progress::Idle);
        }

        let now = self.clock.now_ms();
        if elapsed_ms(self.last_chunk_ms, now) < self.config.chunk_interval_ms {
            return Err(nb::Error::WouldBlock);
        }

        if self.chunk_index >= self.total_chunks {
            info!("transfer complete ({} chunks)", self.total_chunks);
            self.data.clear();
            self.state = SyncState::Idle;
            sink.on_sync_complete();
            return Ok(Progress::Complete);
        }

        let start = usize::from(self.chunk_index) * self.config.chunk_size;
        let end = (start + self.config.chunk_size).min(self.data.len());
        let index = self.chunk_index;
        debug!("chunk {}/{} ({} bytes)", index + 1, self.total_chunks, end - start);
        if let Err(frame) = sink.on_chunk(&self.data[start..end], index, self.total_chunks) {
            let err = TransferError::SendFailed { index, frame };
            let _ = self.fail(err.clone(), sink);
            return Err(nb::Error::Other(err));
        }

        self.chunk_index += 1;
        self.last_chunk_ms = now;
        Ok(Progress::Chunk {
            index,
            total: self.total_chunks,
        })
    }

    fn delete<S, N>(&mut self, store: &mut SessionStore<S>, sink: &mut N) -> Result<(), TransferError>
    where
        S: Storage,
        N: SyncSink + ?Sized,
    {
        let Some(name) = self.filename.clone() else {
            return self.fail(TransferError::DeleteFailed, sink);
        };
        match store.delete(&name) {
            Ok(()) => {
                self.state = SyncState::Idle;
                sink.on_sync_complete();
                Ok(())
            }
            Err(err) => {
                error!("deleting {} failed: {}", name, err);
                self.fail(TransferError::DeleteFailed, sink)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FrameError;
    use crate::storage::MemoryStorage;
    use crate::time::MockTimeSource;
    use alloc::string::String;

    #[derive(Debug, PartialEq)]
    enum Out {
        Chunk(Vec<u8>, u16, u16),
        Complete,
        Error(String),
    }

    #[derive(Default)]
    struct Recorder(Vec<Out>);

    impl SyncSink for Recorder {
        fn on_chunk(&mut self, payload: &[u8], index: u16, total: u16) -> Result<(), FrameError> {
            self.0.push(Out::Chunk(payload.to_vec(), index, total));
            Ok(())
        }
        fn on_sync_complete(&mut self) {
            self.0.push(Out::Complete);
        }
        fn on_sync_error(&mut self, message: &str) {
            self.0.push(Out::Error(String::from(message)));
        }
    }

    fn store_with(files: &[(&str, &str)]) -> SessionStore<MemoryStorage> {
        let mut storage = MemoryStorage::new();
        storage.create_dir_all("sessions").unwrap();
        for (name, contents) in files {
            storage.write(&alloc::format!("sessions/{}", name), contents.as_bytes()).unwrap();
        }
        SessionStore::new(storage)
    }

    fn engine(clock: &MockTimeSource, chunk_size: usize) -> TransferEngine<&MockTimeSource> {
        TransferEngine::new(
            clock,
            TransferConfig {
                chunk_size,
                chunk_interval_ms: 50,
            },
        )
    }

    #[test]
    fn chunk_counts() {
        assert_eq!(chunk_count(0, 240), 0);
        assert_eq!(chunk_count(1, 240), 1);
        assert_eq!(chunk_count(240, 240), 1);
        assert_eq!(chunk_count(241, 240), 2);
    }

    #[test]
    fn send_by_filename_streams_paced_chunks() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("s.json", "0123456789")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_BY_FILENAME, b"s.json", &mut store, &mut sink).unwrap();
        assert_eq!(e.state(), SyncState::LoadingSession);

        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::SendingChunks);
        assert_eq!(e.progress(), (0, 3));

        // Same instant as the load: pacing holds the first chunk back
        e.tick(&mut store, &mut sink);
        assert!(sink.0.is_empty());

        for _ in 0..4 {
            clock.advance(50);
            e.tick(&mut store, &mut sink);
        }
        assert_eq!(
            sink.0,
            [
                Out::Chunk(b"0123".to_vec(), 0, 3),
                Out::Chunk(b"4567".to_vec(), 1, 3),
                Out::Chunk(b"89".to_vec(), 2, 3),
                Out::Complete,
            ]
        );
        assert_eq!(e.state(), SyncState::Idle);
        assert_eq!(e.loaded_len(), 0);
    }

    #[test]
    fn poll_send_would_block_inside_interval() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("s.json", "abc")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_BY_FILENAME, b"s.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);

        clock.advance(49);
        assert_eq!(e.poll_send(&mut sink), Err(nb::Error::WouldBlock));
        clock.advance(1);
        assert_eq!(e.poll_send(&mut sink), Ok(Progress::Chunk { index: 0, total: 1 }));
        assert_eq!(e.poll_send(&mut sink), Err(nb::Error::WouldBlock));
        clock.advance(50);
        assert_eq!(e.poll_send(&mut sink), Ok(Progress::Complete));
        assert_eq!(e.poll_send(&mut sink), Ok(Progress::Idle));
    }

    #[test]
    fn commands_are_refused_mid_transfer() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("a.json", "0123456789"), ("b.json", "x")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_BY_FILENAME, b"a.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);

        for opcode in [OP_SEND_LATEST, OP_SEND_BY_FILENAME, OP_DELETE_ALL, 0x7F] {
            assert_eq!(
                e.handle_command(opcode, b"b.json", &mut store, &mut sink),
                Err(TransferError::Busy)
            );
        }
        assert_eq!(e.state(), SyncState::SendingChunks);
        assert_eq!(e.filename().map(|n| n.as_str()), Some("a.json"));
        assert!(sink.0.is_empty());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn missing_filename_reports_without_state_change() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[]);
        let mut sink = Recorder::default();

        for opcode in [OP_SEND_BY_FILENAME, OP_DELETE_SESSION] {
            assert_eq!(
                e.handle_command(opcode, b"", &mut store, &mut sink),
                Err(TransferError::MissingFilename)
            );
            assert_eq!(e.state(), SyncState::Idle);
        }
        assert_eq!(sink.0, [Out::Error("No filename".into()), Out::Error("No filename".into())]);
    }

    #[test]
    fn traversal_names_are_refused() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[]);
        let mut sink = Recorder::default();

        assert_eq!(
            e.handle_command(OP_DELETE_SESSION, b"../config/config_A.bmeconfig", &mut store, &mut sink),
            Err(TransferError::InvalidFilename)
        );
        assert_eq!(e.state(), SyncState::Idle);
    }

    #[test]
    fn send_latest_without_sessions_fails() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = SessionStore::new(MemoryStorage::new());
        let mut sink = Recorder::default();

        assert_eq!(
            e.handle_command(OP_SEND_LATEST, b"", &mut store, &mut sink),
            Err(TransferError::NoSessions)
        );
        assert_eq!(e.state(), SyncState::Error);
        assert_eq!(sink.0, [Out::Error("No sessions".into())]);
    }

    #[test]
    fn send_latest_picks_newest() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 240);
        let mut store = store_with(&[("old.json", "old"), ("new.json", "new")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_LATEST, b"", &mut store, &mut sink).unwrap();
        assert_eq!(e.filename().map(|n| n.as_str()), Some("new.json"));
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[]);
        let mut sink = Recorder::default();

        assert_eq!(
            e.handle_command(0x2A, b"", &mut store, &mut sink),
            Err(TransferError::UnknownCommand(0x2A))
        );
        assert_eq!(e.state(), SyncState::Idle);
        assert_eq!(sink.0, [Out::Error("Unknown cmd".into())]);
    }

    #[test]
    fn load_failures_enter_error_and_recover() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("empty.json", ""), ("ok.json", "data")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_BY_FILENAME, b"gone.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::Error);

        e.handle_command(OP_SEND_BY_FILENAME, b"empty.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::Error);
        assert_eq!(sink.0, [Out::Error("Load failed".into()), Out::Error("Empty file".into())]);

        e.handle_command(OP_SEND_BY_FILENAME, b"ok.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::SendingChunks);
    }

    #[test]
    fn delete_session_paths() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("a.json", "1")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_DELETE_SESSION, b"a.json", &mut store, &mut sink).unwrap();
        assert_eq!(e.state(), SyncState::DeletingFile);
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::Idle);
        assert!(store.list().unwrap().is_empty());

        e.handle_command(OP_DELETE_SESSION, b"a.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::Error);
        assert_eq!(sink.0, [Out::Complete, Out::Error("Delete failed".into())]);
    }

    #[test]
    fn delete_all_is_synchronous() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("a.json", "1"), ("b.json", "2")]);
        let mut sink = Recorder::default();

        e.handle_command(OP_DELETE_ALL, b"", &mut store, &mut sink).unwrap();
        assert_eq!(e.state(), SyncState::Idle);
        assert!(store.list().unwrap().is_empty());
        assert_eq!(sink.0, [Out::Complete]);

        store.storage_mut().write("sessions/c.json", b"3").unwrap();
        store.storage_mut().lock("sessions/c.json");
        assert_eq!(
            e.handle_command(OP_DELETE_ALL, b"", &mut store, &mut sink),
            Err(TransferError::DeleteAllFailed)
        );
        assert_eq!(e.state(), SyncState::Idle);
        assert_eq!(sink.0.last(), Some(&Out::Error("Delete all failed".into())));
    }

    #[test]
    fn oversized_session_is_refused() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 1);
        let big = "x".repeat(usize::from(MAX_TOTAL_CHUNKS) + 1);
        let mut store = store_with(&[("big.json", big.as_str())]);
        let mut sink = Recorder::default();

        e.handle_command(OP_SEND_BY_FILENAME, b"big.json", &mut store, &mut sink).unwrap();
        e.tick(&mut store, &mut sink);
        assert_eq!(e.state(), SyncState::Error);
        assert_eq!(e.last_error(), Some(&TransferError::TooLarge { chunks: 0xFFFE }));
    }

    /// Sink that refuses chunks from `fail_at` on
    struct Refusing {
        fail_at: u16,
        out: Vec<Out>,
    }

    impl SyncSink for Refusing {
        fn on_chunk(&mut self, payload: &[u8], index: u16, total: u16) -> Result<(), FrameError> {
            if index >= self.fail_at {
                return Err(FrameError::PayloadTooLarge { len: payload.len() });
            }
            self.out.push(Out::Chunk(payload.to_vec(), index, total));
            Ok(())
        }
        fn on_sync_complete(&mut self) {
            self.out.push(Out::Complete);
        }
        fn on_sync_error(&mut self, message: &str) {
            self.out.push(Out::Error(String::from(message)));
        }
    }

    #[test]
    fn refused_chunk_abandons_the_transfer() {
        let clock = MockTimeSource::new(0);
        let mut e = engine(&clock, 4);
        let mut store = store_with(&[("s.json", "0123456789")]);
        let mut sink = Refusing { fail_at: 1, out: Vec::new() };

        e.handle_command(OP_SEND_BY_FILENAME, b"s.json", &mut store, &mut sink).unwrap();
        for _ in 0..10 {
            clock.advance(50);
            e.tick(&mut store, &mut sink);
        }

        assert_eq!(e.state(), SyncState::Error);
        assert_eq!(e.loaded_len(), 0);
        assert!(matches!(e.last_error(), Some(TransferError::SendFailed { index: 1, .. })));
        assert_eq!(
            sink.out,
            [Out::Chunk(b"0123".to_vec(), 0, 3), Out::Error("Send failed".into())]
        );
    }

    #[test]
    fn chunk_size_is_clamped() {
        let clock = MockTimeSource::new(0);
        assert_eq!(engine(&clock, 600).chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(engine(&clock, 0).chunk_size(), 1);
        assert_eq!(engine(&clock, 240).chunk_size(), 240);
    }
}
