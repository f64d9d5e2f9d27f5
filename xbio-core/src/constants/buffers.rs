//! Buffer Sizes and Memory Constraints
//!
//! Sizes for the once-allocated sample buffer and the fixed-size inline
//! strings and frames used on the radio link.

// ===== SAMPLE BUFFER =====

/// Default number of samples held for one acquisition cycle.
///
/// Sized for an ESP32-S3 with PSRAM:
/// - 5000 samples × ~40 bytes/sample = ~200KB
/// - One full A/B/C cycle at 200 ms is 250 samples, leaving headroom
///   for faster producers
pub const DEFAULT_SAMPLE_CAPACITY: usize = 5000;

// ===== RADIO FRAMES =====

/// Default session-data payload bytes per chunk.
///
/// 240 payload + 4 header bytes fits a single notification at the
/// common 247-byte ATT MTU.
pub const DEFAULT_CHUNK_SIZE: usize = 240;

/// Largest chunk payload accepted by the framing code.
pub const MAX_CHUNK_SIZE: usize = 512;

/// Chunk header: 2-byte index + 2-byte total, both big-endian.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest frame the transport adapter ever builds.
pub const MAX_FRAME_LEN: usize = FRAME_HEADER_LEN + MAX_CHUNK_SIZE;

/// Status notification record: state, sample count (low byte), last error.
pub const STATUS_RECORD_LEN: usize = 3;

// ===== INLINE STRINGS =====

/// Maximum device identity length.
pub const MAX_DEVICE_ID_LEN: usize = 32;

/// Maximum session filename length (bare name, no directory).
pub const MAX_SESSION_NAME_LEN: usize = 64;

/// Maximum stored sync error message length.
pub const MAX_ERROR_MESSAGE_LEN: usize = 48;

// ===== QUEUES =====

/// Backing size of the inbound command queue.
///
/// `heapless::spsc::Queue` keeps one slot free, so this holds
/// `INBOUND_QUEUE_SIZE - 1` pending messages.
pub const INBOUND_QUEUE_SIZE: usize = 8;

/// Largest sync-command payload kept from an inbound write.
///
/// One byte over the longest session name, so an over-long name still
/// fails validation instead of being silently shortened.
pub const MAX_COMMAND_PAYLOAD: usize = MAX_SESSION_NAME_LEN + 1;
