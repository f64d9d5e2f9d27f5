//! Wire-Level Identifiers
//!
//! Opcodes, sentinel values and numeric codes shared with the mobile
//! client. Changing any of these breaks deployed clients.

// ===== SYNC OPCODES =====

/// Stream the most recently written session.
pub const OP_SEND_LATEST: u8 = 0x01;

/// Stream the session named in the payload.
pub const OP_SEND_BY_FILENAME: u8 = 0x02;

/// Delete the session named in the payload.
pub const OP_DELETE_SESSION: u8 = 0x03;

/// Delete every stored session.
pub const OP_DELETE_ALL: u8 = 0x04;

// ===== CONTROL OPCODES =====

/// Control-characteristic write that starts a cycle.
pub const CTRL_TRIGGER: u8 = 0x01;

// ===== SENTINELS =====

/// Index/total value marking the completion sentinel.
pub const SENTINEL_COMPLETE: u16 = 0xFFFF;

/// Index/total value marking the error sentinel.
pub const SENTINEL_ERROR: u16 = 0xFFFE;

/// Largest chunk count a transfer may use without colliding with sentinels.
pub const MAX_TOTAL_CHUNKS: u16 = 0xFFFD;

// ===== ACQUISITION ERROR CODES =====

/// No error recorded.
pub const ERR_NONE: u8 = 0;

/// Sample buffer could not be allocated at boot.
pub const ERR_BUFFER_ALLOC: u8 = 1;

/// Phase A configuration rejected.
pub const ERR_CONFIG_A: u8 = 3;

/// Phase B configuration rejected.
pub const ERR_CONFIG_B: u8 = 5;

/// Phase C configuration rejected.
pub const ERR_CONFIG_C: u8 = 7;

/// Session could not be written.
pub const ERR_SAVE: u8 = 9;

// ===== SESSION FORMAT =====

/// Session document `version` field.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// Directory holding session files, relative to the storage root.
pub const SESSIONS_DIR: &str = "sessions";

/// Directory holding per-phase sensor configuration blobs.
pub const PHASE_CONFIG_DIR: &str = "config";

// ===== GATT LAYOUT =====

/// Primary service.
pub const SERVICE_UUID: &str = "12345678-1234-5678-1234-56789abc0001";

/// Control characteristic (write).
pub const CTRL_CHAR_UUID: &str = "12345678-1234-5678-1234-56789abc0002";

/// Status characteristic (read, notify).
pub const STATUS_CHAR_UUID: &str = "12345678-1234-5678-1234-56789abc0003";

/// Session list characteristic (read).
pub const SESSION_LIST_UUID: &str = "12345678-1234-5678-1234-56789abc0004";

/// Session data characteristic (read, notify).
pub const SESSION_DATA_UUID: &str = "12345678-1234-5678-1234-56789abc0005";

/// Sync control characteristic (write).
pub const SYNC_CTRL_UUID: &str = "12345678-1234-5678-1234-56789abc0006";

/// Default advertised device name and identity.
pub const DEFAULT_DEVICE_ID: &str = "XBIO-S3";
