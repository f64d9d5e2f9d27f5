//! Time-Related Constants
//!
//! All values are milliseconds on the monotonic counter unless noted.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u32 = 1000;

// ===== ACQUISITION PHASES =====

/// Measurement window for phase A.
pub const PHASE_A_DURATION_MS: u32 = 20 * MS_PER_SECOND;

/// Measurement window for phase B.
///
/// Shorter than A and C: the B heater profile settles faster.
pub const PHASE_B_DURATION_MS: u32 = 10 * MS_PER_SECOND;

/// Measurement window for phase C.
pub const PHASE_C_DURATION_MS: u32 = 20 * MS_PER_SECOND;

/// Minimum spacing between two sample-producer invocations.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 200;

// ===== SYNC PACING =====

/// Minimum spacing between two session-data notifications.
pub const DEFAULT_CHUNK_INTERVAL_MS: u32 = 50;

// ===== HOST LOOP =====

/// Sleep between two cooperative ticks in the host runner.
pub const HOST_TICK_INTERVAL_MS: u64 = 5;
