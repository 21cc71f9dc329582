//! Tunable knobs for the membership protocol and placement encoding.
//! Workers and the master each load their own copy through their
//! `Config`; these are just the defaults used when no override is
//! present.

/// Worker → master heartbeat cadence.
pub const TO_MASTER_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// How long the master waits without a heartbeat before dropping a worker.
pub const WORKER_TIMEOUT_MS: u64 = 10_000;

/// Consecutive heartbeat-send failures before the worker exits and relies
/// on process-manager restart, per spec section 7.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

/// How long a worker-local user's temp folders survive without a
/// `userHeartbeat`.
pub const USER_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on `RawTable` column count.
pub const MAX_COLUMNS: u32 = 1024;

/// Divisor/multiplier pair used by the historical worker-id encoding in
/// section 4.3: `rv % WORKER_ID_MODULUS` is the real worker-id, `rv /
/// WORKER_ID_TIME_SCALE` is the master's start time in milliseconds.
pub const WORKER_ID_MODULUS: i64 = 100_000;
pub const WORKER_ID_TIME_SCALE: i64 = 1_000_000;
