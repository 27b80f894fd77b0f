//! Compile-time defaults for `RuntimeConfig`

/// Abort the pump cycle on the first sink fault.
pub const FAILURE_ISOLATION: bool = false;

/// Reject nested or concurrent pumps on one pipe.
pub const REENTRANCY_GUARD: bool = true;

/// Marker file whose presence means "already running under the service".
pub const APP_ID_FILE: &str = "hostlink_appid.txt";

/// Scratch bytes each thread may keep after a release.
pub const SCRATCH_RETAIN_BYTES: usize = 0;

/// Contained faults kept for `take_faults` before the oldest are evicted.
pub const FAULT_CAPACITY: usize = 256;

/// Upper bound accepted for `scratch_retain_bytes`.
pub const MAX_SCRATCH_RETAIN_BYTES: usize = 16 * 1024 * 1024;
