pub const DEFAULT_TIME_LIMIT_MS: u64 = 2000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 12_000;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Prefix of every per-submission working directory.
pub const WORKSPACE_PREFIX: &str = "sub-";

pub const DEFAULT_JOBS: usize = 4;
