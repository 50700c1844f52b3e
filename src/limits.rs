use crate::model::Ms;

const HOUR_MS: Ms = 3_600_000;
const DAY_MS: Ms = 24 * HOUR_MS;

pub const MAX_FACILITIES: usize = 10_000;
pub const MAX_SLOTS_PER_FACILITY: usize = 10_000;
/// Committed (live) intervals per slot; released intervals do not count.
pub const MAX_INTERVALS_PER_SLOT: usize = 100_000;

/// Upper bound on a class's hourly rate, in whole currency units.
pub const MAX_HOURLY_RATE: i64 = 1_000_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_REQUESTER_LEN: usize = 256;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

pub const MAX_WINDOW_DURATION_MS: Ms = 366 * DAY_MS;
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * DAY_MS;

/// Longest request line the service accepts before dropping the connection.
pub const MAX_LINE_LEN: usize = 64 * 1024;
