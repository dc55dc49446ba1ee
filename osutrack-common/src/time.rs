//! Tick timestamp utilities
//!
//! osu! stores timestamps as .NET ticks: 100-nanosecond intervals since
//! 0001-01-01T00:00:00Z.

use chrono::{DateTime, Utc};

/// Ticks per second (100 ns resolution)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Tick count of 1970-01-01T00:00:00Z
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Convert a raw tick count to a UTC timestamp
///
/// Zero and values outside chrono's representable range map to `None`.
pub fn ticks_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let ticks = i64::try_from(ticks).ok()?;
    let since_unix = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_unix.div_euclid(TICKS_PER_SECOND);
    let nanos = since_unix.rem_euclid(TICKS_PER_SECOND) * 100;
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Convert a UTC timestamp back to ticks (0 for pre-epoch-of-ticks values)
pub fn datetime_to_ticks(timestamp: &DateTime<Utc>) -> u64 {
    let secs = timestamp.timestamp();
    let sub_ticks = i64::from(timestamp.timestamp_subsec_nanos() / 100);
    secs.checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(sub_ticks))
        .and_then(|t| t.checked_add(UNIX_EPOCH_TICKS))
        .and_then(|t| u64::try_from(t).ok())
        .unwrap_or(0)
}
