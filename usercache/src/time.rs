//! Time conversions.
//!
//! Modification and creation times cross process boundaries as integer
//! epoch milliseconds; recency inside a running process uses `Instant`.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Convert a `SystemTime` to an `Instant`.
///
/// This is approximate since `Instant` has no fixed epoch: the elapsed time
/// since `system_time` is subtracted from the current `Instant`. Returns
/// `None` if that would underflow. Future times map to now.
pub fn system_time_to_instant(system_time: SystemTime) -> Option<Instant> {
    let now_system = SystemTime::now();
    let now_instant = Instant::now();

    match now_system.duration_since(system_time) {
        Ok(elapsed) => now_instant.checked_sub(elapsed),
        Err(_) => Some(now_instant),
    }
}

/// Milliseconds since the Unix epoch. Times before the epoch are negative.
pub fn to_epoch_ms(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// Inverse of [`to_epoch_ms`].
pub fn from_epoch_ms(ms: i64) -> SystemTime {
    if ms >= 0 {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis(ms.unsigned_abs())
    }
}

/// Modification time of a file in epoch milliseconds.
pub fn file_mtime_ms(path: &std::path::Path) -> std::io::Result<i64> {
    Ok(to_epoch_ms(std::fs::metadata(path)?.modified()?))
}
