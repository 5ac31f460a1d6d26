//! Timestamp sentinels and tick arithmetic
//!
//! All event times are `i64` ticks. A handful of values at the extremes of the
//! range are reserved as sentinels so that control rows can share the
//! `other_time` column with ordinary events.

/// End time of a start edge whose lifetime is unbounded
pub const INFINITY_SYNC_TIME: i64 = i64::MAX;

/// Largest time an event may legitimately start or end at
pub const MAX_SYNC_TIME: i64 = i64::MAX - 1;

/// Smallest time an event may legitimately start at
pub const MIN_SYNC_TIME: i64 = i64::MIN + 2;

/// `other_time` carried by a punctuation row
pub const PUNCTUATION_OTHER_TIME: i64 = i64::MIN;

/// `other_time` carried by a low-watermark row
pub const LOW_WATERMARK_OTHER_TIME: i64 = i64::MIN + 1;

/// Compute `start + duration`, treating an infinite duration as unbounded.
///
/// Returns `None` when the end would land past [`MAX_SYNC_TIME`].
pub fn checked_end_time(start: i64, duration: i64) -> Option<i64> {
    if duration == INFINITY_SYNC_TIME {
        return Some(INFINITY_SYNC_TIME);
    }
    match start.checked_add(duration) {
        Some(end) if end <= MAX_SYNC_TIME => Some(end),
        _ => None,
    }
}

/// Floor division that rounds towards negative infinity.
///
/// # Panics
///
/// Panics if `divisor` is not positive.
pub fn floor_div(dividend: i64, divisor: i64) -> i64 {
    assert!(divisor > 0, "divisor must be positive");
    dividend.div_euclid(divisor)
}

/// Ceiling division that rounds towards positive infinity.
///
/// # Panics
///
/// Panics if `divisor` is not positive.
pub fn ceil_div(dividend: i64, divisor: i64) -> i64 {
    let q = floor_div(dividend, divisor);
    if q * divisor == dividend {
        q
    } else {
        q + 1
    }
}

/// True for the two control sentinels that can appear in `other_time`
pub fn is_control_other_time(other_time: i64) -> bool {
    other_time == PUNCTUATION_OTHER_TIME || other_time == LOW_WATERMARK_OTHER_TIME
}
