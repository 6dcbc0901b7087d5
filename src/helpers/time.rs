use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::utils::constants::RENEWAL_FRACTION;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `issued_at + RENEWAL_FRACTION * (expires_at - issued_at)`.
///
/// A token that is already expired at issue time yields `issued_at`.
pub fn renewal_deadline(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> DateTime<Utc> {
    let validity_ms = (expires_at - issued_at).num_milliseconds().max(0);
    let renew_after_ms = (validity_ms as f64 * RENEWAL_FRACTION) as i64;
    issued_at + TimeDelta::milliseconds(renew_after_ms)
}

/// Earliest of two optional deadlines; `None` stands for "no deadline".
pub fn earliest(
    left: Option<DateTime<Utc>>,
    right: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.min(r)),
        (l, r) => l.or(r),
    }
}

/// Delay from `now` until `fire_at`, never shorter than `min_delay`.
pub fn delay_until(fire_at: DateTime<Utc>, now: DateTime<Utc>, min_delay: Duration) -> Duration {
    (fire_at - now)
        .to_std()
        .ok()
        .filter(|delay| *delay >= min_delay)
        .unwrap_or(min_delay)
}

pub fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
