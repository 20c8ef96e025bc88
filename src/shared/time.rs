use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// `at + by`。表現できない日時になる場合は InvalidInput
pub fn checked_after(at: DateTime<Utc>, by: Duration, what: &str) -> Result<DateTime<Utc>, AppError> {
    to_delta(by, what).and_then(|delta| {
        at.checked_add_signed(delta)
            .ok_or_else(|| AppError::InvalidInput(format!("{what} is out of range")))
    })
}

/// `at - by`。表現できない日時になる場合は InvalidInput
pub fn checked_before(at: DateTime<Utc>, by: Duration, what: &str) -> Result<DateTime<Utc>, AppError> {
    to_delta(by, what).and_then(|delta| {
        at.checked_sub_signed(delta)
            .ok_or_else(|| AppError::InvalidInput(format!("{what} is out of range")))
    })
}

fn to_delta(by: Duration, what: &str) -> Result<chrono::Duration, AppError> {
    chrono::Duration::from_std(by).map_err(|e| AppError::InvalidInput(format!("Invalid {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_within_range() {
        let now = Utc::now();
        let later = checked_after(now, Duration::from_secs(90), "ttl").unwrap();
        assert_eq!((later - now).num_seconds(), 90);
        let earlier = checked_before(now, Duration::from_secs(60), "retention").unwrap();
        assert_eq!((now - earlier).num_seconds(), 60);
    }

    #[test]
    fn overflow_is_an_error() {
        let now = Utc::now();
        let err = checked_after(now, Duration::from_secs(u64::MAX / 2000), "Cache ttl").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let days = Duration::from_secs(u64::from(u32::MAX) * 24 * 60 * 60);
        assert!(matches!(
            checked_before(now, days, "Retention"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(checked_after(now, Duration::MAX, "Delay").is_err());
    }
}
