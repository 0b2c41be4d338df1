use chrono::{DateTime, Utc};

/// Wall-clock time in fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    epoch_secs(Utc::now())
}

/// `t` as fractional seconds since the Unix epoch, microsecond precision.
pub fn epoch_secs(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_micros()) / 1_000_000.0
}
