/// Seconds since the Unix epoch as a float - the wire representation used
/// for `triggered_at` and trigger cursors.
pub fn epoch_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
