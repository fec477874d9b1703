use crate::{CoreError, CoreResult};

/// Fare for `seat_count` seats at the per-seat fare in effect right now.
pub fn total_fare(fare_cents: i64, seat_count: usize) -> CoreResult<i64> {
    i64::try_from(seat_count)
        .ok()
        .and_then(|n| fare_cents.checked_mul(n))
        .ok_or_else(|| CoreError::ValidationError("fare total out of range".to_string()))
}

/// Renders minor units as `$12.50`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
