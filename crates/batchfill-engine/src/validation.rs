//! Cross-order pre-flight checks.
//!
//! Pure functions over the request slice, shared by the engines' fill paths
//! and the read-only `validate_*` surface. None of these touch balances.

use batchfill_types::{BatchValidation, FillRequest};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Whether a deadline has passed at `now`. `None` never expires; a deadline
/// exactly at `now` counts as expired.
#[must_use]
pub fn is_expired_at(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiry.is_some_and(|deadline| deadline <= now)
}

/// Element-wise expiry flags at `now`, in request-array order.
#[must_use]
pub fn validate_orders_expiry_at(requests: &[FillRequest], now: DateTime<Utc>) -> Vec<bool> {
    requests
        .iter()
        .map(|req| is_expired_at(req.expiry, now))
        .collect()
}

/// Index of the first request whose taker asset differs from element 0's,
/// if any. An empty slice is vacuously consistent.
#[must_use]
pub fn first_taker_asset_mismatch(requests: &[FillRequest]) -> Option<usize> {
    let first = &requests.first()?.order.taker_asset;
    requests
        .iter()
        .position(|req| req.order.taker_asset != *first)
        .filter(|&index| index > 0)
}

/// Σ `max_taking_amount` — the upfront pull a fill would make.
#[must_use]
pub fn total_max_taking(requests: &[FillRequest]) -> Decimal {
    requests.iter().map(|req| req.max_taking_amount).sum()
}

/// Full read-only pre-flight at `now`. Reports conditions rather than
/// raising; an empty batch yields an empty flag vector (not fillable).
#[must_use]
pub fn validate_batch_orders_at(requests: &[FillRequest], now: DateTime<Utc>) -> BatchValidation {
    BatchValidation {
        expired: validate_orders_expiry_at(requests, now),
        consistent_taker_asset: first_taker_asset_mismatch(requests).is_none(),
        total_max_taking: total_max_taking(requests),
    }
}
