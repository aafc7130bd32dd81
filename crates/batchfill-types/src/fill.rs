//! Fill model: one batch slot in, per-order and aggregate records out.
//!
//! A [`FillRequest`] has no identity beyond one `fill_batch` call. The
//! [`BatchResult`] carries both the aggregate record and the per-order
//! records in request-array order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetId, BatchId, Order, OrderHash, OrderSignature};

/// How a request's `amount` is interpreted by the settlement protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillMode {
    /// `amount` is a making-amount target; taking is charged proportionally.
    MakingAmount,
    /// `amount` is a taking-amount target; making is granted proportionally.
    TakingAmount,
}

impl std::fmt::Display for FillMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MakingAmount => write!(f, "MAKING_AMOUNT"),
            Self::TakingAmount => write!(f, "TAKING_AMOUNT"),
        }
    }
}

/// One batch slot: a signed order plus the taker's execution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRequest {
    pub order: Order,
    pub signature: OrderSignature,
    /// Making- or taking-amount target, per `fill_mode`.
    pub amount: Decimal,
    pub fill_mode: FillMode,
    /// The taker's ceiling for this slot; exceeding it aborts the batch.
    pub max_taking_amount: Decimal,
    /// Request deadline; `None` never expires.
    pub expiry: Option<DateTime<Utc>>,
}

/// Actual amounts one settlement call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub making: Decimal,
    pub taking: Decimal,
}

/// Per-order record, emitted in request-array order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFillRecord {
    pub index: usize,
    pub order: OrderHash,
    pub making: Decimal,
    pub taking: Decimal,
}

/// Aggregate outcome of one batch: the aggregate record plus per-order
/// records. Emitted only after every per-order settlement succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub caller: AccountId,
    pub receiver: AccountId,
    pub taker_asset: AssetId,
    pub fills: Vec<OrderFillRecord>,
    pub orders_filled: usize,
    pub total_making: Decimal,
    pub total_taking: Decimal,
    /// Unspent taker asset returned to the caller: Σ caps − total taking.
    pub refund: Decimal,
}

impl BatchResult {
    /// Actual making amounts in request-array order.
    #[must_use]
    pub fn per_order_making(&self) -> Vec<Decimal> {
        self.fills.iter().map(|f| f.making).collect()
    }

    /// Actual taking amounts in request-array order.
    #[must_use]
    pub fn per_order_taking(&self) -> Vec<Decimal> {
        self.fills.iter().map(|f| f.taking).collect()
    }
}

/// Read-only pre-flight result for a batch. Never raises for business
/// conditions; callers inspect it before committing funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchValidation {
    /// Element-wise expiry flags, same length as the input.
    pub expired: Vec<bool>,
    /// Whether every request shares the first element's taker asset.
    pub consistent_taker_asset: bool,
    /// Σ `max_taking_amount` — what a fill would pull up front.
    pub total_max_taking: Decimal,
}

impl BatchValidation {
    /// Whether a fill attempt could proceed past pre-flight.
    #[must_use]
    pub fn is_fillable(&self) -> bool {
        self.consistent_taker_asset && !self.expired.iter().any(|e| *e) && !self.expired.is_empty()
    }
}
