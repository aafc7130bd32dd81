//! Error types for the BatchFill settlement engine.
//!
//! All errors use the `BF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Batch validation errors
//! - 2xx: Permit errors
//! - 3xx: Settlement protocol errors
//! - 4xx: Asset ledger errors
//! - 9xx: General / internal errors
//!
//! Every error aborts the entire batch it occurred in; there is no
//! partial-success path. The 3xx/4xx groups are raised by the external
//! collaborators and propagated through the engine unmodified.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AssetId, OrderHash};

/// Central error enum for all BatchFill operations.
#[derive(Debug, Error)]
pub enum BatchfillError {
    // =================================================================
    // Batch Validation Errors (1xx)
    // =================================================================
    /// A batch must contain at least one fill request.
    #[error("BF_ERR_100: Empty batch")]
    EmptyBatch,

    /// All fill requests in a batch must share one taker asset.
    #[error("BF_ERR_101: Inconsistent taker asset at index {index}: expected {expected}, found {found}")]
    InconsistentTakerAsset {
        index: usize,
        expected: AssetId,
        found: AssetId,
    },

    /// A slot's actual taking amount exceeded its per-order cap.
    #[error("BF_ERR_102: Taking cap exceeded at index {index}: taking {taking} > cap {cap}")]
    CapExceeded {
        index: usize,
        taking: Decimal,
        cap: Decimal,
    },

    /// A fill request carried an expiry at or before the current time.
    #[error("BF_ERR_103: Expired order at index {index}")]
    ExpiredOrder { index: usize },

    // =================================================================
    // Permit Errors (2xx)
    // =================================================================
    /// The asset exposes no signature-based authorization surface.
    #[error("BF_ERR_200: Permit not supported by asset {0}")]
    PermitNotSupported(AssetId),

    /// The permit could not be redeemed (bad signature, expired deadline,
    /// nonce mismatch).
    #[error("BF_ERR_201: Permit redemption failed: {reason}")]
    PermitRedemptionFailed { reason: String },

    // =================================================================
    // Settlement Protocol Errors (3xx)
    // =================================================================
    /// The maker signature didn't verify against the order hash.
    #[error("BF_ERR_300: Invalid order signature for {0}")]
    InvalidOrderSignature(OrderHash),

    /// The order was cancelled by its maker.
    #[error("BF_ERR_301: Order cancelled: {0}")]
    OrderCancelled(OrderHash),

    /// The settlement protocol is paused.
    #[error("BF_ERR_302: Settlement protocol is paused")]
    ProtocolPaused,

    /// The order forbids partial fills and the requested fill is partial.
    #[error("BF_ERR_303: Partial fill disallowed for {0}")]
    PartialFillDisallowed(OrderHash),

    /// The order failed structural validation (bad amounts, bad caller, etc.).
    #[error("BF_ERR_304: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The order has no remaining making amount to fill.
    #[error("BF_ERR_305: Order fully filled: {0}")]
    OrderFullyFilled(OrderHash),

    // =================================================================
    // Asset Ledger Errors (4xx)
    // =================================================================
    /// Not enough balance to perform the transfer.
    #[error("BF_ERR_400: Insufficient balance of {asset}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: AssetId,
        needed: Decimal,
        available: Decimal,
    },

    /// Not enough allowance to perform the pull.
    #[error("BF_ERR_401: Insufficient allowance of {asset}: need {needed}, have {available}")]
    InsufficientAllowance {
        asset: AssetId,
        needed: Decimal,
        available: Decimal,
    },

    /// The asset is not registered with the ledger.
    #[error("BF_ERR_402: Unknown asset: {0}")]
    UnknownAsset(AssetId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("BF_ERR_900: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BatchfillError>;
