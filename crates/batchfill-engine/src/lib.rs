//! # batchfill-engine
//!
//! Atomic batch settlement: one caller executes many signed orders against
//! one settlement protocol in a single all-or-nothing operation.
//!
//! [`BatchFillEngine`] is the core path — upfront worst-case pull, per-slot
//! settlement with taking caps, proceeds forwarding, refund of the unspent
//! remainder. [`PermitBatchFillEngine`] layers per-request expiry gating,
//! read-only batch validation, and permit redemption on top. Both run every
//! mutation through [`staging::StagedTransfers`], so a failure at any slot
//! leaves the ledger untouched.

pub mod engine;
pub mod permit_engine;
pub mod staging;
pub mod validation;

pub use engine::BatchFillEngine;
pub use permit_engine::PermitBatchFillEngine;
pub use staging::StagedTransfers;
