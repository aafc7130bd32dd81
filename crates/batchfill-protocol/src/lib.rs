//! # batchfill-protocol
//!
//! Reference implementation of the external order-settlement service the
//! batch engine binds to. [`OrderSettler`] verifies maker signatures,
//! tracks per-order remaining amounts across calls, enforces maker traits
//! (partial/multiple fills), and supports maker cancellation and a pause
//! switch.
//!
//! The engine sees only the [`batchfill_types::SettlementProtocol`] trait;
//! this crate is the concrete collaborator used by integration tests and
//! host applications.

pub mod settler;

pub use settler::{OrderSettler, SettlerSnapshot};
