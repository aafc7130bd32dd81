//! # batchfill-assets
//!
//! In-memory reference implementation of the external asset surface the
//! batch engine settles against: per-(asset, account) balances, standard
//! allowance semantics, and an optional per-asset permit authority that
//! redeems signed authorizations into allowances.
//!
//! The engine itself never depends on this crate — it sees only the
//! [`batchfill_types::AssetTransfer`] and [`batchfill_types::PermitAuthority`]
//! traits. This crate is the concrete collaborator used by integration
//! tests and host applications.

pub mod ledger;

pub use ledger::AssetLedger;
