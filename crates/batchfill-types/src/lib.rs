//! # batchfill-types
//!
//! Shared types, collaborator traits, and configuration for the **BatchFill**
//! batch settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`AssetId`], [`OrderHash`], [`BatchId`]
//! - **Order model**: [`Order`], [`MakerTraits`], [`OrderSignature`]
//! - **Fill model**: [`FillRequest`], [`FillMode`], [`FillOutcome`],
//!   [`OrderFillRecord`], [`BatchResult`], [`BatchValidation`]
//! - **Permit model**: [`PermitAuthorization`]
//! - **Collaborator traits**: [`AssetTransfer`], [`PermitAuthority`],
//!   [`SettlementProtocol`]
//! - **Errors**: [`BatchfillError`] with `BF_ERR_` prefix codes
//! - **Constants**: domain-separation tags

pub mod constants;
pub mod error;
pub mod fill;
pub mod ids;
pub mod order;
pub mod permit;
pub mod traits;

// Re-export all primary types at crate root for ergonomic imports:
//   use batchfill_types::{Order, FillRequest, BatchResult, ...};

pub use error::*;
pub use fill::*;
pub use ids::*;
pub use order::*;
pub use permit::*;
pub use traits::*;

// Constants are accessed via `batchfill_types::constants::FOO`
// (not re-exported to avoid name collisions).
