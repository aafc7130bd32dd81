//! Collaborator traits: the seams between the engine and its external
//! services.
//!
//! The engine is a pure orchestration layer; everything that holds balances
//! or verifies maker signatures sits behind one of these traits. The asset
//! traits are object-safe — the engine hands the settlement protocol a
//! `&mut dyn AssetTransfer` so the same protocol code runs against a live
//! ledger or a staged overlay.

use rust_decimal::Decimal;

use crate::{
    AccountId, AssetId, FillMode, FillOutcome, Order, OrderSignature, PermitAuthorization, Result,
};

/// Balance and allowance surface of the resource assets.
///
/// `transfer` moves an account's own funds; `pull` is allowance-mediated
/// (the `spender` must hold an allowance from `from`). Reads never fail:
/// absent entries are zero.
pub trait AssetTransfer {
    fn balance_of(&self, asset: &AssetId, who: AccountId) -> Decimal;

    fn allowance(&self, asset: &AssetId, owner: AccountId, spender: AccountId) -> Decimal;

    /// Set (not increase) `spender`'s allowance from `owner`.
    fn approve(
        &mut self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        value: Decimal,
    ) -> Result<()>;

    /// Move `amount` of `from`'s own funds to `to`.
    ///
    /// # Errors
    /// [`crate::BatchfillError::InsufficientBalance`] if `from` lacks funds.
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// `spender`'s allowance.
    ///
    /// # Errors
    /// [`crate::BatchfillError::InsufficientAllowance`] or
    /// [`crate::BatchfillError::InsufficientBalance`].
    fn pull(
        &mut self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()>;
}

/// Optional signature-based authorization surface of an asset.
///
/// Support is a per-asset capability, probed at runtime — not a type-level
/// property. An inconclusive probe reports `false` rather than failing.
pub trait PermitAuthority {
    /// Whether the asset exposes a permit surface.
    fn supports_permit(&self, asset: &AssetId) -> bool;

    /// The owner's current permit nonce.
    ///
    /// # Errors
    /// [`crate::BatchfillError::PermitNotSupported`] if the asset has no
    /// permit surface.
    fn permit_nonce(&self, asset: &AssetId, holder: AccountId) -> Result<u64>;

    /// Verify the permit and establish the allowance, consuming the nonce.
    ///
    /// # Errors
    /// [`crate::BatchfillError::PermitNotSupported`] or
    /// [`crate::BatchfillError::PermitRedemptionFailed`].
    fn redeem_permit(&mut self, asset: &AssetId, permit: &PermitAuthorization) -> Result<()>;
}

/// The external order-settlement service: verifies one signed order and
/// exchanges maker asset for taker asset.
pub trait SettlementProtocol {
    /// Opaque copy of the protocol's fill-accounting state.
    type Snapshot;

    /// The protocol's immutable identity; order hashes bind to it.
    fn id(&self) -> AccountId;

    /// Capture the fill-accounting state as of now.
    fn snapshot(&self) -> Self::Snapshot;

    /// Put fill accounting back to a captured snapshot. Callers that stage
    /// transfers use this to discard protocol-side progress when a
    /// multi-order operation aborts — settled slots must not count against
    /// an order's remaining amount when their transfers were never applied.
    fn restore(&mut self, snapshot: Self::Snapshot);

    /// Settle one order for `taker`, interpreting `amount` per `mode`.
    /// Moves maker asset maker→taker and taker asset taker→maker (or the
    /// order's receiver override) on `assets`, and returns the actual
    /// amounts moved.
    ///
    /// # Errors
    /// Protocol-level failures (3xx) and ledger failures (4xx), which the
    /// engine propagates unmodified.
    fn fill(
        &mut self,
        assets: &mut dyn AssetTransfer,
        taker: AccountId,
        order: &Order,
        signature: &OrderSignature,
        amount: Decimal,
        mode: FillMode,
    ) -> Result<FillOutcome>;
}
