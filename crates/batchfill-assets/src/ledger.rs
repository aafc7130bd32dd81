//! The asset ledger — balances, allowances, and permit redemption.
//!
//! Balances and allowances live in flat maps; absent entries read as zero.
//! Permit support is a per-asset capability flag set at registration, so
//! `supports_permit` is a cheap probe that reports `false` for unknown
//! assets instead of failing.

use std::collections::HashMap;

use batchfill_types::{
    AccountId, AssetId, AssetTransfer, BatchfillError, PermitAuthority, PermitAuthorization,
    Result,
};
use chrono::Utc;
use rust_decimal::Decimal;

/// Per-asset registration data.
#[derive(Debug, Clone)]
struct AssetInfo {
    permit_enabled: bool,
}

/// In-memory ledger for every registered asset.
#[derive(Debug, Default)]
pub struct AssetLedger {
    assets: HashMap<AssetId, AssetInfo>,
    balances: HashMap<(AssetId, AccountId), Decimal>,
    allowances: HashMap<(AssetId, AccountId, AccountId), Decimal>,
    /// Permit nonces per (asset, owner). Consumed on redemption.
    nonces: HashMap<(AssetId, AccountId), u64>,
}

impl AssetLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset, declaring whether it exposes a permit surface.
    pub fn register_asset(&mut self, asset: AssetId, permit_enabled: bool) {
        self.assets.insert(asset, AssetInfo { permit_enabled });
    }

    /// Create `amount` of a registered asset in `to`'s balance.
    ///
    /// # Errors
    /// Returns [`BatchfillError::UnknownAsset`] if the asset was never
    /// registered.
    pub fn mint(&mut self, asset: &AssetId, to: AccountId, amount: Decimal) -> Result<()> {
        if !self.assets.contains_key(asset) {
            return Err(BatchfillError::UnknownAsset(asset.clone()));
        }
        *self
            .balances
            .entry((asset.clone(), to))
            .or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    fn debit(&mut self, asset: &AssetId, from: AccountId, amount: Decimal) -> Result<()> {
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(BatchfillError::InsufficientBalance {
                asset: asset.clone(),
                needed: amount,
                available,
            });
        }
        self.balances.insert((asset.clone(), from), available - amount);
        Ok(())
    }

    fn credit(&mut self, asset: &AssetId, to: AccountId, amount: Decimal) {
        *self
            .balances
            .entry((asset.clone(), to))
            .or_insert(Decimal::ZERO) += amount;
    }
}

impl AssetTransfer for AssetLedger {
    fn balance_of(&self, asset: &AssetId, who: AccountId) -> Decimal {
        self.balances
            .get(&(asset.clone(), who))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn allowance(&self, asset: &AssetId, owner: AccountId, spender: AccountId) -> Decimal {
        self.allowances
            .get(&(asset.clone(), owner, spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn approve(
        &mut self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        value: Decimal,
    ) -> Result<()> {
        self.allowances.insert((asset.clone(), owner, spender), value);
        Ok(())
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount);
        Ok(())
    }

    fn pull(
        &mut self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            return Err(BatchfillError::InsufficientAllowance {
                asset: asset.clone(),
                needed: amount,
                available: allowed,
            });
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount);
        self.allowances
            .insert((asset.clone(), from, spender), allowed - amount);
        Ok(())
    }
}

impl PermitAuthority for AssetLedger {
    fn supports_permit(&self, asset: &AssetId) -> bool {
        // Unknown asset is an inconclusive probe, not an error.
        self.assets
            .get(asset)
            .is_some_and(|info| info.permit_enabled)
    }

    fn permit_nonce(&self, asset: &AssetId, holder: AccountId) -> Result<u64> {
        if !self.supports_permit(asset) {
            return Err(BatchfillError::PermitNotSupported(asset.clone()));
        }
        Ok(self
            .nonces
            .get(&(asset.clone(), holder))
            .copied()
            .unwrap_or(0))
    }

    fn redeem_permit(&mut self, asset: &AssetId, permit: &PermitAuthorization) -> Result<()> {
        let nonce = self.permit_nonce(asset, permit.owner)?;
        permit.verify(asset, nonce, Utc::now())?;

        self.nonces.insert((asset.clone(), permit.owner), nonce + 1);
        self.allowances.insert(
            (asset.clone(), permit.owner, permit.spender),
            permit.value,
        );
        tracing::debug!(
            asset = %asset,
            owner = %permit.owner,
            spender = %permit.spender,
            value = %permit.value,
            nonce,
            "permit redeemed"
        );
        Ok(())
    }
}
