//! Staged transfers — the engine's all-or-nothing execution context.
//!
//! The host environment offers no transactional primitive, so the engine
//! emulates one: every mutation during a batch lands in a copy-on-touch
//! overlay plus an append-only journal, and the base ledger is written only
//! when [`StagedTransfers::commit`] replays the journal after every
//! invariant held. Dropping the stage discards it — external balances are
//! untouched on any failure.
//!
//! The overlay is scoped strictly to one call; it is never engine state.

use std::collections::HashMap;

use batchfill_types::{
    AccountId, AssetId, AssetTransfer, BatchfillError, PermitAuthority, PermitAuthorization,
    Result,
};
use chrono::Utc;
use rust_decimal::Decimal;

/// One journaled mutation, replayed against the base ledger on commit.
#[derive(Debug, Clone)]
enum LedgerOp {
    Transfer {
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    Pull {
        asset: AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    Approve {
        asset: AssetId,
        owner: AccountId,
        spender: AccountId,
        value: Decimal,
    },
    Redeem {
        asset: AssetId,
        permit: PermitAuthorization,
    },
}

/// A staged view over a base ledger. Implements the same collaborator
/// traits as the base, so the settlement protocol runs against it
/// unchanged.
pub struct StagedTransfers<'a, L: AssetTransfer + PermitAuthority> {
    base: &'a mut L,
    balances: HashMap<(AssetId, AccountId), Decimal>,
    allowances: HashMap<(AssetId, AccountId, AccountId), Decimal>,
    nonces: HashMap<(AssetId, AccountId), u64>,
    journal: Vec<LedgerOp>,
}

impl<'a, L: AssetTransfer + PermitAuthority> StagedTransfers<'a, L> {
    pub fn new(base: &'a mut L) -> Self {
        Self {
            base,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            nonces: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// Number of journaled mutations so far.
    #[must_use]
    pub fn staged_ops(&self) -> usize {
        self.journal.len()
    }

    /// Apply every journaled mutation to the base ledger, in order.
    ///
    /// Replay runs against the same state the staging validated, so it
    /// cannot fail; a divergence is reported as [`BatchfillError::Internal`].
    pub fn commit(self) -> Result<()> {
        for op in self.journal {
            let applied = match op {
                LedgerOp::Transfer {
                    ref asset,
                    from,
                    to,
                    amount,
                } => self.base.transfer(asset, from, to, amount),
                LedgerOp::Pull {
                    ref asset,
                    spender,
                    from,
                    to,
                    amount,
                } => self.base.pull(asset, spender, from, to, amount),
                LedgerOp::Approve {
                    ref asset,
                    owner,
                    spender,
                    value,
                } => self.base.approve(asset, owner, spender, value),
                LedgerOp::Redeem { ref asset, ref permit } => {
                    self.base.redeem_permit(asset, permit)
                }
            };
            applied.map_err(|err| {
                BatchfillError::Internal(format!("staged commit diverged from validation: {err}"))
            })?;
        }
        Ok(())
    }

    fn staged_balance(&self, asset: &AssetId, who: AccountId) -> Decimal {
        self.balances
            .get(&(asset.clone(), who))
            .copied()
            .unwrap_or_else(|| self.base.balance_of(asset, who))
    }

    fn debit(&mut self, asset: &AssetId, from: AccountId, amount: Decimal) -> Result<()> {
        let available = self.staged_balance(asset, from);
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
        let balance = self.staged_balance(asset, to);
        self.balances.insert((asset.clone(), to), balance + amount);
    }
}

impl<L: AssetTransfer + PermitAuthority> AssetTransfer for StagedTransfers<'_, L> {
    fn balance_of(&self, asset: &AssetId, who: AccountId) -> Decimal {
        self.staged_balance(asset, who)
    }

    fn allowance(&self, asset: &AssetId, owner: AccountId, spender: AccountId) -> Decimal {
        self.allowances
            .get(&(asset.clone(), owner, spender))
            .copied()
            .unwrap_or_else(|| self.base.allowance(asset, owner, spender))
    }

    fn approve(
        &mut self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        value: Decimal,
    ) -> Result<()> {
        self.allowances.insert((asset.clone(), owner, spender), value);
        self.journal.push(LedgerOp::Approve {
            asset: asset.clone(),
            owner,
            spender,
            value,
        });
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
        self.journal.push(LedgerOp::Transfer {
            asset: asset.clone(),
            from,
            to,
            amount,
        });
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
        self.journal.push(LedgerOp::Pull {
            asset: asset.clone(),
            spender,
            from,
            to,
            amount,
        });
        Ok(())
    }
}

impl<L: AssetTransfer + PermitAuthority> PermitAuthority for StagedTransfers<'_, L> {
    fn supports_permit(&self, asset: &AssetId) -> bool {
        self.base.supports_permit(asset)
    }

    fn permit_nonce(&self, asset: &AssetId, holder: AccountId) -> Result<u64> {
        match self.nonces.get(&(asset.clone(), holder)) {
            Some(nonce) => Ok(*nonce),
            None => self.base.permit_nonce(asset, holder),
        }
    }

    fn redeem_permit(&mut self, asset: &AssetId, permit: &PermitAuthorization) -> Result<()> {
        if !self.supports_permit(asset) {
            return Err(BatchfillError::PermitNotSupported(asset.clone()));
        }
        let nonce = self.permit_nonce(asset, permit.owner)?;
        permit.verify(asset, nonce, Utc::now())?;

        self.nonces.insert((asset.clone(), permit.owner), nonce + 1);
        self.allowances.insert(
            (asset.clone(), permit.owner, permit.spender),
            permit.value,
        );
        self.journal.push(LedgerOp::Redeem {
            asset: asset.clone(),
            permit: permit.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use super::*;

    /// Minimal base ledger for staging tests.
    #[derive(Default)]
    struct TestLedger {
        balances: Map<(AssetId, AccountId), Decimal>,
        allowances: Map<(AssetId, AccountId, AccountId), Decimal>,
    }

    impl AssetTransfer for TestLedger {
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
            let available = self.balance_of(asset, from);
            if available < amount {
                return Err(BatchfillError::InsufficientBalance {
                    asset: asset.clone(),
                    needed: amount,
                    available,
                });
            }
            self.balances.insert((asset.clone(), from), available - amount);
            let to_balance = self.balance_of(asset, to);
            self.balances.insert((asset.clone(), to), to_balance + amount);
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
            let allowed = self.allowance(asset, from, spender);
            if allowed < amount {
                return Err(BatchfillError::InsufficientAllowance {
                    asset: asset.clone(),
                    needed: amount,
                    available: allowed,
                });
            }
            self.transfer(asset, from, to, amount)?;
            self.allowances
                .insert((asset.clone(), from, spender), allowed - amount);
            Ok(())
        }
    }

    impl PermitAuthority for TestLedger {
        fn supports_permit(&self, _asset: &AssetId) -> bool {
            false
        }

        fn permit_nonce(&self, asset: &AssetId, _holder: AccountId) -> Result<u64> {
            Err(BatchfillError::PermitNotSupported(asset.clone()))
        }

        fn redeem_permit(
            &mut self,
            asset: &AssetId,
            _permit: &PermitAuthorization,
        ) -> Result<()> {
            Err(BatchfillError::PermitNotSupported(asset.clone()))
        }
    }

    fn asset() -> AssetId {
        AssetId::new("UNIT-B")
    }

    const ALICE: AccountId = AccountId([1u8; 32]);
    const BOB: AccountId = AccountId([2u8; 32]);

    #[test]
    fn dropped_stage_leaves_base_untouched() {
        let mut base = TestLedger::default();
        base.balances.insert((asset(), ALICE), Decimal::new(100, 0));

        {
            let mut staged = StagedTransfers::new(&mut base);
            staged
                .transfer(&asset(), ALICE, BOB, Decimal::new(40, 0))
                .unwrap();
            assert_eq!(staged.balance_of(&asset(), BOB), Decimal::new(40, 0));
            assert_eq!(staged.staged_ops(), 1);
            // Dropped without commit.
        }

        assert_eq!(base.balance_of(&asset(), ALICE), Decimal::new(100, 0));
        assert_eq!(base.balance_of(&asset(), BOB), Decimal::ZERO);
    }

    #[test]
    fn commit_applies_journal_in_order() {
        let mut base = TestLedger::default();
        base.balances.insert((asset(), ALICE), Decimal::new(100, 0));

        let mut staged = StagedTransfers::new(&mut base);
        staged
            .transfer(&asset(), ALICE, BOB, Decimal::new(40, 0))
            .unwrap();
        staged
            .transfer(&asset(), BOB, ALICE, Decimal::new(10, 0))
            .unwrap();
        staged.commit().unwrap();

        assert_eq!(base.balance_of(&asset(), ALICE), Decimal::new(70, 0));
        assert_eq!(base.balance_of(&asset(), BOB), Decimal::new(30, 0));
    }

    #[test]
    fn staged_pull_tracks_allowance() {
        let mut base = TestLedger::default();
        base.balances.insert((asset(), ALICE), Decimal::new(100, 0));
        base.allowances
            .insert((asset(), ALICE, BOB), Decimal::new(50, 0));

        let mut staged = StagedTransfers::new(&mut base);
        staged
            .pull(&asset(), BOB, ALICE, BOB, Decimal::new(30, 0))
            .unwrap();
        assert_eq!(staged.allowance(&asset(), ALICE, BOB), Decimal::new(20, 0));

        let err = staged
            .pull(&asset(), BOB, ALICE, BOB, Decimal::new(21, 0))
            .unwrap_err();
        assert!(matches!(err, BatchfillError::InsufficientAllowance { .. }));

        // Base allowance untouched until commit.
        assert_eq!(base.allowance(&asset(), ALICE, BOB), Decimal::new(50, 0));
    }

    #[test]
    fn staged_balance_insufficient() {
        let mut base = TestLedger::default();
        base.balances.insert((asset(), ALICE), Decimal::new(10, 0));

        let mut staged = StagedTransfers::new(&mut base);
        let err = staged
            .transfer(&asset(), ALICE, BOB, Decimal::new(11, 0))
            .unwrap_err();
        assert!(matches!(err, BatchfillError::InsufficientBalance { .. }));
        assert_eq!(staged.staged_ops(), 0);
    }

    #[test]
    fn zero_amount_is_not_journaled() {
        let mut base = TestLedger::default();
        let mut staged = StagedTransfers::new(&mut base);
        staged.transfer(&asset(), ALICE, BOB, Decimal::ZERO).unwrap();
        staged.pull(&asset(), BOB, ALICE, BOB, Decimal::ZERO).unwrap();
        assert_eq!(staged.staged_ops(), 0);
    }

    #[test]
    fn permit_probe_delegates_to_base() {
        let mut base = TestLedger::default();
        let staged = StagedTransfers::new(&mut base);
        assert!(!staged.supports_permit(&asset()));
        assert!(matches!(
            staged.permit_nonce(&asset(), ALICE).unwrap_err(),
            BatchfillError::PermitNotSupported(_)
        ));
    }
}
