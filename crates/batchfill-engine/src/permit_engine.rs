//! Permit-aware engine: expiry gating, read-only pre-flight, and
//! signature-based allowance bridging layered over [`BatchFillEngine`].

use batchfill_types::{
    AccountId, AssetId, AssetTransfer, BatchResult, BatchValidation, FillRequest,
    PermitAuthority, PermitAuthorization, Result, SettlementProtocol,
};
use chrono::{DateTime, Utc};

use crate::engine::{BatchFillEngine, ExpiryPolicy, log_batch};
use crate::staging::StagedTransfers;
use crate::validation;

/// [`BatchFillEngine`] with per-request expiry enforcement, read-only batch
/// validation, and a fill path that redeems a permit in place of a prior
/// allowance step.
pub struct PermitBatchFillEngine<P: SettlementProtocol> {
    inner: BatchFillEngine<P>,
}

impl<P: SettlementProtocol> PermitBatchFillEngine<P> {
    #[must_use]
    pub fn new(protocol: P, engine_account: AccountId) -> Self {
        Self {
            inner: BatchFillEngine::new(protocol, engine_account),
        }
    }

    #[must_use]
    pub fn protocol_id(&self) -> AccountId {
        self.inner.protocol_id()
    }

    #[must_use]
    pub fn engine_account(&self) -> AccountId {
        self.inner.engine_account()
    }

    /// Whether a request deadline has passed. `None` never expires.
    #[must_use]
    pub fn is_order_expired(&self, expiry: Option<DateTime<Utc>>) -> bool {
        validation::is_expired_at(expiry, Utc::now())
    }

    /// Element-wise expiry flags for a batch, in request-array order.
    #[must_use]
    pub fn validate_orders_expiry(&self, requests: &[FillRequest]) -> Vec<bool> {
        validation::validate_orders_expiry_at(requests, Utc::now())
    }

    /// Read-only pre-flight: expiry flags, taker-asset consistency, and the
    /// upfront pull a fill would make. Raises nothing; inspect the result.
    #[must_use]
    pub fn validate_batch_orders(&self, requests: &[FillRequest]) -> BatchValidation {
        validation::validate_batch_orders_at(requests, Utc::now())
    }

    /// Whether the asset exposes a permit surface on this ledger.
    #[must_use]
    pub fn supports_permit<L: PermitAuthority>(&self, ledger: &L, asset: &AssetId) -> bool {
        ledger.supports_permit(asset)
    }

    /// The holder's current permit nonce for the asset.
    ///
    /// # Errors
    /// [`batchfill_types::BatchfillError::PermitNotSupported`] if the asset
    /// has no permit surface.
    pub fn permit_nonce<L: PermitAuthority>(
        &self,
        ledger: &L,
        asset: &AssetId,
        holder: AccountId,
    ) -> Result<u64> {
        ledger.permit_nonce(asset, holder)
    }

    /// Like [`BatchFillEngine::fill_batch`], but a request whose deadline
    /// has passed aborts the batch.
    ///
    /// # Errors
    /// Any 1xx/3xx/4xx condition; the ledger is untouched on error.
    pub fn fill_batch<L: AssetTransfer + PermitAuthority>(
        &mut self,
        ledger: &mut L,
        caller: AccountId,
        requests: &[FillRequest],
        receiver: Option<AccountId>,
    ) -> Result<BatchResult> {
        let mut staged = StagedTransfers::new(ledger);
        let result = self
            .inner
            .run_batch(&mut staged, caller, requests, receiver, ExpiryPolicy::Enforce)
            .inspect_err(|err| tracing::warn!(caller = %caller, error = %err, "batch aborted"))?;
        staged.commit()?;
        log_batch(&result);
        Ok(result)
    }

    /// Redeem `permit` on the batch's taker asset, then fill the batch with
    /// expiry enforced. The permit substitutes for a prior allowance step;
    /// its redemption and the fills commit together or not at all, so a
    /// failed batch leaves the permit nonce unconsumed.
    ///
    /// # Errors
    /// 2xx permit conditions, plus everything [`Self::fill_batch`] raises.
    /// A permit covering less than Σ `max_taking_amount` surfaces as
    /// [`batchfill_types::BatchfillError::InsufficientAllowance`] at the
    /// upfront pull.
    pub fn fill_batch_with_permit<L: AssetTransfer + PermitAuthority>(
        &mut self,
        ledger: &mut L,
        caller: AccountId,
        requests: &[FillRequest],
        receiver: Option<AccountId>,
        permit: &PermitAuthorization,
    ) -> Result<BatchResult> {
        let taker_asset = requests
            .first()
            .ok_or(batchfill_types::BatchfillError::EmptyBatch)?
            .order
            .taker_asset
            .clone();

        let mut staged = StagedTransfers::new(ledger);
        let result = staged
            .redeem_permit(&taker_asset, permit)
            .and_then(|()| {
                self.inner
                    .run_batch(&mut staged, caller, requests, receiver, ExpiryPolicy::Enforce)
            })
            .inspect_err(|err| tracing::warn!(caller = %caller, error = %err, "batch aborted"))?;
        staged.commit()?;
        log_batch(&result);
        Ok(result)
    }
}
