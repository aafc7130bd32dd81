//! The batch settlement engine.
//!
//! One caller atomically executes many signed orders against one settlement
//! protocol. The engine pulls the caller's worst-case taker spend up front,
//! settles every slot through the protocol inside a staged overlay, forwards
//! maker proceeds to the receiver, refunds the unspent remainder, and
//! commits only if every slot succeeded.

use batchfill_types::{
    AccountId, AssetTransfer, BatchId, BatchResult, BatchfillError, FillRequest, OrderFillRecord,
    PermitAuthority, Result, SettlementProtocol,
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::staging::StagedTransfers;
use crate::validation;

/// Whether a fill path gates on per-request expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryPolicy {
    /// Expiry fields are carried but not enforced.
    Ignore,
    /// A request whose deadline has passed aborts the batch.
    Enforce,
}

/// Atomic multi-order execution against one settlement protocol.
///
/// The engine holds no balances of its own between calls: everything it
/// pulls during a batch is either spent, forwarded, or refunded before the
/// batch commits. `engine_account` is the identity the protocol sees as
/// taker and the allowance anchor for the upfront pull.
pub struct BatchFillEngine<P: SettlementProtocol> {
    protocol: P,
    protocol_id: AccountId,
    engine_account: AccountId,
}

impl<P: SettlementProtocol> BatchFillEngine<P> {
    #[must_use]
    pub fn new(protocol: P, engine_account: AccountId) -> Self {
        let protocol_id = protocol.id();
        Self {
            protocol,
            protocol_id,
            engine_account,
        }
    }

    /// Identity of the bound settlement protocol. Order hashes and maker
    /// signatures must target this account.
    #[must_use]
    pub fn protocol_id(&self) -> AccountId {
        self.protocol_id
    }

    #[must_use]
    pub fn engine_account(&self) -> AccountId {
        self.engine_account
    }

    /// Execute every request in `requests` atomically, spending the
    /// caller's taker asset and forwarding maker proceeds to `receiver`
    /// (the caller when `None`).
    ///
    /// The caller must hold Σ `max_taking_amount` of the shared taker asset
    /// and have approved the engine account for at least that much. Expiry
    /// fields are not enforced on this path.
    ///
    /// # Errors
    /// Any 1xx/3xx/4xx condition aborts the batch; the ledger is untouched
    /// on error.
    pub fn fill_batch<L: AssetTransfer + PermitAuthority>(
        &mut self,
        ledger: &mut L,
        caller: AccountId,
        requests: &[FillRequest],
        receiver: Option<AccountId>,
    ) -> Result<BatchResult> {
        let mut staged = StagedTransfers::new(ledger);
        let result = self
            .run_batch(&mut staged, caller, requests, receiver, ExpiryPolicy::Ignore)
            .inspect_err(|err| tracing::warn!(caller = %caller, error = %err, "batch aborted"))?;
        staged.commit()?;
        log_batch(&result);
        Ok(result)
    }

    /// The shared fill procedure, running entirely inside `staged`.
    /// Callers commit (or drop) the stage.
    ///
    /// The protocol's fill accounting is snapshotted up front and restored
    /// on any abort: a slot settled inside a discarded stage must not count
    /// against its order's remaining amount.
    pub(crate) fn run_batch<L: AssetTransfer + PermitAuthority>(
        &mut self,
        staged: &mut StagedTransfers<'_, L>,
        caller: AccountId,
        requests: &[FillRequest],
        receiver: Option<AccountId>,
        expiry_policy: ExpiryPolicy,
    ) -> Result<BatchResult> {
        let checkpoint = self.protocol.snapshot();
        let result = self.execute_batch(staged, caller, requests, receiver, expiry_policy);
        if result.is_err() {
            self.protocol.restore(checkpoint);
        }
        result
    }

    fn execute_batch<L: AssetTransfer + PermitAuthority>(
        &mut self,
        staged: &mut StagedTransfers<'_, L>,
        caller: AccountId,
        requests: &[FillRequest],
        receiver: Option<AccountId>,
        expiry_policy: ExpiryPolicy,
    ) -> Result<BatchResult> {
        if requests.is_empty() {
            return Err(BatchfillError::EmptyBatch);
        }
        let taker_asset = requests[0].order.taker_asset.clone();
        if let Some(index) = validation::first_taker_asset_mismatch(requests) {
            return Err(BatchfillError::InconsistentTakerAsset {
                index,
                expected: taker_asset,
                found: requests[index].order.taker_asset.clone(),
            });
        }

        let receiver = receiver.unwrap_or(caller);
        let total_max = validation::total_max_taking(requests);
        let now = Utc::now();

        // Worst-case spend moves to the engine in one pull, then the
        // protocol draws against a single allowance.
        staged.pull(&taker_asset, self.engine_account, caller, self.engine_account, total_max)?;
        staged.approve(&taker_asset, self.engine_account, self.protocol_id, total_max)?;

        let mut fills = Vec::with_capacity(requests.len());
        let mut total_making = Decimal::ZERO;
        let mut total_taking = Decimal::ZERO;

        for (index, request) in requests.iter().enumerate() {
            if expiry_policy == ExpiryPolicy::Enforce
                && validation::is_expired_at(request.expiry, now)
            {
                return Err(BatchfillError::ExpiredOrder { index });
            }

            let outcome = self.protocol.fill(
                &mut *staged,
                self.engine_account,
                &request.order,
                &request.signature,
                request.amount,
                request.fill_mode,
            )?;

            if outcome.taking > request.max_taking_amount {
                return Err(BatchfillError::CapExceeded {
                    index,
                    taking: outcome.taking,
                    cap: request.max_taking_amount,
                });
            }

            // Maker proceeds land on the engine account as taker; forward
            // them unless the receiver is the engine itself.
            if receiver != self.engine_account {
                staged.transfer(
                    &request.order.maker_asset,
                    self.engine_account,
                    receiver,
                    outcome.making,
                )?;
            }

            let order_hash = request.order.hash(self.protocol_id);
            tracing::debug!(
                order = %order_hash,
                index,
                making = %outcome.making,
                taking = %outcome.taking,
                "order filled"
            );
            fills.push(OrderFillRecord {
                index,
                order: order_hash,
                making: outcome.making,
                taking: outcome.taking,
            });
            total_making += outcome.making;
            total_taking += outcome.taking;
        }

        let refund = total_max - total_taking;
        if refund > Decimal::ZERO {
            staged.transfer(&taker_asset, self.engine_account, caller, refund)?;
        }
        // Leave no standing authority for the protocol between batches.
        staged.approve(&taker_asset, self.engine_account, self.protocol_id, Decimal::ZERO)?;

        Ok(BatchResult {
            batch_id: BatchId::new(),
            caller,
            receiver,
            taker_asset,
            orders_filled: fills.len(),
            fills,
            total_making,
            total_taking,
            refund,
        })
    }
}

pub(crate) fn log_batch(result: &BatchResult) {
    tracing::info!(
        batch = %result.batch_id,
        caller = %result.caller,
        receiver = %result.receiver,
        taker_asset = %result.taker_asset,
        orders = result.orders_filled,
        total_making = %result.total_making,
        total_taking = %result.total_taking,
        refund = %result.refund,
        "batch filled"
    );
}
