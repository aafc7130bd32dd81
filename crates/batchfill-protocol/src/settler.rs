//! The order settler — verifies one signed order and exchanges assets.
//!
//! Fill accounting is tracked in making-amount units per order hash, so an
//! order can be filled across several calls when its maker traits allow.
//! Both legs move through `pull` against allowances granted to the
//! settler's identity: makers approve it for their maker asset, takers for
//! the taker asset.

use std::collections::{HashMap, HashSet};

use batchfill_types::{
    AccountId, AssetTransfer, BatchfillError, FillMode, FillOutcome, Order, OrderHash,
    OrderSignature, Result, SettlementProtocol,
};
use rust_decimal::Decimal;

/// Opaque fill-accounting snapshot of an [`OrderSettler`], captured and
/// restored around staged multi-order operations.
#[derive(Debug, Clone)]
pub struct SettlerSnapshot {
    remaining: HashMap<OrderHash, Decimal>,
}

/// Reference settlement protocol over any [`AssetTransfer`] surface.
pub struct OrderSettler {
    /// The protocol identity order hashes and allowances bind to.
    id: AccountId,
    /// Remaining making amount per order; absent means never touched.
    remaining: HashMap<OrderHash, Decimal>,
    /// Orders cancelled by their maker.
    cancelled: HashSet<OrderHash>,
    paused: bool,
}

impl OrderSettler {
    #[must_use]
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            remaining: HashMap::new(),
            cancelled: HashSet::new(),
            paused: false,
        }
    }

    /// Halt all fills until [`OrderSettler::resume`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Cancel an order. Only its maker may cancel.
    ///
    /// # Errors
    /// Returns [`BatchfillError::InvalidOrder`] if `caller` is not the maker.
    pub fn cancel(&mut self, order: &Order, caller: AccountId) -> Result<()> {
        if caller != order.maker {
            return Err(BatchfillError::InvalidOrder {
                reason: format!("{caller} is not the maker of this order"),
            });
        }
        let hash = order.hash(self.id);
        self.cancelled.insert(hash);
        tracing::debug!(order = %hash, "order cancelled");
        Ok(())
    }

    /// Remaining making amount, if the order has been filled at least once.
    #[must_use]
    pub fn remaining_making(&self, hash: &OrderHash) -> Option<Decimal> {
        self.remaining.get(hash).copied()
    }

    /// Convert the requested amount into actual (making, taking), clamped
    /// to what the order has left.
    fn quote(order: &Order, remaining: Decimal, amount: Decimal, mode: FillMode) -> FillOutcome {
        match mode {
            FillMode::MakingAmount => {
                let making = amount.min(remaining);
                let taking = making * order.taking_amount / order.making_amount;
                FillOutcome { making, taking }
            }
            FillMode::TakingAmount => {
                let making = amount * order.making_amount / order.taking_amount;
                if making > remaining {
                    let taking = remaining * order.taking_amount / order.making_amount;
                    FillOutcome {
                        making: remaining,
                        taking,
                    }
                } else {
                    FillOutcome {
                        making,
                        taking: amount,
                    }
                }
            }
        }
    }
}

impl SettlementProtocol for OrderSettler {
    type Snapshot = SettlerSnapshot;

    fn id(&self) -> AccountId {
        self.id
    }

    fn snapshot(&self) -> SettlerSnapshot {
        SettlerSnapshot {
            remaining: self.remaining.clone(),
        }
    }

    fn restore(&mut self, snapshot: SettlerSnapshot) {
        self.remaining = snapshot.remaining;
    }

    fn fill(
        &mut self,
        assets: &mut dyn AssetTransfer,
        taker: AccountId,
        order: &Order,
        signature: &OrderSignature,
        amount: Decimal,
        mode: FillMode,
    ) -> Result<FillOutcome> {
        if self.paused {
            return Err(BatchfillError::ProtocolPaused);
        }
        if order.making_amount <= Decimal::ZERO || order.taking_amount <= Decimal::ZERO {
            return Err(BatchfillError::InvalidOrder {
                reason: "order amounts must be positive".into(),
            });
        }

        let hash = order.hash(self.id);
        if self.cancelled.contains(&hash) {
            return Err(BatchfillError::OrderCancelled(hash));
        }
        signature.verify(&hash, &order.maker)?;

        let touched = self.remaining.contains_key(&hash);
        let remaining = self
            .remaining
            .get(&hash)
            .copied()
            .unwrap_or(order.making_amount);
        if remaining.is_zero() || (touched && !order.maker_traits.allows_multiple_fills()) {
            return Err(BatchfillError::OrderFullyFilled(hash));
        }

        let outcome = Self::quote(order, remaining, amount, mode);
        if outcome.making < order.making_amount && !order.maker_traits.allows_partial_fill() {
            return Err(BatchfillError::PartialFillDisallowed(hash));
        }
        if outcome.making.is_zero() {
            return Err(BatchfillError::InvalidOrder {
                reason: "fill amount must be positive".into(),
            });
        }

        // Maker leg: maker asset maker -> taker, against the maker's
        // allowance to this protocol.
        assets.pull(&order.maker_asset, self.id, order.maker, taker, outcome.making)?;

        // Taker leg: taker asset taker -> maker (or receiver override).
        let recipient = order.receiver.unwrap_or(order.maker);
        assets.pull(&order.taker_asset, self.id, taker, recipient, outcome.taking)?;

        self.remaining.insert(hash, remaining - outcome.making);
        tracing::debug!(
            order = %hash,
            maker = %order.maker,
            taker = %taker,
            making = %outcome.making,
            taking = %outcome.taking,
            "order settled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use batchfill_assets::AssetLedger;
    use batchfill_types::{AssetId, MakerTraits};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    const UNIT_A: &str = "UNIT-A";
    const UNIT_B: &str = "UNIT-B";

    struct Fixture {
        settler: OrderSettler,
        ledger: AssetLedger,
        maker_key: SigningKey,
        maker: AccountId,
        taker: AccountId,
    }

    fn setup() -> Fixture {
        let protocol_id = AccountId([0xF0u8; 32]);
        let mut ledger = AssetLedger::new();
        ledger.register_asset(AssetId::new(UNIT_A), false);
        ledger.register_asset(AssetId::new(UNIT_B), false);

        let maker_key = SigningKey::generate(&mut OsRng);
        let maker = AccountId::from_key(&maker_key.verifying_key());
        let taker = AccountId([0x11u8; 32]);

        // Maker holds UNIT-A and approves the protocol; taker holds UNIT-B
        // and approves the protocol.
        ledger
            .mint(&AssetId::new(UNIT_A), maker, Decimal::new(1000, 0))
            .unwrap();
        ledger
            .approve(&AssetId::new(UNIT_A), maker, protocol_id, Decimal::new(1000, 0))
            .unwrap();
        ledger
            .mint(&AssetId::new(UNIT_B), taker, Decimal::new(10, 0))
            .unwrap();
        ledger
            .approve(&AssetId::new(UNIT_B), taker, protocol_id, Decimal::new(10, 0))
            .unwrap();

        Fixture {
            settler: OrderSettler::new(protocol_id),
            ledger,
            maker_key,
            maker,
            taker,
        }
    }

    fn signed_order(fx: &Fixture, making: Decimal, taking: Decimal) -> (Order, OrderSignature) {
        let order = Order::dummy(fx.maker, UNIT_A, UNIT_B, making, taking);
        let sig = OrderSignature::sign(&order.hash(fx.settler.id()), &fx.maker_key);
        (order, sig)
    }

    #[test]
    fn full_fill_by_making_amount() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));

        let outcome = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap();

        assert_eq!(outcome.making, Decimal::new(120, 0));
        assert_eq!(outcome.taking, Decimal::new(1, 1));

        let unit_a = AssetId::new(UNIT_A);
        let unit_b = AssetId::new(UNIT_B);
        assert_eq!(fx.ledger.balance_of(&unit_a, fx.taker), Decimal::new(120, 0));
        assert_eq!(fx.ledger.balance_of(&unit_b, fx.maker), Decimal::new(1, 1));
        assert_eq!(
            fx.settler.remaining_making(&order.hash(fx.settler.id())),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn taking_amount_mode_grants_proportional_making() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(100, 0), Decimal::new(2, 0));

        // Ask for 1 UNIT-B worth: half the order.
        let outcome = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::ONE,
                FillMode::TakingAmount,
            )
            .unwrap();
        assert_eq!(outcome.making, Decimal::new(50, 0));
        assert_eq!(outcome.taking, Decimal::ONE);
    }

    #[test]
    fn making_amount_clamped_to_remaining() {
        let mut fx = setup();
        let mut order = Order::dummy(
            fx.maker,
            UNIT_A,
            UNIT_B,
            Decimal::new(100, 0),
            Decimal::new(1, 0),
        );
        order.maker_traits = MakerTraits::new(MakerTraits::ALLOW_MULTIPLE_FILLS);
        let sig = OrderSignature::sign(&order.hash(fx.settler.id()), &fx.maker_key);

        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(60, 0),
                FillMode::MakingAmount,
            )
            .unwrap();

        // Second fill asks for more than what's left; gets the remainder.
        let outcome = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(60, 0),
                FillMode::MakingAmount,
            )
            .unwrap();
        assert_eq!(outcome.making, Decimal::new(40, 0));
    }

    #[test]
    fn restore_rewinds_fill_accounting() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));
        let hash = order.hash(fx.settler.id());

        let checkpoint = fx.settler.snapshot();
        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap();
        assert_eq!(fx.settler.remaining_making(&hash), Some(Decimal::ZERO));

        fx.settler.restore(checkpoint);
        assert_eq!(fx.settler.remaining_making(&hash), None);

        // The order is fillable again, as if the first settlement never ran.
        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap();
    }

    #[test]
    fn second_fill_requires_multiple_fills_trait() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(100, 0), Decimal::new(1, 0));

        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(60, 0),
                FillMode::MakingAmount,
            )
            .unwrap();

        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(40, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::OrderFullyFilled(_)));
    }

    #[test]
    fn no_partial_fills_trait_enforced() {
        let mut fx = setup();
        let mut order = Order::dummy(
            fx.maker,
            UNIT_A,
            UNIT_B,
            Decimal::new(100, 0),
            Decimal::new(1, 0),
        );
        order.maker_traits = MakerTraits::new(MakerTraits::NO_PARTIAL_FILLS);
        let sig = OrderSignature::sign(&order.hash(fx.settler.id()), &fx.maker_key);

        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(60, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::PartialFillDisallowed(_)));
    }

    #[test]
    fn bad_signature_rejected_without_transfers() {
        let mut fx = setup();
        let (order, _) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));
        let other_key = SigningKey::generate(&mut OsRng);
        let forged = OrderSignature::sign(&order.hash(fx.settler.id()), &other_key);

        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &forged,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::InvalidOrderSignature(_)));
        assert_eq!(
            fx.ledger.balance_of(&AssetId::new(UNIT_A), fx.taker),
            Decimal::ZERO
        );
    }

    #[test]
    fn cancelled_order_rejected() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));

        // Only the maker may cancel.
        let err = fx.settler.cancel(&order, fx.taker).unwrap_err();
        assert!(matches!(err, BatchfillError::InvalidOrder { .. }));

        fx.settler.cancel(&order, fx.maker).unwrap();
        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::OrderCancelled(_)));
    }

    #[test]
    fn paused_protocol_rejects_fills() {
        let mut fx = setup();
        let (order, sig) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));

        fx.settler.pause();
        assert!(fx.settler.is_paused());
        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::ProtocolPaused));

        fx.settler.resume();
        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap();
    }

    #[test]
    fn receiver_override_gets_taker_asset() {
        let mut fx = setup();
        let receiver = AccountId([0x99u8; 32]);
        let mut order = Order::dummy(
            fx.maker,
            UNIT_A,
            UNIT_B,
            Decimal::new(120, 0),
            Decimal::new(1, 1),
        );
        order.receiver = Some(receiver);
        let sig = OrderSignature::sign(&order.hash(fx.settler.id()), &fx.maker_key);

        fx.settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap();
        assert_eq!(
            fx.ledger.balance_of(&AssetId::new(UNIT_B), receiver),
            Decimal::new(1, 1)
        );
        assert_eq!(
            fx.ledger.balance_of(&AssetId::new(UNIT_B), fx.maker),
            Decimal::ZERO
        );
    }

    #[test]
    fn zero_amount_order_rejected() {
        let mut fx = setup();
        let (mut order, sig) = signed_order(&fx, Decimal::new(120, 0), Decimal::new(1, 1));
        order.making_amount = Decimal::ZERO;

        let err = fx
            .settler
            .fill(
                &mut fx.ledger,
                fx.taker,
                &order,
                &sig,
                Decimal::new(120, 0),
                FillMode::MakingAmount,
            )
            .unwrap_err();
        assert!(matches!(err, BatchfillError::InvalidOrder { .. }));
    }
}
