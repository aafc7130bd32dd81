//! Order model: the maker's signed exchange intent.
//!
//! An order is immutable once signed. Its identity is implicit in its hash,
//! which binds every field to the order domain tag and the settlement
//! protocol's account — a signature for one protocol deployment cannot be
//! replayed against another.

use ed25519_dalek::{Signature, VerifyingKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, AssetId, BatchfillError, OrderHash, Result, constants};

// ---------------------------------------------------------------------------
// MakerTraits
// ---------------------------------------------------------------------------

/// Bitfield of maker-side execution constraints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct MakerTraits(pub u64);

impl MakerTraits {
    /// The order must be filled in one piece or not at all.
    pub const NO_PARTIAL_FILLS: u64 = 1 << 0;
    /// A partially filled order may be filled again in a later call.
    pub const ALLOW_MULTIPLE_FILLS: u64 = 1 << 1;

    #[must_use]
    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn allows_partial_fill(self) -> bool {
        self.0 & Self::NO_PARTIAL_FILLS == 0
    }

    #[must_use]
    pub fn allows_multiple_fills(self) -> bool {
        self.0 & Self::ALLOW_MULTIPLE_FILLS != 0
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A maker's signed intent to exchange `making_amount` of `maker_asset`
/// for `taking_amount` of `taker_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Uniqueness salt; two otherwise identical orders differ by salt.
    pub salt: [u8; 32],
    /// The maker's identity (ed25519 public key).
    pub maker: AccountId,
    /// Where the taker asset should land; `None` means the maker.
    pub receiver: Option<AccountId>,
    pub maker_asset: AssetId,
    pub taker_asset: AssetId,
    pub making_amount: Decimal,
    pub taking_amount: Decimal,
    pub maker_traits: MakerTraits,
}

impl Order {
    /// Hash of this order bound to the given settlement protocol identity.
    ///
    /// Commits to every field. Strings are length-prefixed so adjacent
    /// fields cannot alias.
    #[must_use]
    pub fn hash(&self, protocol: AccountId) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(constants::ORDER_DOMAIN_TAG);
        hasher.update(protocol.as_bytes());
        hasher.update(self.salt);
        hasher.update(self.maker.as_bytes());
        match &self.receiver {
            Some(receiver) => {
                hasher.update([1u8]);
                hasher.update(receiver.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hash_str(&mut hasher, self.maker_asset.as_str());
        hash_str(&mut hasher, self.taker_asset.as_str());
        hash_str(&mut hasher, &self.making_amount.to_string());
        hash_str(&mut hasher, &self.taking_amount.to_string());
        hasher.update(self.maker_traits.0.to_le_bytes());

        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        OrderHash(hash)
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

// ---------------------------------------------------------------------------
// OrderSignature
// ---------------------------------------------------------------------------

/// Compact authorization over an order (or permit digest): the two 32-byte
/// halves of an ed25519 signature, produced off-process by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSignature {
    pub r: [u8; 32],
    pub vs: [u8; 32],
}

impl OrderSignature {
    #[must_use]
    pub fn from_signature(sig: &Signature) -> Self {
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut vs = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        vs.copy_from_slice(&bytes[32..]);
        Self { r, vs }
    }

    #[must_use]
    pub fn to_signature(&self) -> Signature {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.vs);
        Signature::from_bytes(&bytes)
    }

    /// Verify this signature over a 32-byte digest against the signer's
    /// identity.
    ///
    /// # Errors
    /// Returns [`BatchfillError::InvalidOrderSignature`] if the signer's
    /// key is malformed or the signature doesn't verify.
    pub fn verify(&self, digest: &OrderHash, signer: &AccountId) -> Result<()> {
        let key = VerifyingKey::from_bytes(signer.as_bytes())
            .map_err(|_| BatchfillError::InvalidOrderSignature(*digest))?;
        key.verify_strict(digest.as_bytes(), &self.to_signature())
            .map_err(|_| BatchfillError::InvalidOrderSignature(*digest))
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl OrderSignature {
    /// Sign a 32-byte digest with the given key.
    pub fn sign(digest: &OrderHash, key: &ed25519_dalek::SigningKey) -> Self {
        use ed25519_dalek::Signer;
        Self::from_signature(&key.sign(digest.as_bytes()))
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// A plain order with no receiver override and default traits.
    pub fn dummy(
        maker: AccountId,
        maker_asset: &str,
        taker_asset: &str,
        making_amount: Decimal,
        taking_amount: Decimal,
    ) -> Self {
        Self {
            salt: rand::random(),
            maker,
            receiver: None,
            maker_asset: AssetId::new(maker_asset),
            taker_asset: AssetId::new(taker_asset),
            making_amount,
            taking_amount,
            maker_traits: MakerTraits::default(),
        }
    }
}
