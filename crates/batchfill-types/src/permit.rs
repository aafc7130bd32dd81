//! Permit model: a signature-based authorization that substitutes for a
//! prior allowance step.
//!
//! The holder signs (asset, owner, spender, value, deadline, nonce); the
//! authority verifies and establishes the allowance in the same call. The
//! nonce is the asset's current one for the owner, so a redeemed permit
//! cannot be replayed.

use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, AssetId, BatchfillError, OrderSignature, Result, constants};

/// A signed authorization for `spender` to pull up to `value` of an asset
/// from `owner`, valid until `deadline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitAuthorization {
    pub owner: AccountId,
    pub spender: AccountId,
    pub value: Decimal,
    pub deadline: DateTime<Utc>,
    /// Compact ed25519 signature over [`PermitAuthorization::digest`].
    pub signature: OrderSignature,
}

impl PermitAuthorization {
    /// The digest the owner signs. Bound to the permit domain tag, the
    /// asset, and the owner's current nonce.
    #[must_use]
    pub fn digest(
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        value: Decimal,
        deadline: DateTime<Utc>,
        nonce: u64,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::PERMIT_DOMAIN_TAG);
        hasher.update((asset.as_str().len() as u64).to_le_bytes());
        hasher.update(asset.as_str().as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(spender.as_bytes());
        let value = value.to_string();
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
        hasher.update(deadline.timestamp().to_le_bytes());
        hasher.update(nonce.to_le_bytes());

        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }

    /// Verify this permit against the owner's current `nonce` at time `now`.
    ///
    /// # Errors
    /// Returns [`BatchfillError::PermitRedemptionFailed`] if the deadline
    /// has passed or the signature doesn't verify (which includes a stale
    /// nonce, since the nonce is part of the signed digest).
    pub fn verify(&self, asset: &AssetId, nonce: u64, now: DateTime<Utc>) -> Result<()> {
        if self.deadline <= now {
            return Err(BatchfillError::PermitRedemptionFailed {
                reason: format!("deadline {} has passed", self.deadline),
            });
        }

        let digest = Self::digest(
            asset,
            self.owner,
            self.spender,
            self.value,
            self.deadline,
            nonce,
        );
        let key = VerifyingKey::from_bytes(self.owner.as_bytes()).map_err(|_| {
            BatchfillError::PermitRedemptionFailed {
                reason: format!("owner {} is not a valid key", self.owner),
            }
        })?;
        key.verify_strict(&digest, &self.signature.to_signature())
            .map_err(|_| BatchfillError::PermitRedemptionFailed {
                reason: "signature does not verify (bad signature or nonce mismatch)".into(),
            })
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl PermitAuthorization {
    /// Build and sign a permit with the owner's key.
    pub fn signed(
        key: &ed25519_dalek::SigningKey,
        asset: &AssetId,
        spender: AccountId,
        value: Decimal,
        deadline: DateTime<Utc>,
        nonce: u64,
    ) -> Self {
        use ed25519_dalek::Signer;
        let owner = AccountId::from_key(&key.verifying_key());
        let digest = Self::digest(asset, owner, spender, value, deadline, nonce);
        Self {
            owner,
            spender,
            value,
            deadline,
            signature: OrderSignature::from_signature(&key.sign(&digest)),
        }
    }
}
