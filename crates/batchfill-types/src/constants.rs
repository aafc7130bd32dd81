//! System-wide constants for the BatchFill engine.

/// Domain-separation tag for order hashing. Versioned so a future layout
/// change cannot collide with v1 signatures.
pub const ORDER_DOMAIN_TAG: &[u8] = b"batchfill:order:v1:";

/// Domain-separation tag for permit digests.
pub const PERMIT_DOMAIN_TAG: &[u8] = b"batchfill:permit:v1:";
