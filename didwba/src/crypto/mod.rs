//! # Cryptographic Primitives for DID-WBA
//!
//! Everything security-relevant funnels through this module: P-256 key
//! handling and the digest-sign/digest-verify pair. All of it is a thin,
//! type-safe wrapper over the RustCrypto `p256` implementation — nothing
//! here rolls its own curve arithmetic, and nothing here should ever be
//! "optimized".
//!
//! The interoperability-critical decisions live here too:
//!
//! - **P-256** (secp256r1) is the only supported curve, checked at key
//!   construction time.
//! - Signatures are fixed-width `r ∥ s`, base64url, no padding, no DER.
//! - Signing operates on the SHA-256 digest of the canonical payload.

pub mod keys;
pub mod signing;

// Re-export the handful of names callers actually need so they don't have
// to memorize the module hierarchy.
pub use keys::{KeyError, PublicKeyJwk, WbaKeypair, WbaPublicKey};
pub use signing::{sign_digest, verify_digest, SignatureError, WbaSignature};
