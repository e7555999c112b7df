//! # ECDSA Signing & Verification
//!
//! ECDSA over P-256 on the canonical payload digest, with one wire-format
//! rule that matters more than it looks: signatures are the **fixed-width
//! concatenation** `r ∥ s`, each half zero-padded to 32 bytes, then
//! base64url-encoded without padding. Never DER. DER's variable-length
//! integer framing means two correct encoders can disagree on byte layout;
//! fixed-width concatenation leaves nothing to negotiate.
//!
//! Signature *values* are still non-deterministic: standard ECDSA draws a
//! random nonce per signature, so signing the same digest twice yields
//! different bytes. That is a property of the algorithm, not a bug — both
//! signatures verify, and cross-implementation tests must compare
//! acceptance, not bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::Signature;
use thiserror::Error;
use tracing::error;

use crate::config::{DIGEST_LENGTH, SIGNATURE_LENGTH};

use super::keys::{WbaKeypair, WbaPublicKey};

/// Errors from signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The signing primitive itself failed. This is an algorithm-level
    /// fault, not a verification outcome — callers should treat it as a
    /// security event.
    #[error("signing operation failed")]
    Signing,

    /// The signature string is not valid base64url.
    #[error("invalid signature encoding: not base64url")]
    Encoding,

    /// The decoded signature has the wrong length for `r ∥ s`.
    #[error("invalid signature length: got {got} bytes, want {want}")]
    Length { got: usize, want: usize },
}

/// A raw `r ∥ s` signature, 64 bytes, big-endian halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbaSignature {
    bytes: [u8; SIGNATURE_LENGTH],
}

impl WbaSignature {
    /// The raw `r ∥ s` bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    /// Encode as base64url without padding, the form carried in the
    /// header's `signature` field.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.bytes)
    }

    /// Decode from the header's base64url form.
    pub fn from_base64url(encoded: &str) -> Result<Self, SignatureError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SignatureError::Encoding)?;
        if decoded.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::Length {
                got: decoded.len(),
                want: SIGNATURE_LENGTH,
            });
        }
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }
}

/// Sign a canonical payload digest.
///
/// The digest is handed to the ECDSA signer as its message; the signer
/// applies its own SHA-256 internally, so the effective signing input is
/// `SHA256(digest)`. Every DID-WBA implementation shares this shape, which
/// is what makes headers verifiable across languages.
pub fn sign_digest(
    keypair: &WbaKeypair,
    digest: &[u8; DIGEST_LENGTH],
) -> Result<WbaSignature, SignatureError> {
    let signature: Signature = keypair.signing_key().try_sign(digest).map_err(|e| {
        // Security event: the primitive failed, which is categorically
        // different from a signature that merely doesn't verify.
        error!(error = %e, "ECDSA signing failed");
        SignatureError::Signing
    })?;

    let fixed = signature.to_bytes();
    let mut bytes = [0u8; SIGNATURE_LENGTH];
    bytes.copy_from_slice(fixed.as_slice());
    Ok(WbaSignature { bytes })
}

/// Check a signature against a digest and public key.
///
/// Returns a plain boolean: every failure mode — bad point, bad `r`/`s`
/// scalars, mismatched digest — is just "not valid". Distinguishing them
/// would only build an oracle for attackers.
pub fn verify_digest(
    public_key: &WbaPublicKey,
    digest: &[u8; DIGEST_LENGTH],
    signature: &WbaSignature,
) -> bool {
    let Ok(sig) = Signature::from_slice(&signature.bytes) else {
        return false;
    };
    public_key.verifying_key().verify(digest, &sig).is_ok()
}
