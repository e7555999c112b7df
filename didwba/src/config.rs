//! # Protocol Constants
//!
//! Every magic string and tolerance in the DID-WBA scheme lives here.
//! If you're hardcoding a constant somewhere else, you're doing it wrong
//! and you owe the team coffee.
//!
//! The verification-side tolerances are *defaults*, not policy: a relying
//! party tunes them through [`VerifierConfig`](crate::verify::VerifierConfig).

use std::time::Duration;

// ---------------------------------------------------------------------------
// Scheme Identifiers
// ---------------------------------------------------------------------------

/// Prefix shared by every DID-WBA identifier.
pub const DID_WBA_PREFIX: &str = "did:wba:";

/// Authentication scheme token that opens the wire header.
pub const AUTH_SCHEME: &str = "DIDWba";

/// HTTP header name the scheme travels in.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

// ---------------------------------------------------------------------------
// DID Document Vocabulary
// ---------------------------------------------------------------------------

/// Context URI for the W3C DID Core specification.
pub const CONTEXT_DID_V1: &str = "https://www.w3.org/ns/did/v1";

/// Context URI for the JWS 2020 verification suite.
pub const CONTEXT_JWS_2020: &str = "https://w3id.org/security/suites/jws-2020/v1";

/// Verification method type for ECDSA over P-256 (secp256r1).
pub const VERIFICATION_METHOD_TYPE_P256: &str = "EcdsaSecp256r1VerificationKey2019";

/// JWK key type for elliptic-curve keys.
pub const JWK_KEY_TYPE_EC: &str = "EC";

/// JWK curve name for P-256.
pub const JWK_CURVE_P256: &str = "P-256";

/// Fragment conventionally used for the first key in a freshly minted
/// document (`did:wba:example.com#key-1`).
pub const DEFAULT_KEY_FRAGMENT: &str = "key-1";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// P-256 affine coordinate width in bytes. JWK `x`/`y` members and the
/// signature halves are zero-padded to exactly this length.
pub const COORDINATE_LENGTH: usize = 32;

/// Raw signature length: big-endian `r ∥ s`, each half padded to the
/// coordinate width. Fixed at 64 bytes — never DER, whose variable-length
/// framing breaks byte-level agreement between implementations.
pub const SIGNATURE_LENGTH: usize = 2 * COORDINATE_LENGTH;

/// SHA-256 digest length in bytes.
pub const DIGEST_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Verification Tolerances (defaults)
// ---------------------------------------------------------------------------

/// How far in the past a header timestamp may lie before it is rejected
/// as expired.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Clock-skew allowance for timestamps that lie in the future.
pub const DEFAULT_FUTURE_SKEW: Duration = Duration::from_secs(60);

/// How long the in-memory replay guard remembers a `(did, nonce)` pair.
/// Must cover the timestamp tolerance plus skew, otherwise a replayed
/// header could slip through after the guard forgets it.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(6 * 60);
