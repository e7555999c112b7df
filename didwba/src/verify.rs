//! # Header Verification
//!
//! The relying-party side: parse the header, police the timestamp and
//! nonce, resolve the named key in the DID document, rebuild the canonical
//! payload, and check the signature.
//!
//! Two rules shape everything here:
//!
//! 1. **The service domain comes from the verifier, never the header.**
//!    The payload is rebuilt with the domain the relying party knows
//!    itself by. A header signed for another service reconstructs to
//!    different bytes and the signature check fails — that single line is
//!    the cross-service replay defense.
//! 2. **Rejection is a result, not an error.** A forged, stale, or
//!    mistargeted header resolves to [`Verdict::Rejected`] with a typed
//!    reason. Only input that isn't a DID-WBA header at all (parse
//!    failure) or an infrastructure fault (nonce store unreachable)
//!    surfaces as `Err`, so callers can tell "not our scheme" apart from
//!    "our scheme, bad credentials".
//!
//! Freshness and replay windows are deployment policy, not protocol: they
//! arrive through [`VerifierConfig`] and default to the conventional
//! values. The bundled [`MemoryNonceValidator`] is a single-process guard;
//! a multi-node deployment needs a shared store (Redis or similar) behind
//! the same [`NonceValidator`] trait.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canonical::{CanonicalError, CanonicalPayload};
use crate::config::{DEFAULT_FUTURE_SKEW, DEFAULT_NONCE_TTL, DEFAULT_TIMESTAMP_TOLERANCE};
use crate::crypto::signing::{verify_digest, WbaSignature};
use crate::document::{DidDocument, DocumentError};
use crate::header::{AuthHeader, AuthJson, HeaderError};

/// Hard errors from verification. Everything else is a [`Verdict`].
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The input is not structurally a DID-WBA header.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// Payload reconstruction failed (effectively unreachable for string
    /// fields, but not worth a panic).
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// The external nonce validator itself failed — an infrastructure
    /// fault, not a judgement about the header.
    #[error("nonce validator failure: {0}")]
    NonceValidator(String),
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why a header was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Header `did` does not match the document's `id`.
    DidMismatch,
    /// No verification method for the header's fragment.
    VerificationMethodNotFound(String),
    /// Method found but not a supported key suite/curve.
    UnsupportedKeyType(String),
    /// Method key material did not decode to a valid key.
    InvalidKeyMaterial(String),
    /// Timestamp field is not a valid RFC 3339 instant.
    MalformedTimestamp(String),
    /// Timestamp older than the configured tolerance.
    TimestampExpired,
    /// Timestamp further in the future than the allowed skew.
    TimestampInFuture,
    /// The nonce was already seen inside its tracking window.
    NonceReplayed,
    /// Signature field is not valid base64url `r ∥ s`.
    InvalidSignatureEncoding,
    /// The signature does not verify over the rebuilt payload.
    SignatureMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DidMismatch => write!(f, "DID mismatch"),
            Self::VerificationMethodNotFound(id) => {
                write!(f, "verification method not found: {id}")
            }
            Self::UnsupportedKeyType(t) => write!(f, "unsupported key type: {t}"),
            Self::InvalidKeyMaterial(e) => write!(f, "invalid key material: {e}"),
            Self::MalformedTimestamp(e) => write!(f, "malformed timestamp: {e}"),
            Self::TimestampExpired => write!(f, "timestamp expired"),
            Self::TimestampInFuture => write!(f, "timestamp is in the future"),
            Self::NonceReplayed => write!(f, "nonce already used"),
            Self::InvalidSignatureEncoding => write!(f, "invalid signature encoding"),
            Self::SignatureMismatch => write!(f, "signature verification failed"),
        }
    }
}

/// Outcome of verifying one header: accepted, or rejected with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// The rejection reason, when there is one.
    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "verification successful"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Nonce Validation
// ---------------------------------------------------------------------------

/// External replay guard: decides whether a `(did, nonce)` pair is fresh.
///
/// The core never persists nonces itself — a production deployment plugs
/// a shared short-TTL store in here. Returning `Ok(false)` means "seen
/// before, reject"; `Err` means the store itself is unavailable.
pub trait NonceValidator: Send + Sync {
    fn validate(&self, did: &str, nonce: &str) -> Result<bool, NonceValidatorError>;
}

/// Failure inside a [`NonceValidator`] implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NonceValidatorError(pub String);

/// In-memory TTL replay guard.
///
/// Single-process only: each process sees only its own nonces, so behind a
/// load balancer this guard alone does not stop replay against a sibling
/// node. It exists for single-node deployments and tests.
pub struct MemoryNonceValidator {
    ttl: Duration,
    used: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryNonceValidator {
    /// A guard remembering nonces for `ttl`. The TTL must cover the
    /// verifier's timestamp tolerance plus skew, or a replay can land
    /// after the guard forgets.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            used: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryNonceValidator {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_TTL)
    }
}

impl NonceValidator for MemoryNonceValidator {
    fn validate(&self, did: &str, nonce: &str) -> Result<bool, NonceValidatorError> {
        let mut used = self.used.lock();
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| NonceValidatorError(format!("nonce TTL out of range: {e}")))?;

        used.retain(|_, seen_at| now.signed_duration_since(*seen_at) <= ttl);

        let key = format!("{did}:{nonce}");
        if used.contains_key(&key) {
            return Ok(false);
        }
        used.insert(key, now);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Deployment-tunable verification policy.
#[derive(Clone)]
pub struct VerifierConfig {
    /// Reject timestamps older than this.
    pub timestamp_tolerance: Duration,
    /// Allow timestamps up to this far in the future (clock skew).
    pub future_skew: Duration,
    /// Optional replay guard. `None` skips nonce tracking entirely, in
    /// which case replay protection rests on the freshness window alone.
    pub nonce_validator: Option<Arc<dyn NonceValidator>>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
            future_skew: DEFAULT_FUTURE_SKEW,
            nonce_validator: None,
        }
    }
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("timestamp_tolerance", &self.timestamp_tolerance)
            .field("future_skew", &self.future_skew)
            .field("nonce_validator", &self.nonce_validator.is_some())
            .finish()
    }
}

/// Verifies DID-WBA authorization headers against a DID document.
///
/// Stateless apart from whatever the configured nonce validator keeps;
/// a single `Verifier` is safe to share across threads.
#[derive(Debug, Default)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Verify a wire header string.
    ///
    /// `service_domain` is the domain the relying party knows itself by —
    /// supplied from the verifier's own context, never read from the
    /// header.
    ///
    /// Returns `Err` only for input that is not structurally a DID-WBA
    /// header (or a nonce-store fault); every other outcome is a
    /// [`Verdict`].
    pub fn verify_header(
        &self,
        authorization: &str,
        document: &DidDocument,
        service_domain: &str,
    ) -> Result<Verdict, VerifyError> {
        let header = AuthHeader::parse(authorization)?;
        self.verify_fields(&header, document, service_domain)
    }

    /// Verify the JSON twin of a header.
    pub fn verify_auth_json(
        &self,
        auth: &AuthJson,
        document: &DidDocument,
        service_domain: &str,
    ) -> Result<Verdict, VerifyError> {
        let header: AuthHeader = auth.clone().into();
        self.verify_fields(&header, document, service_domain)
    }

    /// Parse raw JSON bytes and verify them in one step.
    pub fn verify_auth_json_str(
        &self,
        json: &str,
        document: &DidDocument,
        service_domain: &str,
    ) -> Result<Verdict, VerifyError> {
        let auth = AuthJson::parse(json)?;
        self.verify_auth_json(&auth, document, service_domain)
    }

    fn verify_fields(
        &self,
        header: &AuthHeader,
        document: &DidDocument,
        service_domain: &str,
    ) -> Result<Verdict, VerifyError> {
        if let Some(reason) = self.check_timestamp(&header.timestamp) {
            return Ok(self.reject(header, reason));
        }

        if let Some(validator) = &self.config.nonce_validator {
            let fresh = validator
                .validate(&header.did, &header.nonce)
                .map_err(|e| VerifyError::NonceValidator(e.to_string()))?;
            if !fresh {
                return Ok(self.reject(header, RejectReason::NonceReplayed));
            }
        }

        let method = match document.resolve_verification_method(&header.did, &header.verification_method)
        {
            Ok(method) => method,
            Err(e) => return Ok(self.reject(header, resolution_reason(e))),
        };

        let public_key = match method.public_key() {
            Ok(key) => key,
            Err(e) => return Ok(self.reject(header, resolution_reason(e))),
        };

        // The anti-tamper core: rebuild the payload with *our* domain.
        let payload = CanonicalPayload::new(
            header.nonce.clone(),
            header.timestamp.clone(),
            service_domain.to_string(),
            header.did.clone(),
        );
        let digest = payload.digest()?;

        let signature = match WbaSignature::from_base64url(&header.signature) {
            Ok(signature) => signature,
            Err(_) => return Ok(self.reject(header, RejectReason::InvalidSignatureEncoding)),
        };

        if verify_digest(&public_key, &digest, &signature) {
            debug!(did = %header.did, %service_domain, "DID-WBA header accepted");
            Ok(Verdict::Accepted)
        } else {
            Ok(self.reject(header, RejectReason::SignatureMismatch))
        }
    }

    fn check_timestamp(&self, timestamp: &str) -> Option<RejectReason> {
        let parsed = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => return Some(RejectReason::MalformedTimestamp(e.to_string())),
        };

        let now = Utc::now();
        let tolerance = chrono::Duration::from_std(self.config.timestamp_tolerance).ok()?;
        let skew = chrono::Duration::from_std(self.config.future_skew).ok()?;

        if parsed > now + skew {
            return Some(RejectReason::TimestampInFuture);
        }
        if now.signed_duration_since(parsed) > tolerance {
            return Some(RejectReason::TimestampExpired);
        }
        None
    }

    fn reject(&self, header: &AuthHeader, reason: RejectReason) -> Verdict {
        warn!(did = %header.did, %reason, "DID-WBA header rejected");
        Verdict::Rejected(reason)
    }
}

/// Map a resolution failure onto its rejection reason.
fn resolution_reason(error: DocumentError) -> RejectReason {
    match error {
        DocumentError::DidMismatch { .. } => RejectReason::DidMismatch,
        DocumentError::VerificationMethodNotFound(id) => {
            RejectReason::VerificationMethodNotFound(id)
        }
        DocumentError::UnsupportedKeyType(t) => RejectReason::UnsupportedKeyType(t),
        other => RejectReason::InvalidKeyMaterial(other.to_string()),
    }
}
