//! # Canonical Payload Construction
//!
//! The signed payload is the one place where two independently written
//! implementations must agree byte-for-byte *before* any cryptography
//! happens. We get there with RFC 8785 (JSON Canonicalization Scheme):
//! members sorted, strings minimally escaped, no insignificant whitespace.
//! Canonicalization is a pure function of the field *values* — construction
//! order, formatting, and serializer quirks cannot leak into the bytes.
//!
//! Note the field set: `{nonce, timestamp, service, did}`. The verification
//! method fragment deliberately travels *unsigned* in the header — it names
//! which key to check against, and a tampered fragment can only make
//! verification fail, never succeed against a different payload.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::DIGEST_LENGTH;

/// Errors from payload canonicalization.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The payload could not be serialized. With plain string fields this
    /// is effectively unreachable, but the JCS serializer is fallible and
    /// we refuse to paper over it with a panic.
    #[error("failed to canonicalize payload: {0}")]
    Serialization(String),
}

/// The exact set of values bound by a DID-WBA signature.
///
/// Wire member names follow the cross-language convention: the service
/// domain is serialized under the key `"service"`, not `"service_domain"`.
/// JCS sorts members, so the serialized order is `did, nonce, service,
/// timestamp` regardless of how this struct is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalPayload {
    /// Per-attempt unique token. Uniqueness is the caller's job; a reused
    /// nonce inside the freshness window enables replay.
    pub nonce: String,
    /// UTC instant in `YYYY-MM-DDThh:mm:ssZ` form.
    pub timestamp: String,
    /// Bare service host the header is valid for.
    pub service: String,
    /// The caller's DID.
    pub did: String,
}

impl CanonicalPayload {
    /// Assemble a payload from its four field values.
    pub fn new(
        nonce: impl Into<String>,
        timestamp: impl Into<String>,
        service_domain: impl Into<String>,
        did: impl Into<String>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp: timestamp.into(),
            service: service_domain.into(),
            did: did.into(),
        }
    }

    /// Serialize to RFC 8785 canonical bytes.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        serde_jcs::to_vec(self).map_err(|e| CanonicalError::Serialization(e.to_string()))
    }

    /// SHA-256 over the canonical bytes. Signing and verification both
    /// operate on this digest, never on the raw JSON.
    pub fn digest(&self) -> Result<[u8; DIGEST_LENGTH], CanonicalError> {
        let bytes = self.to_canonical_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> CanonicalPayload {
        CanonicalPayload::new(
            "4f2c7b1a-9d3e-42a0-8c11-2f5b6e7d8a90",
            "2026-08-07T12:00:00Z",
            "service.example.com",
            "did:wba:example.com",
        )
    }

    #[test]
    fn members_sorted_and_compact() {
        let bytes = sample().to_canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"{"did":"did:wba:example.com","nonce":"4f2c7b1a-9d3e-42a0-8c11-2f5b6e7d8a90","service":"service.example.com","timestamp":"2026-08-07T12:00:00Z"}"#
        );
    }

    #[test]
    fn construction_order_is_irrelevant() {
        // Same values expressed as JSON objects built in two different
        // member orders must canonicalize identically.
        let a: Value = serde_json::from_str(
            r#"{"nonce":"n1","timestamp":"2026-01-01T00:00:00Z","service":"s.example.com","did":"did:wba:example.com"}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"did":"did:wba:example.com","service":"s.example.com","timestamp":"2026-01-01T00:00:00Z","nonce":"n1"}"#,
        )
        .unwrap();

        let ca = serde_jcs::to_vec(&a).unwrap();
        let cb = serde_jcs::to_vec(&b).unwrap();
        assert_eq!(ca, cb);

        let struct_bytes =
            CanonicalPayload::new("n1", "2026-01-01T00:00:00Z", "s.example.com", "did:wba:example.com")
                .to_canonical_bytes()
                .unwrap();
        assert_eq!(struct_bytes, ca);
    }

    #[test]
    fn digest_is_stable() {
        let d1 = sample().digest().unwrap();
        let d2 = sample().digest().unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 32);
    }

    #[test]
    fn digest_changes_with_any_field() {
        let base = sample().digest().unwrap();

        let mut p = sample();
        p.nonce.push('x');
        assert_ne!(p.digest().unwrap(), base);

        let mut p = sample();
        p.timestamp = "2026-08-07T12:00:01Z".into();
        assert_ne!(p.digest().unwrap(), base);

        let mut p = sample();
        p.service = "other.example.com".into();
        assert_ne!(p.digest().unwrap(), base);

        let mut p = sample();
        p.did = "did:wba:other.example.com".into();
        assert_ne!(p.digest().unwrap(), base);
    }

    #[test]
    fn non_ascii_values_survive_canonicalization() {
        let p = CanonicalPayload::new("ноncé", "2026-01-01T00:00:00Z", "example.com", "did:wba:例え.jp");
        let bytes = p.to_canonical_bytes().unwrap();
        // JCS emits UTF-8 directly rather than \u escapes for printable
        // characters; the exact bytes just need to be deterministic.
        assert_eq!(bytes, p.to_canonical_bytes().unwrap());
    }
}
