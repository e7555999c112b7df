//! # Authorization Header Codec
//!
//! Assembles and parses the DID-WBA wire header:
//!
//! ```text
//! DIDWba did="…", nonce="…", timestamp="…", verification_method="…", signature="…"
//! ```
//!
//! Assembly writes the fields in a fixed order for readability; parsing
//! treats order as meaningless. The parser is tolerant where tolerance is
//! safe (extra whitespace, unrecognized keys pass through unnoticed) and
//! strict where it matters: the scheme token must match exactly, quoting
//! must balance, and all five known fields must be present. Duplicate keys
//! take the **first** occurrence — a later duplicate can never override
//! what was seen first.
//!
//! This module also carries the structured interop records: the JSON forms
//! an external harness or store uses to drive generation or feed
//! verification without re-deriving anything.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::AUTH_SCHEME;

/// Errors from header parsing. All of these mean "this is not a DID-WBA
/// header", which callers must keep distinct from "this is a DID-WBA
/// header that fails verification".
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The header does not open with the `DIDWba` scheme token.
    #[error("malformed header: missing {AUTH_SCHEME} scheme token")]
    Scheme,

    /// A quoted value never closes.
    #[error("malformed header: unbalanced quote")]
    UnbalancedQuote,

    /// The `key="value"` syntax is broken.
    #[error("malformed header: {0}")]
    Syntax(String),

    /// A mandatory field is absent.
    #[error("malformed header: missing required field {0:?}")]
    MissingField(&'static str),
}

// ---------------------------------------------------------------------------
// AuthHeader
// ---------------------------------------------------------------------------

/// The five fields of a DID-WBA authorization header.
///
/// Constructed once by the signing side, parsed once by the verifying
/// side, never mutated in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub did: String,
    pub nonce: String,
    pub timestamp: String,
    /// Fragment naming the signing key. Travels unsigned: it selects which
    /// key to verify against, it is not part of what the key attests.
    pub verification_method: String,
    /// Base64url `r ∥ s` signature, no padding.
    pub signature: String,
}

impl AuthHeader {
    /// Parse a wire header string.
    ///
    /// Whitespace around commas and separators is ignored; unknown keys
    /// are skipped for forward compatibility; the first occurrence of a
    /// duplicated key wins.
    pub fn parse(header: &str) -> Result<Self, HeaderError> {
        let trimmed = header.trim();
        let rest = trimmed.strip_prefix(AUTH_SCHEME).ok_or(HeaderError::Scheme)?;
        // "DIDWbaX" must not pass as "DIDWba" + junk.
        if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
            return Err(HeaderError::Scheme);
        }

        let mut did = None;
        let mut nonce = None;
        let mut timestamp = None;
        let mut verification_method = None;
        let mut signature = None;

        let mut rest = rest.trim_start();
        while !rest.is_empty() {
            let eq = rest
                .find('=')
                .ok_or_else(|| HeaderError::Syntax(format!("expected key=\"value\", got {rest:?}")))?;
            let key = rest[..eq].trim();
            if key.is_empty()
                || !key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(HeaderError::Syntax(format!("invalid field key {key:?}")));
            }

            let after_eq = rest[eq + 1..].trim_start();
            let value_start = after_eq
                .strip_prefix('"')
                .ok_or_else(|| HeaderError::Syntax(format!("field {key:?} value is not quoted")))?;
            let close = value_start.find('"').ok_or(HeaderError::UnbalancedQuote)?;
            let value = &value_start[..close];

            // First occurrence wins; later duplicates are ignored.
            let slot = match key {
                "did" => Some(&mut did),
                "nonce" => Some(&mut nonce),
                "timestamp" => Some(&mut timestamp),
                "verification_method" => Some(&mut verification_method),
                "signature" => Some(&mut signature),
                _ => None,
            };
            if let Some(slot) = slot {
                if slot.is_none() {
                    *slot = Some(value.to_string());
                }
            }

            rest = value_start[close + 1..].trim_start();
            if let Some(after_comma) = rest.strip_prefix(',') {
                rest = after_comma.trim_start();
            } else if !rest.is_empty() {
                return Err(HeaderError::Syntax(format!(
                    "expected comma between fields, got {rest:?}"
                )));
            }
        }

        Ok(Self {
            did: did.ok_or(HeaderError::MissingField("did"))?,
            nonce: nonce.ok_or(HeaderError::MissingField("nonce"))?,
            timestamp: timestamp.ok_or(HeaderError::MissingField("timestamp"))?,
            verification_method: verification_method
                .ok_or(HeaderError::MissingField("verification_method"))?,
            signature: signature.ok_or(HeaderError::MissingField("signature"))?,
        })
    }
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{AUTH_SCHEME} did=\"{}\", nonce=\"{}\", timestamp=\"{}\", verification_method=\"{}\", signature=\"{}\"",
            self.did, self.nonce, self.timestamp, self.verification_method, self.signature
        )
    }
}

// ---------------------------------------------------------------------------
// JSON Twin
// ---------------------------------------------------------------------------

/// The header's JSON twin: the same five fields as a JSON object, for
/// transports where a request body or message queue is more natural than
/// an HTTP header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthJson {
    pub did: String,
    pub nonce: String,
    pub timestamp: String,
    pub verification_method: String,
    pub signature: String,
}

impl AuthJson {
    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<String, HeaderError> {
        serde_json::to_string(self)
            .map_err(|e| HeaderError::Syntax(format!("serialize auth JSON: {e}")))
    }

    /// Parse JSON bytes; all five fields must be present and non-empty.
    pub fn parse(json: &str) -> Result<Self, HeaderError> {
        let parsed: Self = serde_json::from_str(json)
            .map_err(|e| HeaderError::Syntax(format!("invalid auth JSON: {e}")))?;
        for (name, value) in [
            ("did", &parsed.did),
            ("nonce", &parsed.nonce),
            ("timestamp", &parsed.timestamp),
            ("verification_method", &parsed.verification_method),
            ("signature", &parsed.signature),
        ] {
            if value.is_empty() {
                return Err(match name {
                    "did" => HeaderError::MissingField("did"),
                    "nonce" => HeaderError::MissingField("nonce"),
                    "timestamp" => HeaderError::MissingField("timestamp"),
                    "verification_method" => HeaderError::MissingField("verification_method"),
                    _ => HeaderError::MissingField("signature"),
                });
            }
        }
        Ok(parsed)
    }
}

impl From<AuthHeader> for AuthJson {
    fn from(h: AuthHeader) -> Self {
        Self {
            did: h.did,
            nonce: h.nonce,
            timestamp: h.timestamp,
            verification_method: h.verification_method,
            signature: h.signature,
        }
    }
}

impl From<AuthJson> for AuthHeader {
    fn from(j: AuthJson) -> Self {
        Self {
            did: j.did,
            nonce: j.nonce,
            timestamp: j.timestamp,
            verification_method: j.verification_method,
            signature: j.signature,
        }
    }
}

// ---------------------------------------------------------------------------
// Interop Records
// ---------------------------------------------------------------------------

/// Structured form of the signing parameters, for external systems that
/// drive generation or feed verification without re-deriving values.
/// Round-trips losslessly through JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParamsRecord {
    pub did: String,
    pub nonce: String,
    pub timestamp: String,
    /// Bare fragment, e.g. `key-1`.
    pub verification_method: String,
    /// Full identifier, e.g. `did:wba:example.com#key-1`.
    pub verification_method_id: String,
    pub service_domain: String,
}

/// Structured form of an assembled header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeaderRecord {
    pub auth_header: String,
}
