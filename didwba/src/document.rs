//! # DID Documents
//!
//! The verifier-side view of a DID document: the `id`, the authentication
//! entries, and the verification methods they point at. Documents arrive
//! already fetched — resolution over the network is someone else's job;
//! this module only answers "which public key does `did#fragment` name in
//! *this* document?".
//!
//! ## Authentication entry shapes
//!
//! The DID Core data model allows an `authentication` entry to be either a
//! bare string referencing a verification method declared elsewhere in the
//! document, or a complete embedded verification method object. Both occur
//! in the wild, so [`AuthenticationEntry`] is an untagged two-variant enum
//! and resolution handles both through one lookup path.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::config::VERIFICATION_METHOD_TYPE_P256;
use crate::crypto::keys::{KeyError, PublicKeyJwk, WbaPublicKey};

/// Errors from document parsing and verification-method resolution.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document could not be read or parsed. Permanent input error.
    #[error("malformed DID document: {0}")]
    Document(String),

    /// The document declares no authentication entries at all.
    #[error("DID document has no authentication entries")]
    MissingAuthentication,

    /// No authentication entry matches the requested fragment.
    #[error("verification method not found: {0}")]
    VerificationMethodNotFound(String),

    /// The header's `did` is not the DID this document describes.
    #[error("DID mismatch: header says {header}, document says {document}")]
    DidMismatch { header: String, document: String },

    /// The matched method exists but is not an ECDSA P-256 key.
    #[error("unsupported verification method type: {0}")]
    UnsupportedKeyType(String),

    /// The matched method's key material is unusable.
    #[error("invalid verification method key material: {0}")]
    InvalidKeyMaterial(String),
}

// ---------------------------------------------------------------------------
// Document Model
// ---------------------------------------------------------------------------

/// A DID document, the published description of a DID's keys.
///
/// Only the members the authentication protocol touches are modeled;
/// unknown members are ignored on parse (forward compatibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// JSON-LD context URIs.
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    /// The DID this document describes.
    pub id: String,

    /// Verification methods declared at document level, referenced by
    /// bare-string authentication entries.
    #[serde(rename = "verificationMethod", default)]
    pub verification_method: Vec<VerificationMethod>,

    /// Authentication entries, in document order. Invariant: a usable
    /// document has at least one.
    #[serde(default)]
    pub authentication: Vec<AuthenticationEntry>,

    /// Service endpoints. Carried through serialization untouched; the
    /// authentication protocol never reads them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

/// One entry of the `authentication` array: a reference into
/// `verificationMethod`, or an inline method object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthenticationEntry {
    /// A verification-method identifier, usually the full `did#fragment`
    /// form, occasionally just the fragment.
    Reference(String),
    /// A complete verification method embedded in place.
    Embedded(VerificationMethod),
}

/// A named public key inside a DID document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Full identifier: the owning DID plus `#fragment`.
    pub id: String,

    /// Key suite type, e.g. `EcdsaSecp256r1VerificationKey2019`.
    #[serde(rename = "type")]
    pub method_type: String,

    /// The DID that controls this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// The public key as a JWK.
    #[serde(rename = "publicKeyJwk")]
    pub public_key_jwk: PublicKeyJwk,
}

/// A service endpoint advertised by the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

// ---------------------------------------------------------------------------
// Parsing & Validation
// ---------------------------------------------------------------------------

impl DidDocument {
    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::Document(e.to_string()))
    }

    /// Read and parse a document from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DocumentError::Document(format!("read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Document(e.to_string()))
    }

    /// Structural validation: non-empty `id`, at least one authentication
    /// entry.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.id.is_empty() {
            return Err(DocumentError::Document("document id is empty".into()));
        }
        if self.authentication.is_empty() {
            return Err(DocumentError::MissingAuthentication);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve the verification method named by `did#fragment`.
    ///
    /// `did` is the value claimed by the header; it must equal this
    /// document's `id` or resolution fails with [`DocumentError::DidMismatch`]
    /// before any lookup happens — a header cannot borrow keys from a
    /// document it does not belong to.
    ///
    /// Both entry shapes resolve through this one path: a bare-string entry
    /// (matching either the full identifier or just the fragment) is chased
    /// into `verificationMethod`; an embedded entry is returned directly.
    /// The method is borrowed from the document — key material is owned by
    /// the document for its whole lifetime.
    pub fn resolve_verification_method(
        &self,
        did: &str,
        fragment: &str,
    ) -> Result<&VerificationMethod, DocumentError> {
        if did != self.id {
            return Err(DocumentError::DidMismatch {
                header: did.to_string(),
                document: self.id.clone(),
            });
        }
        if fragment.is_empty() {
            return Err(DocumentError::VerificationMethodNotFound(
                "<empty fragment>".to_string(),
            ));
        }

        let full_id = format!("{}#{}", self.id, fragment);

        for entry in &self.authentication {
            match entry {
                AuthenticationEntry::Reference(reference)
                    if reference == &full_id || reference == fragment =>
                {
                    return self
                        .verification_method
                        .iter()
                        .find(|m| m.id == full_id)
                        .ok_or_else(|| {
                            DocumentError::VerificationMethodNotFound(full_id.clone())
                        });
                }
                AuthenticationEntry::Embedded(method) if method.id == full_id => {
                    return Ok(method);
                }
                _ => {}
            }
        }

        Err(DocumentError::VerificationMethodNotFound(full_id))
    }

    /// The fragment of the document's first authentication entry — the key
    /// the generation side signs with by default.
    pub fn first_authentication_fragment(&self) -> Result<String, DocumentError> {
        let entry = self
            .authentication
            .first()
            .ok_or(DocumentError::MissingAuthentication)?;
        let id = match entry {
            AuthenticationEntry::Reference(reference) => reference.as_str(),
            AuthenticationEntry::Embedded(method) => method.id.as_str(),
        };
        Ok(fragment_of(id).to_string())
    }
}

impl VerificationMethod {
    /// Extract the method's public key, checking the suite type and curve.
    pub fn public_key(&self) -> Result<WbaPublicKey, DocumentError> {
        if self.method_type != VERIFICATION_METHOD_TYPE_P256 {
            return Err(DocumentError::UnsupportedKeyType(self.method_type.clone()));
        }
        WbaPublicKey::from_jwk(&self.public_key_jwk).map_err(|e| match e {
            KeyError::UnsupportedCurve { got, .. } => DocumentError::UnsupportedKeyType(got),
            other => DocumentError::InvalidKeyMaterial(other.to_string()),
        })
    }

    /// The `#fragment` part of this method's identifier.
    pub fn fragment(&self) -> &str {
        fragment_of(&self.id)
    }
}

/// The part after `#`, or the whole string when no `#` is present.
fn fragment_of(id: &str) -> &str {
    match id.find('#') {
        Some(idx) => &id[idx + 1..],
        None => id,
    }
}
