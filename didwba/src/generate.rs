//! # Header Generation
//!
//! The signing side of the protocol: build fresh signed parameters, bind
//! them to a service domain, sign the canonical digest, and assemble the
//! wire header. Generation is all-or-nothing — any failure aborts before a
//! header string exists, so a partial or unsigned header can never leak
//! out of this module.
//!
//! [`Authenticator`] is the long-lived convenience wrapper: it owns the
//! DID document and private key (loaded from files or handed in directly)
//! and issues headers for target URLs, remembering the last header per
//! service domain so a client talking to one service doesn't re-sign on
//! every request. Relying parties with a short freshness window will
//! force a refresh via [`Authenticator::fresh_auth_header`] after a
//! rejection.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::canonical::{CanonicalError, CanonicalPayload};
use crate::crypto::keys::{KeyError, WbaKeypair};
use crate::crypto::signing::{sign_digest, SignatureError, WbaSignature};
use crate::document::{DidDocument, DocumentError};
use crate::domain::{extract_service_domain, DomainError};
use crate::header::{AuthHeader, AuthJson, AuthParamsRecord};

/// Errors that abort header generation. No partial header is ever emitted:
/// the first failure wins and nothing is returned.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

// ---------------------------------------------------------------------------
// SignedParameters
// ---------------------------------------------------------------------------

/// One authentication attempt's parameters, created fresh per attempt.
///
/// The nonce must be unique per attempt — that uniqueness is what blocks
/// replay inside the freshness window, and it is the caller's
/// responsibility when parameters are built by hand instead of through
/// [`SignedParameters::for_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParameters {
    pub did: String,
    pub nonce: String,
    /// UTC, `YYYY-MM-DDThh:mm:ssZ`.
    pub timestamp: String,
    pub service_domain: String,
    /// Bare fragment of the signing key, e.g. `key-1`.
    pub verification_method_fragment: String,
}

impl SignedParameters {
    /// Build parameters for a document and service domain: the document's
    /// first authentication entry, a fresh UUID nonce, the current instant.
    pub fn for_document(
        document: &DidDocument,
        service_domain: &str,
    ) -> Result<Self, GenerateError> {
        let fragment = document.first_authentication_fragment()?;
        Ok(Self {
            did: document.id.clone(),
            nonce: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            service_domain: service_domain.to_string(),
            verification_method_fragment: fragment,
        })
    }

    /// Full verification-method identifier: `did#fragment`.
    pub fn verification_method_id(&self) -> String {
        format!("{}#{}", self.did, self.verification_method_fragment)
    }

    /// The canonical payload these parameters sign. Note the fragment is
    /// not part of it — it travels unsigned in the header.
    pub fn canonical_payload(&self) -> CanonicalPayload {
        CanonicalPayload::new(
            self.nonce.clone(),
            self.timestamp.clone(),
            self.service_domain.clone(),
            self.did.clone(),
        )
    }

    /// Export as the structured interop record.
    pub fn to_record(&self) -> AuthParamsRecord {
        AuthParamsRecord {
            did: self.did.clone(),
            nonce: self.nonce.clone(),
            timestamp: self.timestamp.clone(),
            verification_method: self.verification_method_fragment.clone(),
            verification_method_id: self.verification_method_id(),
            service_domain: self.service_domain.clone(),
        }
    }

    /// Rebuild parameters from an interop record.
    pub fn from_record(record: &AuthParamsRecord) -> Self {
        Self {
            did: record.did.clone(),
            nonce: record.nonce.clone(),
            timestamp: record.timestamp.clone(),
            service_domain: record.service_domain.clone(),
            verification_method_fragment: record.verification_method.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signing Flow
// ---------------------------------------------------------------------------

/// Sign parameters and assemble the header.
///
/// Before signing, the referenced verification method is resolved in the
/// document and its key type checked — signing with a key the document
/// doesn't advertise (or advertises under an unsupported suite) would only
/// produce headers nobody can verify, so it fails here instead.
pub fn sign_parameters(
    parameters: &SignedParameters,
    document: &DidDocument,
    keypair: &WbaKeypair,
) -> Result<AuthHeader, GenerateError> {
    let method = document
        .resolve_verification_method(&parameters.did, &parameters.verification_method_fragment)?;
    method.public_key()?;

    let signature = sign_parameters_raw(parameters, keypair)?;

    debug!(
        did = %parameters.did,
        service_domain = %parameters.service_domain,
        fragment = %parameters.verification_method_fragment,
        "assembled DID-WBA header"
    );

    Ok(AuthHeader {
        did: parameters.did.clone(),
        nonce: parameters.nonce.clone(),
        timestamp: parameters.timestamp.clone(),
        verification_method: parameters.verification_method_fragment.clone(),
        signature: signature.to_base64url(),
    })
}

/// Canonicalize, digest, and sign — the raw signature without header
/// assembly, for callers that transport the fields some other way.
pub fn sign_parameters_raw(
    parameters: &SignedParameters,
    keypair: &WbaKeypair,
) -> Result<WbaSignature, GenerateError> {
    let digest = parameters.canonical_payload().digest()?;
    Ok(sign_digest(keypair, &digest)?)
}

/// Generate a header for a target URL: extract the service domain, build
/// fresh parameters from the document's first authentication entry, sign,
/// assemble.
pub fn generate_auth_header(
    keypair: &WbaKeypair,
    document: &DidDocument,
    target_url: &str,
) -> Result<AuthHeader, GenerateError> {
    let service_domain = extract_service_domain(target_url)?;
    let parameters = SignedParameters::for_document(document, &service_domain)?;
    sign_parameters(&parameters, document, keypair)
}

/// Generate the JSON twin of an authorization header for a target URL.
pub fn generate_auth_json(
    keypair: &WbaKeypair,
    document: &DidDocument,
    target_url: &str,
) -> Result<AuthJson, GenerateError> {
    Ok(generate_auth_header(keypair, document, target_url)?.into())
}

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

/// Issues DID-WBA headers for target URLs from owned DID material.
///
/// The document and private key are explicit inputs — given directly or as
/// file paths — never discovered through implicit search paths. One header
/// per service domain is cached until [`clear_cached`](Self::clear_cached)
/// or [`fresh_auth_header`](Self::fresh_auth_header) replaces it.
pub struct Authenticator {
    document: DidDocument,
    keypair: WbaKeypair,
    cached_headers: Mutex<HashMap<String, String>>,
}

impl Authenticator {
    /// Build from in-memory material. The document is validated up front
    /// so a document with no authentication entries fails here, not on
    /// the first request.
    pub fn new(document: DidDocument, keypair: WbaKeypair) -> Result<Self, GenerateError> {
        document.validate()?;
        Ok(Self {
            document,
            keypair,
            cached_headers: Mutex::new(HashMap::new()),
        })
    }

    /// Load the DID document and PEM private key from files.
    pub fn from_files(
        document_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, GenerateError> {
        let document = DidDocument::from_file(document_path)?;
        let keypair = WbaKeypair::from_pem_file(key_path)?;
        Self::new(document, keypair)
    }

    /// The DID document this authenticator signs for.
    pub fn document(&self) -> &DidDocument {
        &self.document
    }

    /// The `Authorization` header value for a target URL, reusing the
    /// cached header for the URL's service domain when one exists.
    pub fn auth_header(&self, target_url: &str) -> Result<String, GenerateError> {
        let service_domain = extract_service_domain(target_url)?;

        if let Some(cached) = self.cached_headers.lock().get(&service_domain) {
            debug!(%service_domain, "using cached DID-WBA header");
            return Ok(cached.clone());
        }

        self.generate_for(&service_domain)
    }

    /// Generate a brand-new header for a target URL, replacing whatever
    /// was cached for its service domain.
    pub fn fresh_auth_header(&self, target_url: &str) -> Result<String, GenerateError> {
        let service_domain = extract_service_domain(target_url)?;
        self.generate_for(&service_domain)
    }

    /// The JSON twin for a target URL. Never cached: JSON payloads are
    /// typically consumed once by a message channel.
    pub fn auth_json(&self, target_url: &str) -> Result<AuthJson, GenerateError> {
        generate_auth_json(&self.keypair, &self.document, target_url)
    }

    /// Drop the cached header for a target's service domain, e.g. after
    /// the relying party rejected it as stale.
    pub fn clear_cached(&self, target_url: &str) -> Result<(), GenerateError> {
        let service_domain = extract_service_domain(target_url)?;
        self.cached_headers.lock().remove(&service_domain);
        Ok(())
    }

    fn generate_for(&self, service_domain: &str) -> Result<String, GenerateError> {
        let parameters = SignedParameters::for_document(&self.document, service_domain)?;
        let header = sign_parameters(&parameters, &self.document, &self.keypair)?.to_string();
        self.cached_headers
            .lock()
            .insert(service_domain.to_string(), header.clone());
        Ok(header)
    }
}
