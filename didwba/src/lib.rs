// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # DID-WBA — Web-Based Authentication for Decentralized Identifiers
//!
//! A caller proves control of a DID's private key by shipping a signed,
//! self-describing `Authorization` header; the relying party checks that
//! header against the caller's published DID document. This crate is the
//! whole protocol core: canonical payload construction, ECDSA P-256
//! signing, header assembly and parsing, verification-method resolution,
//! and signature validation.
//!
//! ## Architecture
//!
//! Leaf-first, the way the data flows:
//!
//! - **domain** — URL → bare service host, the value a signature is scoped to.
//! - **canonical** — the RFC 8785 canonical payload and its SHA-256 digest.
//! - **crypto** — P-256 keys, fixed-width `r ∥ s` signatures, base64url.
//! - **header** — the `DIDWba key="value"` wire codec and interop records.
//! - **document** — DID document model and verification-method resolution.
//! - **generate** — the signing pipeline and the [`Authenticator`] wrapper.
//! - **verify** — the relying-party pipeline, freshness policy, replay guard.
//! - **config** — every constant and default tolerance in one place.
//!
//! Generation runs `domain → canonical → crypto → header`; verification
//! runs `header → document → canonical → crypto`, rebuilding the payload
//! from its own context rather than trusting the wire.
//!
//! ## What this crate does not do
//!
//! No HTTP, no DID document minting, no network resolution, no nonce
//! persistence. Documents and keys are explicit inputs; the replay store
//! is a trait you implement against your cache of choice.
//!
//! ## Example
//!
//! ```
//! use didwba::config::{CONTEXT_DID_V1, VERIFICATION_METHOD_TYPE_P256};
//! use didwba::crypto::WbaKeypair;
//! use didwba::document::{AuthenticationEntry, DidDocument, VerificationMethod};
//! use didwba::generate::generate_auth_header;
//! use didwba::verify::Verifier;
//!
//! // The DID document and key normally come from files; built inline here.
//! let keypair = WbaKeypair::generate();
//! let did = "did:wba:example.com".to_string();
//! let vm_id = format!("{did}#key-1");
//! let document = DidDocument {
//!     context: vec![CONTEXT_DID_V1.to_string()],
//!     id: did.clone(),
//!     verification_method: vec![VerificationMethod {
//!         id: vm_id.clone(),
//!         method_type: VERIFICATION_METHOD_TYPE_P256.to_string(),
//!         controller: Some(did),
//!         public_key_jwk: keypair.public_key().to_jwk(),
//!     }],
//!     authentication: vec![AuthenticationEntry::Reference(vm_id)],
//!     service: vec![],
//! };
//!
//! // Caller side: mint a header for a target URL.
//! let header = generate_auth_header(&keypair, &document, "https://api.example.com/v1/chat")
//!     .unwrap()
//!     .to_string();
//!
//! // Relying-party side: verify against its OWN domain, not the header's.
//! let verdict = Verifier::default()
//!     .verify_header(&header, &document, "api.example.com")
//!     .unwrap();
//! assert!(verdict.is_accepted());
//! ```

pub mod canonical;
pub mod config;
pub mod crypto;
pub mod document;
pub mod domain;
pub mod generate;
pub mod header;
pub mod verify;

pub use canonical::CanonicalPayload;
pub use crypto::{WbaKeypair, WbaPublicKey, WbaSignature};
pub use document::{AuthenticationEntry, DidDocument, VerificationMethod};
pub use domain::extract_service_domain;
pub use generate::{generate_auth_header, generate_auth_json, Authenticator, SignedParameters};
pub use header::{AuthHeader, AuthHeaderRecord, AuthJson, AuthParamsRecord};
pub use verify::{MemoryNonceValidator, NonceValidator, RejectReason, Verdict, Verifier, VerifierConfig};
