//! End-to-end tests for the DID-WBA protocol core.
//!
//! These tests exercise the full path on both sides of the scheme:
//! document and key loading from disk, parameter construction, canonical
//! payload agreement, signing, header assembly, parsing, verification-
//! method resolution, and signature checking — plus the tamper and replay
//! cases a relying party actually faces.
//!
//! Each test builds its own keys and documents. No shared state, no test
//! ordering dependencies.

use std::io::Write;
use std::sync::Arc;

use didwba::config::{
    CONTEXT_DID_V1, CONTEXT_JWS_2020, SIGNATURE_LENGTH, VERIFICATION_METHOD_TYPE_P256,
};
use didwba::crypto::{sign_digest, WbaKeypair, WbaSignature};
use didwba::document::{AuthenticationEntry, DidDocument, VerificationMethod};
use didwba::generate::{
    generate_auth_header, generate_auth_json, sign_parameters, Authenticator, SignedParameters,
};
use didwba::header::{AuthHeader, AuthHeaderRecord, AuthParamsRecord, HeaderError};
use didwba::verify::{
    MemoryNonceValidator, RejectReason, Verdict, Verifier, VerifierConfig, VerifyError,
};
use didwba::CanonicalPayload;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const DID: &str = "did:wba:example.com";
const SERVICE: &str = "service.example.com";
const TARGET: &str = "https://service.example.com/v1/agents/chat";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A document whose authentication entry references a document-level
/// verification method — the common published shape.
fn referenced_document(keypair: &WbaKeypair, did: &str) -> DidDocument {
    let vm_id = format!("{did}#key-1");
    DidDocument {
        context: vec![CONTEXT_DID_V1.to_string(), CONTEXT_JWS_2020.to_string()],
        id: did.to_string(),
        verification_method: vec![VerificationMethod {
            id: vm_id.clone(),
            method_type: VERIFICATION_METHOD_TYPE_P256.to_string(),
            controller: Some(did.to_string()),
            public_key_jwk: keypair.public_key().to_jwk(),
        }],
        authentication: vec![AuthenticationEntry::Reference(vm_id)],
        service: vec![],
    }
}

/// A document with the verification method embedded directly inside the
/// authentication array.
fn embedded_document(keypair: &WbaKeypair, did: &str) -> DidDocument {
    DidDocument {
        context: vec![CONTEXT_DID_V1.to_string()],
        id: did.to_string(),
        verification_method: vec![],
        authentication: vec![AuthenticationEntry::Embedded(VerificationMethod {
            id: format!("{did}#key-1"),
            method_type: VERIFICATION_METHOD_TYPE_P256.to_string(),
            controller: None,
            public_key_jwk: keypair.public_key().to_jwk(),
        })],
        service: vec![],
    }
}

// ---------------------------------------------------------------------------
// 1. Round Trip
// ---------------------------------------------------------------------------

#[test]
fn generate_then_verify_accepts() {
    init_tracing();
    let kp = WbaKeypair::generate();

    for doc in [referenced_document(&kp, DID), embedded_document(&kp, DID)] {
        let header = generate_auth_header(&kp, &doc, TARGET).unwrap().to_string();
        let verdict = Verifier::default()
            .verify_header(&header, &doc, SERVICE)
            .unwrap();
        assert!(verdict.is_accepted(), "round trip failed: {verdict}");
    }
}

// ---------------------------------------------------------------------------
// 2. Canonicalization Order-Independence
// ---------------------------------------------------------------------------

#[test]
fn canonical_bytes_ignore_construction_order() {
    let a: serde_json::Value = serde_json::from_str(
        r#"{"service":"s.example.com","did":"did:wba:example.com","nonce":"n","timestamp":"2026-01-01T00:00:00Z"}"#,
    )
    .unwrap();
    let b: serde_json::Value = serde_json::from_str(
        r#"{"timestamp":"2026-01-01T00:00:00Z","nonce":"n","did":"did:wba:example.com","service":"s.example.com"}"#,
    )
    .unwrap();
    assert_eq!(serde_jcs::to_vec(&a).unwrap(), serde_jcs::to_vec(&b).unwrap());

    let payload =
        CanonicalPayload::new("n", "2026-01-01T00:00:00Z", "s.example.com", "did:wba:example.com");
    assert_eq!(
        payload.to_canonical_bytes().unwrap(),
        serde_jcs::to_vec(&a).unwrap()
    );
    assert_eq!(payload.digest().unwrap(), payload.clone().digest().unwrap());
}

// ---------------------------------------------------------------------------
// 3. Tamper Sensitivity
// ---------------------------------------------------------------------------

#[test]
fn any_tampered_field_rejects() {
    init_tracing();
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);
    let verifier = Verifier::default();
    let wire = generate_auth_header(&kp, &doc, TARGET).unwrap().to_string();

    // Tamper each signed field in turn.
    let tampered_nonce = {
        let mut h = AuthHeader::parse(&wire).unwrap();
        h.nonce = format!("{}x", h.nonce);
        h
    };
    let tampered_timestamp = {
        let mut h = AuthHeader::parse(&wire).unwrap();
        // Shift one second; still parseable, still fresh, but different bytes.
        let shifted = chrono::DateTime::parse_from_rfc3339(&h.timestamp).unwrap()
            + chrono::Duration::seconds(1);
        h.timestamp = shifted
            .with_timezone(&chrono::Utc)
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        h
    };

    for header in [tampered_nonce, tampered_timestamp] {
        let verdict = verifier
            .verify_header(&header.to_string(), &doc, SERVICE)
            .unwrap();
        assert_eq!(verdict.reason(), Some(&RejectReason::SignatureMismatch));
    }

    // Wrong verifier-side domain.
    let verdict = verifier.verify_header(&wire, &doc, "other.example.com").unwrap();
    assert_eq!(verdict.reason(), Some(&RejectReason::SignatureMismatch));

    // Flip one character inside the signature value.
    let mut h = AuthHeader::parse(&wire).unwrap();
    let mut sig_chars: Vec<char> = h.signature.chars().collect();
    sig_chars[5] = if sig_chars[5] == 'A' { 'B' } else { 'A' };
    h.signature = sig_chars.into_iter().collect();
    let verdict = verifier.verify_header(&h.to_string(), &doc, SERVICE).unwrap();
    assert!(
        matches!(
            verdict.reason(),
            Some(&RejectReason::SignatureMismatch) | Some(&RejectReason::InvalidSignatureEncoding)
        ),
        "tampered signature must reject, got {verdict}"
    );
}

// ---------------------------------------------------------------------------
// 4. Independent Verifier Agreement
// ---------------------------------------------------------------------------

#[test]
fn fixed_parameters_verify_through_independent_reconstruction() {
    // Pin nonce and timestamp, sign, then verify through a payload that is
    // rebuilt from scratch on the other side — the signature must bind the
    // values, not any shared in-memory state. The timestamp is pinned to
    // "now" so the freshness window doesn't interfere.
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);

    let params = SignedParameters {
        did: DID.to_string(),
        nonce: "8d2f9a6c-0b1e-4c3d-9e8f-7a6b5c4d3e2f".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        service_domain: SERVICE.to_string(),
        verification_method_fragment: "key-1".to_string(),
    };

    let header = sign_parameters(&params, &doc, &kp).unwrap();
    assert_eq!(header.nonce, params.nonce);

    // "Independent" verification: parse the wire form fresh and verify.
    let reparsed = AuthHeader::parse(&header.to_string()).unwrap();
    assert_eq!(reparsed.timestamp, params.timestamp);
    let verdict = Verifier::default()
        .verify_header(&header.to_string(), &doc, SERVICE)
        .unwrap();
    assert!(verdict.is_accepted());

    // Two signatures over the same parameters differ (randomized ECDSA)
    // yet both verify.
    let header2 = sign_parameters(&params, &doc, &kp).unwrap();
    assert_ne!(header.signature, header2.signature);
    let verdict = Verifier::default()
        .verify_header(&header2.to_string(), &doc, SERVICE)
        .unwrap();
    assert!(verdict.is_accepted());
}

// ---------------------------------------------------------------------------
// 5. Signature Format
// ---------------------------------------------------------------------------

#[test]
fn signature_is_base64url_of_fixed_width_rs() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);

    for _ in 0..8 {
        let header = generate_auth_header(&kp, &doc, TARGET).unwrap();
        assert!(
            header
                .signature
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "signature {:?} strays outside base64url",
            header.signature
        );
        let decoded = WbaSignature::from_base64url(&header.signature).unwrap();
        assert_eq!(decoded.as_bytes().len(), SIGNATURE_LENGTH);
    }
}

// ---------------------------------------------------------------------------
// 6. Missing Fields Reject Before Cryptography
// ---------------------------------------------------------------------------

#[test]
fn missing_required_fields_are_malformed_not_rejected() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);
    let verifier = Verifier::default();

    for wire in [
        r#"DIDWba nonce="n", timestamp="t", verification_method="k", signature="s""#,
        r#"DIDWba did="d", timestamp="t", verification_method="k", signature="s""#,
        r#"DIDWba did="d", nonce="n", verification_method="k", signature="s""#,
        r#"DIDWba did="d", nonce="n", timestamp="t", verification_method="k""#,
    ] {
        let result = verifier.verify_header(wire, &doc, SERVICE);
        assert!(
            matches!(result, Err(VerifyError::Header(HeaderError::MissingField(_)))),
            "expected MissingField for {wire:?}"
        );
    }
}

// ---------------------------------------------------------------------------
// 7. Unknown Verification Method
// ---------------------------------------------------------------------------

#[test]
fn unknown_fragment_is_a_typed_rejection() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);
    let mut header = AuthHeader::parse(&generate_auth_header(&kp, &doc, TARGET).unwrap().to_string())
        .unwrap();
    header.verification_method = "key-42".to_string();

    let verdict = Verifier::default()
        .verify_header(&header.to_string(), &doc, SERVICE)
        .unwrap();
    match verdict.reason() {
        Some(RejectReason::VerificationMethodNotFound(id)) => {
            assert_eq!(id, &format!("{DID}#key-42"));
        }
        other => panic!("expected VerificationMethodNotFound, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 8. Cross-Key and Cross-Document Rejection
// ---------------------------------------------------------------------------

#[test]
fn header_signed_by_stranger_key_rejects() {
    let owner = WbaKeypair::generate();
    let stranger = WbaKeypair::generate();
    let doc = referenced_document(&owner, DID);

    // Stranger signs parameters naming the owner's DID and key.
    let params = SignedParameters::for_document(&doc, SERVICE).unwrap();
    let digest = params.canonical_payload().digest().unwrap();
    let forged_sig = sign_digest(&stranger, &digest).unwrap();
    let forged = AuthHeader {
        did: params.did.clone(),
        nonce: params.nonce.clone(),
        timestamp: params.timestamp.clone(),
        verification_method: params.verification_method_fragment.clone(),
        signature: forged_sig.to_base64url(),
    };

    let verdict = Verifier::default()
        .verify_header(&forged.to_string(), &doc, SERVICE)
        .unwrap();
    assert_eq!(verdict.reason(), Some(&RejectReason::SignatureMismatch));
}

// ---------------------------------------------------------------------------
// 9. Replay Guard
// ---------------------------------------------------------------------------

#[test]
fn replayed_header_rejected_by_nonce_guard() {
    init_tracing();
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);
    let header = generate_auth_header(&kp, &doc, TARGET).unwrap().to_string();

    let verifier = Verifier::new(VerifierConfig {
        nonce_validator: Some(Arc::new(MemoryNonceValidator::default())),
        ..VerifierConfig::default()
    });

    assert!(verifier.verify_header(&header, &doc, SERVICE).unwrap().is_accepted());
    assert_eq!(
        verifier
            .verify_header(&header, &doc, SERVICE)
            .unwrap()
            .reason(),
        Some(&RejectReason::NonceReplayed)
    );

    // A fresh header from the same identity still goes through.
    let fresh = generate_auth_header(&kp, &doc, TARGET).unwrap().to_string();
    assert!(verifier.verify_header(&fresh, &doc, SERVICE).unwrap().is_accepted());
}

// ---------------------------------------------------------------------------
// 10. Freshness Window Is Policy
// ---------------------------------------------------------------------------

#[test]
fn tight_freshness_window_rejects_what_default_accepts() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);

    let params = SignedParameters {
        did: DID.to_string(),
        nonce: uuid::Uuid::new_v4().to_string(),
        timestamp: (chrono::Utc::now() - chrono::Duration::seconds(120))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        service_domain: SERVICE.to_string(),
        verification_method_fragment: "key-1".to_string(),
    };
    let wire = sign_parameters(&params, &doc, &kp).unwrap().to_string();

    // Two minutes old: fine under the 5-minute default...
    let verdict = Verifier::default().verify_header(&wire, &doc, SERVICE).unwrap();
    assert!(verdict.is_accepted());

    // ...stale under a 1-minute policy.
    let strict = Verifier::new(VerifierConfig {
        timestamp_tolerance: std::time::Duration::from_secs(60),
        ..VerifierConfig::default()
    });
    let verdict = strict.verify_header(&wire, &doc, SERVICE).unwrap();
    assert_eq!(verdict.reason(), Some(&RejectReason::TimestampExpired));
}

// ---------------------------------------------------------------------------
// 11. Material Loaded From Disk
// ---------------------------------------------------------------------------

#[test]
fn authenticator_from_files_roundtrip() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);

    // Write the document and a PKCS#8 PEM key to disk the way a
    // provisioning tool would.
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("did.json");
    let key_path = dir.path().join("private-key.pem");

    std::fs::write(&doc_path, doc.to_json().unwrap()).unwrap();
    let mut f = std::fs::File::create(&key_path).unwrap();
    f.write_all(kp.to_pkcs8_pem().unwrap().as_bytes()).unwrap();
    drop(f);

    let auth = Authenticator::from_files(&doc_path, &key_path).unwrap();
    assert_eq!(auth.document().id, DID);

    let header = auth.auth_header(TARGET).unwrap();
    let verdict = Verifier::default().verify_header(&header, &doc, SERVICE).unwrap();
    assert!(verdict.is_accepted());
}

// ---------------------------------------------------------------------------
// 12. Interop Records Drive Generation
// ---------------------------------------------------------------------------

#[test]
fn records_roundtrip_and_reproduce_payload() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);
    let params = SignedParameters::for_document(&doc, SERVICE).unwrap();

    let record: AuthParamsRecord = params.to_record();
    let json = serde_json::to_string(&record).unwrap();
    let parsed: AuthParamsRecord = serde_json::from_str(&json).unwrap();
    let rebuilt = SignedParameters::from_record(&parsed);

    assert_eq!(rebuilt, params);
    assert_eq!(
        rebuilt.canonical_payload().digest().unwrap(),
        params.canonical_payload().digest().unwrap()
    );

    let header = sign_parameters(&rebuilt, &doc, &kp).unwrap();
    let record = AuthHeaderRecord {
        auth_header: header.to_string(),
    };
    let json = serde_json::to_string(&record).unwrap();
    let parsed: AuthHeaderRecord = serde_json::from_str(&json).unwrap();

    let verdict = Verifier::default()
        .verify_header(&parsed.auth_header, &doc, SERVICE)
        .unwrap();
    assert!(verdict.is_accepted());
}

// ---------------------------------------------------------------------------
// 13. JSON Twin End to End
// ---------------------------------------------------------------------------

#[test]
fn auth_json_generates_and_verifies() {
    let kp = WbaKeypair::generate();
    let doc = referenced_document(&kp, DID);

    let auth = generate_auth_json(&kp, &doc, TARGET).unwrap();
    let body = auth.to_json().unwrap();

    let verifier = Verifier::default();
    let verdict = verifier.verify_auth_json_str(&body, &doc, SERVICE).unwrap();
    assert!(verdict.is_accepted());

    // The JSON twin and the wire header are interchangeable views.
    let as_header: AuthHeader = auth.into();
    let verdict = verifier
        .verify_header(&as_header.to_string(), &doc, SERVICE)
        .unwrap();
    assert!(verdict.is_accepted());
}

// ---------------------------------------------------------------------------
// 14. Concurrent Verification
// ---------------------------------------------------------------------------

#[test]
fn verification_is_safe_across_threads() {
    use std::thread;

    let kp = WbaKeypair::generate();
    let doc = Arc::new(referenced_document(&kp, DID));
    let verifier = Arc::new(Verifier::new(VerifierConfig {
        nonce_validator: Some(Arc::new(MemoryNonceValidator::default())),
        ..VerifierConfig::default()
    }));

    let headers: Vec<String> = (0..8)
        .map(|_| generate_auth_header(&kp, &doc, TARGET).unwrap().to_string())
        .collect();

    let handles: Vec<_> = headers
        .into_iter()
        .map(|header| {
            let doc = Arc::clone(&doc);
            let verifier = Arc::clone(&verifier);
            thread::spawn(move || verifier.verify_header(&header, &doc, SERVICE).unwrap())
        })
        .collect();

    for handle in handles {
        let verdict = handle.join().expect("verification thread panicked");
        assert!(matches!(verdict, Verdict::Accepted));
    }
}
