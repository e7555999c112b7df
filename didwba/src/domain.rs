//! # Service Domain Extraction
//!
//! Normalizes a target URL down to the bare host that gets bound into the
//! signed payload. The host — and only the host — is what a header is valid
//! for: a header minted for `api.example.com` must not verify against
//! `evil.example.net`, so the domain is part of the signature input on both
//! sides.

use thiserror::Error;

/// Errors from URL-to-domain normalization.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The URL did not contain a usable host.
    #[error("invalid URL: no service domain in {0:?}")]
    InvalidUrl(String),
}

/// Extract the bare service host from a target URL.
///
/// Strips the `http://`/`https://` scheme, then truncates at the first
/// path, port, query, or fragment delimiter. The result carries no scheme,
/// no port, no path:
///
/// ```
/// use didwba::domain::extract_service_domain;
///
/// let host = extract_service_domain("https://api.example.com:8443/v1/chat?x=1").unwrap();
/// assert_eq!(host, "api.example.com");
/// ```
///
/// A bare host is accepted as-is, so callers may pass either a full URL or
/// an already-normalized domain.
pub fn extract_service_domain(url: &str) -> Result<String, DomainError> {
    let trimmed = url.trim();

    let without_scheme = if trimmed.len() >= 8 && trimmed[..8].eq_ignore_ascii_case("https://") {
        &trimmed[8..]
    } else if trimmed.len() >= 7 && trimmed[..7].eq_ignore_ascii_case("http://") {
        &trimmed[7..]
    } else {
        trimmed
    };

    let host = match without_scheme.find(['/', ':', '?', '#']) {
        Some(idx) => &without_scheme[..idx],
        None => without_scheme,
    };

    if host.is_empty() {
        return Err(DomainError::InvalidUrl(url.to_string()));
    }

    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_path_and_query() {
        assert_eq!(
            extract_service_domain("https://api.example.com/v1/resource?q=1").unwrap(),
            "api.example.com"
        );
        assert_eq!(
            extract_service_domain("http://example.com/").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn strips_port() {
        assert_eq!(
            extract_service_domain("https://example.com:8443/api").unwrap(),
            "example.com"
        );
        assert_eq!(
            extract_service_domain("example.com:8080").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn accepts_bare_host() {
        assert_eq!(
            extract_service_domain("service.example.com").unwrap(),
            "service.example.com"
        );
    }

    #[test]
    fn scheme_case_insensitive() {
        assert_eq!(
            extract_service_domain("HTTPS://Example.com/path").unwrap(),
            "Example.com"
        );
    }

    #[test]
    fn query_without_path_is_stripped() {
        assert_eq!(
            extract_service_domain("https://example.com?token=abc").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn empty_host_rejected() {
        assert!(matches!(
            extract_service_domain("https://"),
            Err(DomainError::InvalidUrl(_))
        ));
        assert!(matches!(
            extract_service_domain(""),
            Err(DomainError::InvalidUrl(_))
        ));
        assert!(matches!(
            extract_service_domain("https:///path"),
            Err(DomainError::InvalidUrl(_))
        ));
    }
}
