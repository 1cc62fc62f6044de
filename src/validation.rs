//! Live-validation predicates for subject alternative name values.
//!
//! These only advise: a request is still built when a value fails them, as
//! long as the value can be encoded.

use std::sync::LazyLock;

use regex::Regex;

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9](?:\.[a-zA-Z]{2,})+$")
        .unwrap_or_else(|e| panic!("invalid DNS name pattern: {e}"))
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .unwrap_or_else(|e| panic!("invalid e-mail pattern: {e}"))
});

// scheme ":" followed by at least one non-space character
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:\S+$")
        .unwrap_or_else(|e| panic!("invalid URL pattern: {e}"))
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$")
        .unwrap_or_else(|e| panic!("invalid IPv4 pattern: {e}"))
});

pub fn validate_dns(value: &str) -> bool {
    DNS_NAME.is_match(value)
}

pub fn validate_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Accepts anything with a scheme, like `https://example.com` or `urn:isbn:0451450523`.
pub fn validate_url(value: &str) -> bool {
    URL.is_match(value)
}

/// Dotted quad with octets 0..=255. A leading `0` is refused, so `0.0.0.0`
/// and zero-padded first octets fail.
pub fn validate_ipv4(value: &str) -> bool {
    !value.starts_with('0') && IPV4.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns() {
        assert!(validate_dns("example.com"));
        assert!(validate_dns("www-1.example.co"));
        assert!(!validate_dns("localhost"));
        assert!(!validate_dns("-bad.example.com"));
        assert!(!validate_dns("a.example.com"));
    }

    #[test]
    fn test_email() {
        assert!(validate_email("user@example.com"));
        assert!(!validate_email("user@example"));
        assert!(!validate_email("us er@example.com"));
    }

    #[test]
    fn test_url() {
        assert!(validate_url("https://example.com/path?q=1"));
        assert!(validate_url("urn:isbn:0451450523"));
        assert!(!validate_url("example.com"));
        assert!(!validate_url("https://exa mple.com"));
    }

    #[test]
    fn test_ipv4() {
        assert!(validate_ipv4("10.0.0.1"));
        assert!(validate_ipv4("255.255.255.255"));
        assert!(!validate_ipv4("10.0.0.999"));
        assert!(!validate_ipv4("10.0.0"));
        assert!(!validate_ipv4("10.0.0.1."));
        assert!(!validate_ipv4("0.1.2.3"));
    }
}
