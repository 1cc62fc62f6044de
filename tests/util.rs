#![allow(dead_code)]

use csrkit::csr::alt_name::{AltNameKind, ExtensionRow};
use csrkit::csr::params::{CsrParams, SubjectFields};
use csrkit::csr::{SignedRequest, build_csr_with};
use csrkit::engine::RustCryptoEngine;
use csrkit::issuer::{CertificateWithPrivateKey, Issuer, SelfIssuer, Validity};

/// A request with a full subject and one alternative name of every kind.
pub fn full_params() -> CsrParams {
    CsrParams::builder()
        .subject(
            SubjectFields::builder()
                .common_name("test.example.com")
                .organization("Evil Corp")
                .organizational_unit("Platform")
                .locality("Springfield")
                .country("US")
                .build(),
        )
        .extensions(alt_name_rows())
        .build()
}

pub fn alt_name_rows() -> Vec<ExtensionRow> {
    vec![
        ExtensionRow::new(AltNameKind::DnsName, "www.example.com"),
        ExtensionRow::new(AltNameKind::IpAddress, "10.0.0.1"),
        ExtensionRow::new(AltNameKind::EmailAddress, "admin@example.com"),
        ExtensionRow::new(AltNameKind::UniformResourceLocator, "https://example.com/path"),
        ExtensionRow::new(AltNameKind::DirectoryName, "CN=dir.example.com, O=Evil Corp"),
        ExtensionRow::new(AltNameKind::OtherName, "user@example.com"),
    ]
}

pub fn build(params: &CsrParams) -> SignedRequest {
    build_csr_with(&RustCryptoEngine, params).expect("Failed to build request")
}

/// Self-signs a request for `myca.local` and keeps its key.
pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    let params = CsrParams::builder()
        .subject(SubjectFields::builder().common_name("myca.local").build())
        .build();
    let signed = build(&params);
    let cert = SelfIssuer {
        key: &signed.key_pair,
    }
    .issue(&signed.request, Validity::for_days(365))
    .expect("Failed to self-sign CA certificate");

    CertificateWithPrivateKey {
        cert,
        key: signed.key_pair,
    }
}
