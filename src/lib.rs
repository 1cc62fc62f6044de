//! # csrkit - PKCS#10 Certificate Signing Requests in Pure Rust
//!
//! csrkit builds signed PKCS#10 certification requests from a handful of form
//! fields: a subject, a list of subject alternative names and a key choice.
//! Everything is done with the RustCrypto crates; OpenSSL and botan are only
//! used by the test suite to cross-check the output.
//!
//! ## Supported Key Types
//!
//! - **RSASSA-PKCS1-v1_5** and **RSA-PSS** (32-byte salt): any modulus length
//!   from 1024 bits up, 2048 by default
//! - **ECDSA**: P-256, P-384 and P-521 curves
//!
//! Any of these can be combined with SHA-1, SHA-256, SHA-384 or SHA-512.
//!
//! ## What a Request Contains
//!
//! - A subject built from CN, O, OU, L and C, always in that order
//! - A single `extensionRequest` attribute holding a Subject Key Identifier
//!   (SHA-1 of the SubjectPublicKeyInfo) and, when any names were given, a
//!   Subject Alternative Name extension
//! - Alternative names of type DNS, IP address, email, URL, directory name
//!   or user principal name (as an `otherName`)
//!
//! ## Quick Start
//!
//! ### Generating a Request
//!
//! ```rust,no_run
//! use csrkit::csr::alt_name::{AltNameKind, ExtensionRow};
//! use csrkit::csr::params::{CsrParams, SubjectFields};
//! use csrkit::csr::{CertificationRequest, build_csr};
//!
//! # fn main() -> Result<(), csrkit::error::CsrKitError> {
//! let subject = SubjectFields::builder()
//!     .common_name("www.example.com")
//!     .organization("Example Corp")
//!     .country("US")
//!     .build();
//!
//! let params = CsrParams::builder()
//!     .subject(subject)
//!     .extensions(vec![
//!         ExtensionRow::new(AltNameKind::DnsName, "www.example.com"),
//!         ExtensionRow::new(AltNameKind::IpAddress, "10.0.0.1"),
//!     ])
//!     .build();
//!
//! let pem = build_csr(&params)?;
//! println!("{pem}");
//!
//! // The request is self-signed with the requester's key
//! CertificationRequest::from_pem(&pem)?.verify()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Signing With Your Own Key
//!
//! ```rust,no_run
//! use csrkit::algorithm::{HashAlgorithm, KeyAlgorithm};
//! use csrkit::csr::build_csr;
//! use csrkit::csr::params::{CsrParams, KeySource};
//!
//! # fn main() -> Result<(), csrkit::error::CsrKitError> {
//! let private_key_pem = std::fs::read_to_string("key.pem").unwrap_or_default();
//! let public_key_pem = std::fs::read_to_string("pub.pem").unwrap_or_default();
//!
//! let params = CsrParams::builder()
//!     .algorithm(KeyAlgorithm::RsaPss)
//!     .hash(HashAlgorithm::Sha384)
//!     .key_source(KeySource::import(private_key_pem, public_key_pem))
//!     .build();
//!
//! let pem = build_csr(&params)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing a Certificate
//!
//! ```rust,no_run
//! use csrkit::csr::build_csr_with;
//! use csrkit::csr::params::CsrParams;
//! use csrkit::engine::RustCryptoEngine;
//! use csrkit::issuer::{LocalCertificateSigner, issue_certificate};
//!
//! # fn main() -> Result<(), csrkit::error::CsrKitError> {
//! let signed = build_csr_with(&RustCryptoEngine, &CsrParams::builder().build())?;
//! let csr_pem = signed.request.to_pem()?;
//! let key_pem = signed.key_pair.to_pkcs8_pem()?;
//!
//! let cert_pem = issue_certificate(
//!     &LocalCertificateSigner::default(),
//!     &csr_pem,
//!     &key_pem,
//!     None,
//!     true,
//! )?;
//! println!("{cert_pem}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure carries the operation it came from:
//!
//! ```rust
//! use csrkit::csr::build_csr;
//! use csrkit::csr::params::{CsrParams, KeySource};
//! use csrkit::error::CsrKitError;
//!
//! let params = CsrParams::builder()
//!     .key_source(KeySource::Import {
//!         private_key_pem: None,
//!         public_key_pem: None,
//!     })
//!     .build();
//!
//! match build_csr(&params) {
//!     Ok(pem) => println!("{pem}"),
//!     Err(CsrKitError::MissingKey { which }) => println!("no {which} given"),
//!     Err(CsrKitError::KeyImport { reason, .. }) => println!("bad key: {reason}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`csr`]: Request assembly, parsing and verification
//! - [`csr::params`]: Subject fields and distinguished names
//! - [`csr::alt_name`]: Alternative name rows and their X.509 form
//! - [`csr::extensions`]: Typed X.509 extensions
//! - [`algorithm`]: Key, hash and signature algorithm selection
//! - [`engine`]: The crypto operations a request build relies on
//! - [`key`]: Key generation, import and export
//! - [`issuer`]: Certificate issuance from a request
//! - [`cert`]: Issued certificates
//! - [`config`]: TOML request files
//! - [`validation`]: Advisory format checks for alternative names
//! - [`error`]: Error types

pub mod algorithm;
pub mod cert;
pub mod config;
pub mod csr;
pub mod engine;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod tbs_certificate;
pub mod validation;
