//! Error type shared by every csrkit operation.

use thiserror::Error;

/// Represents errors that can occur while building, verifying or signing requests.
///
/// Every failure is local to one build; no partial request is ever returned
/// alongside an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsrKitError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Import mode was selected but one half of the key pair was not supplied.
    #[error("Missing {which}: both a PKCS#8 private key and an SPKI public key are required to import a key pair")]
    MissingKey { which: &'static str },

    /// The host crypto engine refused to import a key.
    #[error("importKey: failed to import {which} ({reason}); check that the key is PEM encoded ({format}) and matches the selected {algorithm} algorithm")]
    KeyImport {
        which: &'static str,
        format: &'static str,
        algorithm: String,
        reason: String,
    },

    /// Error during key generation.
    #[error("generateKey: {0}")]
    KeyGenerationError(String),

    /// Error while producing a signature.
    #[error("sign: {0}")]
    SigningError(String),

    /// Error while computing a digest.
    #[error("digest: {0}")]
    DigestError(String),

    /// A signature did not verify.
    #[error("verify: {0}")]
    VerificationError(String),

    /// The certificate signer could not produce a certificate.
    #[error("Certificate error: {0}")]
    CertificateError(String),
}

pub type Result<T> = std::result::Result<T, CsrKitError>;

impl From<der::Error> for CsrKitError {
    /// Converts a `der::Error` into a `CsrKitError`.
    fn from(err: der::Error) -> Self {
        CsrKitError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CsrKitError {
    fn from(err: pem::PemError) -> Self {
        CsrKitError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CsrKitError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CsrKitError::EncodingError(err.to_string())
    }
}
