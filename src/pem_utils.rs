use crate::error::{CsrKitError, Result};

pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const CERTIFICATE: &str = "CERTIFICATE";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const PUBLIC_KEY: &str = "PUBLIC KEY";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
///
/// Lines are wrapped at 64 characters and terminated with `\n`.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert a PEM‑encoded string to DER, rejecting documents whose label is not `expected`.
pub fn pem_to_der_with_label(pem_str: &str, expected: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str.trim())?;
    if pem.tag() != expected {
        return Err(CsrKitError::DecodingError(format!(
            "expected a PEM '{expected}' document, found '{}'",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}
