use std::fmt;

use der::oid::ObjectIdentifier;
use der::{Decode, Encode, EncodePem};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::algorithm::SignatureAlgorithm;
use crate::csr::alt_name::AlternativeName;
use crate::csr::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption,
    ExtensionParam, KeyUsage, SubjectAltName, SubjectKeyIdentifier, find_extension,
};
use crate::engine::{RustCryptoEngine, Verifier};
use crate::error::{CsrKitError, Result};
use crate::key::PublicKey;
use crate::pem_utils::{self, CERTIFICATE};
use crate::tbs_certificate::TbsCertificate;

/// An issued X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    /// PEM with the `CERTIFICATE` label and LF line endings.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(der::pem::LineEnding::LF)
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der_with_label(pem, CERTIFICATE)?)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect()
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(find_extension::<SubjectKeyIdentifier>(&self.extensions())?.map(|ski| ski.0))
    }

    /// Extracts the to-be-signed fields.
    pub fn tbs_certificate(&self) -> Result<TbsCertificate> {
        TbsCertificate::from_tbs_certificate_inner(&self.inner.tbs_certificate)
    }

    /// Checks the certificate signature against the issuer's public key.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm =
            SignatureAlgorithm::from_algorithm_identifier(&self.inner.signature_algorithm)?;
        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CsrKitError::DecodingError("signature has unused bits".to_string())
        })?;
        RustCryptoEngine.verify(&algorithm, issuer_key, &tbs, signature)
    }

    /// Collects what a reader wants to know about the certificate.
    ///
    /// Names are rendered as RFC 4514 strings so any attribute type can be
    /// shown. Known extensions are decoded, the rest are listed by OID.
    pub fn details(&self) -> Result<CertificateDetails> {
        let tbs = &self.inner.tbs_certificate;
        let extensions = self.extensions();
        let signature_algorithm =
            SignatureAlgorithm::from_algorithm_identifier(&self.inner.signature_algorithm)
                .map(|algorithm| algorithm.to_string())
                .unwrap_or_else(|_| self.inner.signature_algorithm.oid.to_string());
        let public_key = self
            .public_key()
            .map(|key| key.spec().to_string())
            .unwrap_or_else(|_| tbs.subject_public_key_info.algorithm.oid.to_string());

        Ok(CertificateDetails {
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial_number: tbs.serial_number.clone(),
            not_before: tbs.validity.not_before,
            not_after: tbs.validity.not_after,
            signature_algorithm,
            public_key,
            basic_constraints: find_extension::<BasicConstraints>(&extensions)?,
            key_usage: find_extension::<KeyUsage>(&extensions)?,
            extended_key_usage: find_extension::<ExtendedKeyUsage>(&extensions)?
                .map(|eku| eku.usage)
                .unwrap_or_default(),
            subject_alt_names: find_extension::<SubjectAltName>(&extensions)?
                .map(|san| san.names)
                .unwrap_or_default(),
            subject_key_identifier: find_extension::<SubjectKeyIdentifier>(&extensions)?
                .map(|ski| ski.0),
            authority_key_identifier: find_extension::<AuthorityKeyIdentifier>(&extensions)?
                .map(|aki| aki.key_identifier),
            extensions: extensions.iter().map(|ext| (ext.oid, ext.critical)).collect(),
        })
    }
}

/// Readable summary of a [`Certificate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub subject: String,
    pub issuer: String,
    pub serial_number: SerialNumber,
    pub not_before: Time,
    pub not_after: Time,
    /// Algorithm name, or the OID when it is not one csrkit signs with.
    pub signature_algorithm: String,
    /// Key type and size, or the algorithm OID for unsupported keys.
    pub public_key: String,
    pub basic_constraints: Option<BasicConstraints>,
    pub key_usage: Option<KeyUsage>,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_alt_names: Vec<AlternativeName>,
    pub subject_key_identifier: Option<Vec<u8>>,
    pub authority_key_identifier: Option<Vec<u8>>,
    /// Every extension present, by OID and criticality.
    pub extensions: Vec<(ObjectIdentifier, bool)>,
}

impl CertificateDetails {
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.is_some_and(|bc| bc.is_ca)
    }
}

impl fmt::Display for CertificateDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f, "Issuer: {}", self.issuer)?;
        writeln!(f, "Serial number: {}", self.serial_number)?;
        writeln!(f, "Not before: {}", self.not_before)?;
        writeln!(f, "Not after: {}", self.not_after)?;
        writeln!(f, "Signature algorithm: {}", self.signature_algorithm)?;
        writeln!(f, "Public key: {}", self.public_key)?;
        if let Some(bc) = self.basic_constraints {
            match bc.max_path_length {
                Some(len) => writeln!(f, "CA: {} (path length {len})", bc.is_ca)?,
                None => writeln!(f, "CA: {}", bc.is_ca)?,
            }
        }
        if let Some(KeyUsage(usages)) = self.key_usage {
            let names: Vec<String> = usages.into_iter().map(|u| format!("{u:?}")).collect();
            writeln!(f, "Key usage: {}", names.join(", "))?;
        }
        for usage in &self.extended_key_usage {
            let usage = match usage {
                ExtendedKeyUsageOption::ServerAuth => "serverAuth".to_string(),
                ExtendedKeyUsageOption::ClientAuth => "clientAuth".to_string(),
                ExtendedKeyUsageOption::Other(oid) => oid.to_string(),
            };
            writeln!(f, "Extended key usage: {usage}")?;
        }
        for name in &self.subject_alt_names {
            writeln!(f, "Alternative name: {name}")?;
        }
        if let Some(ski) = &self.subject_key_identifier {
            writeln!(f, "Subject key identifier: {}", colon_hex(ski))?;
        }
        if let Some(aki) = &self.authority_key_identifier {
            writeln!(f, "Authority key identifier: {}", colon_hex(aki))?;
        }
        for (oid, critical) in &self.extensions {
            let critical = if *critical { " (critical)" } else { "" };
            writeln!(f, "Extension: {oid}{critical}")?;
        }
        Ok(())
    }
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
