//! Certificate issuance from a certification request.
//!
//! The [`CertificateSigner`] trait is the opaque signing collaborator: given a
//! request and signer material it returns a PEM certificate or nothing.
//! [`LocalCertificateSigner`] implements it on top of the [`Issuer`] trait.

use der::Encode;
use der::asn1::BitString;
use log::{debug, error, info};
use rand_core::RngCore;
use sha2::Digest;
use time::{Duration, OffsetDateTime};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::algorithm::{EcCurve, HashAlgorithm, KeySpec, SignatureAlgorithm};
use crate::cert::Certificate;
use crate::csr::CertificationRequest;
use crate::csr::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption,
    ExtensionParam, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use crate::engine::{RustCryptoEngine, Signer};
use crate::error::{CsrKitError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }
}

/// Represents an entity capable of issuing certificates.
pub trait Issuer {
    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// The issuer name for a certificate whose subject is `subject`.
    fn issuer_name(&self, subject: &Name) -> Name;

    /// The public key the signing key must belong to.
    fn issuer_public_key(&self, subject_public_key: &PublicKey) -> Result<PublicKey>;

    /// Key identifier to place in the Authority Key Identifier extension.
    fn authority_key_id(&self, subject_key_id: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Whether issued certificates are CA certificates.
    fn issues_ca(&self) -> bool;

    /// Issues a certificate for the subject and public key of `request`.
    ///
    /// The request's alternative names are copied over. Key usage is
    /// digitalSignature and cRLSign, extended key usage serverAuth and clientAuth.
    fn issue(&self, request: &CertificationRequest, validity: Validity) -> Result<Certificate> {
        let subject_public_key = request.public_key()?;
        let expected = self.issuer_public_key(&subject_public_key)?;
        if self.signing_key().public_key() != expected {
            return Err(CsrKitError::CertificateError(
                "signer private key does not match the issuer public key".to_string(),
            ));
        }

        let signature_algorithm = certificate_signature_algorithm(self.signing_key());
        let subject_public_key_info = request.inner.info.public_key.clone();
        let key_bits = subject_public_key_info
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| CsrKitError::DecodingError("public key has unused bits".to_string()))?;
        let subject_key_id = sha1::Sha1::digest(key_bits).to_vec();

        let mut extensions = vec![
            ExtensionParam::from_extension(
                &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::CRLSign),
                true,
            )?,
            ExtensionParam::from_extension(
                &ExtendedKeyUsage {
                    usage: vec![
                        ExtendedKeyUsageOption::ServerAuth,
                        ExtendedKeyUsageOption::ClientAuth,
                    ],
                },
                false,
            )?,
            ExtensionParam::from_extension(
                &BasicConstraints {
                    is_ca: self.issues_ca(),
                    max_path_length: None,
                },
                true,
            )?,
            ExtensionParam::from_extension(&SubjectKeyIdentifier(subject_key_id.clone()), false)?,
        ];
        if let Some(key_identifier) = self.authority_key_id(&subject_key_id)? {
            extensions.push(ExtensionParam::from_extension(
                &AuthorityKeyIdentifier { key_identifier },
                false,
            )?);
        }
        if let Some(san) = request
            .extensions()?
            .into_iter()
            .find(|ext| ext.oid == SubjectAltName::OID)
        {
            extensions.push(san);
        }

        let tbs_cert = TbsCertificate {
            serial_number: random_serial_number(),
            signature_algorithm,
            issuer: self.issuer_name(request.subject()),
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject: request.subject().clone(),
            subject_public_key_info,
            extensions,
        };
        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;
        let signature = RustCryptoEngine.sign(&signature_algorithm, self.signing_key(), &tbs_der)?;
        debug!("Signed certificate with {signature_algorithm}");

        Ok(Certificate {
            inner: CertificateInner {
                tbs_certificate: tbs_cert_inner,
                signature_algorithm: signature_algorithm.to_algorithm_identifier()?,
                signature: BitString::from_bytes(&signature)
                    .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
            },
        })
    }
}

/// RSA keys sign with SHA-256, ECDSA keys with the hash matching their curve.
fn certificate_signature_algorithm(key: &KeyPair) -> SignatureAlgorithm {
    match key.spec() {
        KeySpec::Rsa { .. } => SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha256),
        KeySpec::Ecdsa {
            curve: EcCurve::P256,
        } => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256),
        KeySpec::Ecdsa {
            curve: EcCurve::P384,
        } => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha384),
        KeySpec::Ecdsa {
            curve: EcCurve::P521,
        } => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha512),
    }
}

/// Random positive serial below 2^127.
fn random_serial_number() -> Vec<u8> {
    let mut serial = vec![0u8; 16];
    rand_core::OsRng.fill_bytes(&mut serial);
    serial[0] &= 0x7f;
    if serial[0] == 0 {
        serial[0] = 1;
    }
    serial
}

/// Issues self-signed certificates: the issuer is the subject itself.
pub struct SelfIssuer<'a> {
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn issuer_name(&self, subject: &Name) -> Name {
        subject.clone()
    }

    fn issuer_public_key(&self, subject_public_key: &PublicKey) -> Result<PublicKey> {
        Ok(subject_public_key.clone())
    }

    fn authority_key_id(&self, subject_key_id: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(Some(subject_key_id.to_vec()))
    }

    fn issues_ca(&self) -> bool {
        true
    }
}

/// Issues certificates on behalf of an existing certificate.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn issuer_name(&self, _subject: &Name) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.subject().clone()
    }

    fn issuer_public_key(&self, _subject_public_key: &PublicKey) -> Result<PublicKey> {
        self.cert.public_key()
    }

    fn authority_key_id(&self, _subject_key_id: &[u8]) -> Result<Option<Vec<u8>>> {
        self.cert.subject_key_identifier()
    }

    fn issues_ca(&self) -> bool {
        false
    }
}

/// The X.509 signing collaborator.
///
/// Implementations report failure as `None` without further detail.
pub trait CertificateSigner {
    fn sign_certificate(
        &self,
        csr_pem: &str,
        signer_key_pem: &str,
        signer_cert_pem: Option<&str>,
        self_sign: bool,
    ) -> Option<String>;
}

/// Signs requests in-process with the RustCrypto stack.
#[derive(Debug, Clone, Copy)]
pub struct LocalCertificateSigner {
    pub validity_days: i64,
}

impl Default for LocalCertificateSigner {
    fn default() -> Self {
        Self { validity_days: 365 }
    }
}

impl LocalCertificateSigner {
    /// Like [`CertificateSigner::sign_certificate`] but keeps the failure cause.
    pub fn try_sign(
        &self,
        csr_pem: &str,
        signer_key_pem: &str,
        signer_cert_pem: Option<&str>,
        self_sign: bool,
    ) -> Result<Certificate> {
        let request = CertificationRequest::from_pem(csr_pem)?;
        request.verify()?;
        let key = KeyPair::import_from_pkcs8_pem(signer_key_pem)?;
        let validity = Validity::for_days(self.validity_days);

        if self_sign {
            SelfIssuer { key: &key }.issue(&request, validity)
        } else {
            let cert_pem = signer_cert_pem
                .filter(|pem| !pem.trim().is_empty())
                .ok_or_else(|| {
                    CsrKitError::InvalidInput(
                        "a signer certificate is required unless self-signing".to_string(),
                    )
                })?;
            let issuer = CertificateWithPrivateKey {
                cert: Certificate::from_pem(cert_pem)?,
                key,
            };
            issuer.issue(&request, validity)
        }
    }
}

impl CertificateSigner for LocalCertificateSigner {
    fn sign_certificate(
        &self,
        csr_pem: &str,
        signer_key_pem: &str,
        signer_cert_pem: Option<&str>,
        self_sign: bool,
    ) -> Option<String> {
        match self
            .try_sign(csr_pem, signer_key_pem, signer_cert_pem, self_sign)
            .and_then(|cert| cert.to_pem())
        {
            Ok(pem) => Some(pem),
            Err(e) => {
                error!("Error signing certificate: {e}");
                None
            }
        }
    }
}

/// Runs `signer` and turns its silent failure into an error.
pub fn issue_certificate<S: CertificateSigner + ?Sized>(
    signer: &S,
    csr_pem: &str,
    signer_key_pem: &str,
    signer_cert_pem: Option<&str>,
    self_sign: bool,
) -> Result<String> {
    let pem = signer
        .sign_certificate(csr_pem, signer_key_pem, signer_cert_pem, self_sign)
        .filter(|pem| !pem.is_empty())
        .ok_or_else(|| {
            CsrKitError::CertificateError("failed to sign certificate request".to_string())
        })?;
    info!("Issued certificate ({})", if self_sign { "self-signed" } else { "CA-signed" });
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::alt_name::{AltNameKind, AlternativeName, ExtensionRow};
    use crate::csr::build_csr_with;
    use crate::csr::extensions::find_extension;
    use crate::csr::params::{CsrParams, KeySource, SubjectFields};

    fn request_for(cn: &str, key: &KeyPair) -> String {
        let params = CsrParams::builder()
            .curve(match key.spec() {
                KeySpec::Ecdsa { curve } => curve,
                KeySpec::Rsa { .. } => EcCurve::P256,
            })
            .subject(SubjectFields::builder().common_name(cn).build())
            .extensions(vec![ExtensionRow::new(AltNameKind::DnsName, "www.example.com")])
            .key_source(KeySource::import(
                key.to_pkcs8_pem().unwrap(),
                key.to_public_key_pem().unwrap(),
            ))
            .build();
        build_csr_with(&RustCryptoEngine, &params)
            .unwrap()
            .request
            .to_pem()
            .unwrap()
    }

    #[test]
    fn test_self_signed_certificate() {
        let key = KeyPair::generate_ecdsa(EcCurve::P384);
        let csr = request_for("root.example.com", &key);
        let cert = LocalCertificateSigner::default()
            .try_sign(&csr, &key.to_pkcs8_pem().unwrap(), None, true)
            .unwrap();

        assert_eq!(cert.subject(), cert.issuer());
        cert.verify_signed_by(&key.public_key()).unwrap();
        let tbs = cert.tbs_certificate().unwrap();
        assert_eq!(
            tbs.signature_algorithm,
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha384)
        );
        assert!(tbs.serial_number.len() <= 16);

        let extensions = cert.extensions();
        let bc: BasicConstraints = find_extension(&extensions).unwrap().unwrap();
        assert!(bc.is_ca);
        let ski = cert.subject_key_identifier().unwrap().unwrap();
        let aki: AuthorityKeyIdentifier = find_extension(&extensions).unwrap().unwrap();
        assert_eq!(aki.key_identifier, ski);
        let san: SubjectAltName = find_extension(&extensions).unwrap().unwrap();
        assert_eq!(
            san.names,
            vec![AlternativeName::DnsName("www.example.com".to_string())]
        );
        let ku: KeyUsage = find_extension(&extensions).unwrap().unwrap();
        assert_eq!(ku, KeyUsage(KeyUsages::DigitalSignature | KeyUsages::CRLSign));
    }

    #[test]
    fn test_ca_signed_certificate() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let ca_pem = LocalCertificateSigner::default()
            .try_sign(
                &request_for("ca.example.com", &ca_key),
                &ca_key.to_pkcs8_pem().unwrap(),
                None,
                true,
            )
            .unwrap()
            .to_pem()
            .unwrap();
        let ca = Certificate::from_pem(&ca_pem).unwrap();

        let leaf_key = KeyPair::generate_ecdsa_p256();
        let leaf = LocalCertificateSigner::default()
            .try_sign(
                &request_for("leaf.example.com", &leaf_key),
                &ca_key.to_pkcs8_pem().unwrap(),
                Some(&ca_pem),
                false,
            )
            .unwrap();

        assert_eq!(leaf.issuer(), ca.subject());
        leaf.verify_signed_by(&ca_key.public_key()).unwrap();
        let bc: BasicConstraints = find_extension(&leaf.extensions()).unwrap().unwrap();
        assert!(!bc.is_ca);
        let aki: AuthorityKeyIdentifier = find_extension(&leaf.extensions()).unwrap().unwrap();
        assert_eq!(Some(aki.key_identifier), ca.subject_key_identifier().unwrap());
    }

    #[test]
    fn test_self_sign_with_foreign_key_fails() {
        let key = KeyPair::generate_ecdsa_p256();
        let other = KeyPair::generate_ecdsa_p256();
        let csr = request_for("root.example.com", &key);
        let result = LocalCertificateSigner::default().try_sign(
            &csr,
            &other.to_pkcs8_pem().unwrap(),
            None,
            true,
        );
        assert!(matches!(result, Err(CsrKitError::CertificateError(_))));
    }

    #[test]
    fn test_signer_failure_becomes_generic_error() {
        let key = KeyPair::generate_ecdsa_p256();
        let csr = request_for("leaf.example.com", &key);
        let err = issue_certificate(
            &LocalCertificateSigner::default(),
            &csr,
            &key.to_pkcs8_pem().unwrap(),
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CsrKitError::CertificateError("failed to sign certificate request".to_string())
        );
    }
}
