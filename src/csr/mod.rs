pub mod alt_name;
pub mod extensions;
pub mod params;

use base64::Engine as _;
use const_oid::AssociatedOid;
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use log::{debug, info, warn};
use x509_cert::attr::Attribute;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::algorithm::{KeySpec, SignatureAlgorithm};
use crate::engine::{CryptoEngine, RustCryptoEngine, Verifier};
use crate::error::{CsrKitError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{self, CERTIFICATE_REQUEST};
use alt_name::AlternativeName;
use extensions::{
    ExtensionParam, SubjectAltName, SubjectKeyIdentifier, build_subject_alt_names,
    build_subject_key_identifier, find_extension,
};
use params::{CsrParams, DistinguishedNameField, KeySource, build_subject, to_x509_name};

/// A freshly built request together with the key that signed it.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub request: CertificationRequest,
    pub key_pair: KeyPair,
}

/// Builds a signed request with the default engine and returns it as PEM.
pub fn build_csr(params: &CsrParams) -> Result<String> {
    build_csr_with(&RustCryptoEngine, params)?.request.to_pem()
}

/// Builds and signs a request using `engine` for every crypto operation.
///
/// The build is all or nothing: on error no request is produced. In import
/// mode a missing key is reported before the engine is touched.
pub fn build_csr_with<E: CryptoEngine + ?Sized>(
    engine: &E,
    params: &CsrParams,
) -> Result<SignedRequest> {
    let spec = params.key_spec();
    let signature_algorithm = params.signature_algorithm();
    debug!("Building certificate request: {signature_algorithm}, {spec}");

    let key_pair = obtain_key_pair(engine, params, &spec)?;
    let public_key_info = key_pair.as_spki()?;
    let spki_der = public_key_info
        .to_der()
        .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;

    let subject = to_x509_name(&build_subject(&params.subject))?;

    for row in params
        .extensions
        .iter()
        .filter(|row| !row.is_empty() && !row.is_valid())
    {
        warn!("{} value '{}' does not look valid", row.kind, row.value.trim());
    }

    let mut extensions = vec![build_subject_key_identifier(engine, &spki_der)?];
    if let Some(san) = build_subject_alt_names(&params.extensions)? {
        extensions.push(san);
    }
    debug!("Requesting {} extension(s)", extensions.len());

    let info = CertReqInfo {
        version: Version::V1,
        subject,
        public_key: public_key_info,
        attributes: extension_request(&extensions)?,
    };
    let tbs = info
        .to_der()
        .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;

    let signature = engine
        .sign(&signature_algorithm, &key_pair, &tbs)
        .map_err(|e| match e {
            CsrKitError::SigningError(_) => e,
            other => CsrKitError::SigningError(other.to_string()),
        })?;

    let request = CertificationRequest {
        inner: CertReq {
            info,
            algorithm: signature_algorithm.to_algorithm_identifier()?,
            signature: BitString::from_bytes(&signature)
                .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
        },
    };
    info!("Built {signature_algorithm} certificate request");
    Ok(SignedRequest { request, key_pair })
}

fn obtain_key_pair<E: CryptoEngine + ?Sized>(
    engine: &E,
    params: &CsrParams,
    spec: &KeySpec,
) -> Result<KeyPair> {
    match &params.key_source {
        KeySource::Generate => {
            debug!("Generating {spec} key pair");
            engine.generate_key_pair(spec).map_err(|e| match e {
                CsrKitError::KeyGenerationError(_) => e,
                other => CsrKitError::KeyGenerationError(other.to_string()),
            })
        }
        KeySource::Import {
            private_key_pem,
            public_key_pem,
        } => {
            let private_key_pem = present(private_key_pem, "private key")?;
            let public_key_pem = present(public_key_pem, "public key")?;
            debug!("Importing {spec} key pair");
            engine
                .import_key_pair(spec, params.algorithm, private_key_pem, public_key_pem)
                .map_err(|e| match e {
                    CsrKitError::KeyImport { .. } => e,
                    other => CsrKitError::KeyImport {
                        which: "key pair",
                        format: "PKCS#8 / SPKI",
                        algorithm: format!("{} ({spec})", params.algorithm),
                        reason: other.to_string(),
                    },
                })
        }
    }
}

fn present<'a>(pem: &'a Option<String>, which: &'static str) -> Result<&'a str> {
    match pem.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CsrKitError::MissingKey { which }),
    }
}

/// Wraps the extensions in the single PKCS#9 extensionRequest attribute.
fn extension_request(extensions: &[ExtensionParam]) -> Result<SetOfVec<Attribute>> {
    let request = ExtensionReq(
        extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?,
    );
    let encode = |e: der::Error| CsrKitError::EncodingError(e.to_string());
    let value = Any::from_der(&request.to_der().map_err(encode)?)?;
    let attribute = Attribute {
        oid: ExtensionReq::OID,
        values: SetOfVec::try_from(vec![value]).map_err(encode)?,
    };
    SetOfVec::try_from(vec![attribute]).map_err(encode)
}

/// A signed PKCS#10 certification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationRequest {
    pub inner: CertReq,
}

impl CertificationRequest {
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    /// PEM with the `CERTIFICATE REQUEST` label, wrapped at 64 columns.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, CERTIFICATE_REQUEST))
    }

    /// Unwrapped base64 of the DER encoding.
    pub fn to_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_der()?))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der_with_label(pem, CERTIFICATE_REQUEST)?)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject_fields(&self) -> Result<Vec<DistinguishedNameField>> {
        DistinguishedNameField::from_x509_name(self.subject())
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.inner.algorithm)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// The extensions carried in the extensionRequest attribute, if any.
    pub fn extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self
            .inner
            .info
            .attributes
            .iter()
            .filter(|attribute| attribute.oid == ExtensionReq::OID)
        {
            for value in attribute.values.iter() {
                let request = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(request.0.iter().map(ExtensionParam::from_x509_extension));
            }
        }
        Ok(extensions)
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(find_extension::<SubjectKeyIdentifier>(&self.extensions()?)?.map(|ski| ski.0))
    }

    /// The requested alternative names; empty when no SAN extension is present.
    pub fn subject_alt_names(&self) -> Result<Vec<AlternativeName>> {
        Ok(find_extension::<SubjectAltName>(&self.extensions()?)?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    /// Checks the self-signature against the embedded public key.
    pub fn verify(&self) -> Result<()> {
        self.verify_with(&RustCryptoEngine)
    }

    pub fn verify_with<V: Verifier + ?Sized>(&self, verifier: &V) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        let public_key = self.public_key()?;
        let tbs = self
            .inner
            .info
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CsrKitError::DecodingError("signature has unused bits".to_string())
        })?;
        verifier.verify(&algorithm, &public_key, &tbs, signature)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::algorithm::{EcCurve, HashAlgorithm, KeyAlgorithm};
    use crate::engine::{Digester, KeyImporter, KeyPairGenerator, Signer};
    use alt_name::{AltNameKind, ExtensionRow};
    use params::{AttributeType, SubjectFields};

    /// Counts engine calls and fails the ones it is told to.
    #[derive(Default)]
    struct FakeEngine {
        calls: Cell<usize>,
        fail_sign: bool,
        fail_generate: bool,
    }

    impl FakeEngine {
        fn record(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl KeyPairGenerator for FakeEngine {
        fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair> {
            self.record();
            if self.fail_generate {
                return Err(CsrKitError::InvalidInput("unsupported curve".to_string()));
            }
            RustCryptoEngine.generate_key_pair(spec)
        }
    }

    impl KeyImporter for FakeEngine {
        fn import_key_pair(
            &self,
            spec: &KeySpec,
            algorithm: KeyAlgorithm,
            private_key_pem: &str,
            public_key_pem: &str,
        ) -> Result<KeyPair> {
            self.record();
            RustCryptoEngine.import_key_pair(spec, algorithm, private_key_pem, public_key_pem)
        }
    }

    impl Signer for FakeEngine {
        fn sign(
            &self,
            algorithm: &SignatureAlgorithm,
            key: &KeyPair,
            data: &[u8],
        ) -> Result<Vec<u8>> {
            self.record();
            if self.fail_sign {
                return Err(CsrKitError::InvalidInput("operation rejected".to_string()));
            }
            RustCryptoEngine.sign(algorithm, key, data)
        }
    }

    impl Digester for FakeEngine {
        fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
            self.record();
            RustCryptoEngine.digest(algorithm, data)
        }
    }

    fn common_name(cn: &str) -> SubjectFields {
        SubjectFields::builder().common_name(cn).build()
    }

    #[test]
    fn test_ecdsa_p256_round_trip() {
        let params = CsrParams::builder()
            .subject(common_name("test.example.com"))
            .build();
        let pem = build_csr(&params).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----\n"));

        let request = CertificationRequest::from_pem(&pem).unwrap();
        assert_eq!(request.subject().0.len(), 1);
        assert_eq!(
            request.subject_fields().unwrap(),
            vec![DistinguishedNameField::new(
                AttributeType::CommonName,
                "test.example.com"
            )]
        );
        assert_eq!(
            request.signature_algorithm().unwrap(),
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256)
        );
        request.verify().unwrap();
    }

    #[test]
    fn test_subject_key_identifier_is_sha1_of_spki() {
        let signed = build_csr_with(&RustCryptoEngine, &CsrParams::builder().build()).unwrap();
        let spki_der = signed.key_pair.public_key().to_spki_der().unwrap();
        let expected = RustCryptoEngine
            .digest(HashAlgorithm::Sha1, &spki_der)
            .unwrap();
        assert_eq!(
            signed.request.subject_key_identifier().unwrap(),
            Some(expected)
        );
        assert!(signed.request.subject_alt_names().unwrap().is_empty());
        assert_eq!(signed.request.extensions().unwrap().len(), 1);
    }

    #[test]
    fn test_two_builds_differ_but_both_verify() {
        let params = CsrParams::builder()
            .subject(common_name("same.example.com"))
            .build();
        let first = build_csr(&params).unwrap();
        let second = build_csr(&params).unwrap();
        assert_ne!(first, second);
        for pem in [first, second] {
            CertificationRequest::from_pem(&pem).unwrap().verify().unwrap();
        }
    }

    #[test]
    fn test_rsa_pss_end_to_end() {
        let params = CsrParams::builder()
            .algorithm(KeyAlgorithm::RsaPss)
            .hash(HashAlgorithm::Sha256)
            .modulus_length(2048)
            .subject(
                SubjectFields::builder()
                    .common_name("Evil Corp Root")
                    .organization("Evil Corp")
                    .country("US")
                    .build(),
            )
            .extensions(vec![ExtensionRow::new(
                AltNameKind::DnsName,
                "evil.example.com",
            )])
            .build();
        let request = CertificationRequest::from_pem(&build_csr(&params).unwrap()).unwrap();

        let order: Vec<_> = request
            .subject_fields()
            .unwrap()
            .into_iter()
            .map(|f| f.attribute)
            .collect();
        assert_eq!(
            order,
            vec![
                AttributeType::CommonName,
                AttributeType::Organization,
                AttributeType::Country
            ]
        );
        assert_eq!(
            request.subject_alt_names().unwrap(),
            vec![AlternativeName::DnsName("evil.example.com".to_string())]
        );
        assert_eq!(
            request.signature_algorithm().unwrap(),
            SignatureAlgorithm::RsaPss {
                hash: HashAlgorithm::Sha256,
                salt_len: 32
            }
        );
        request.verify().unwrap();
    }

    #[test]
    fn test_import_mode_reports_missing_key_before_any_engine_call() {
        let engine = FakeEngine::default();
        for (private, public, which) in [
            (None, Some("pub".to_string()), "private key"),
            (Some("  ".to_string()), Some("pub".to_string()), "private key"),
            (Some("priv".to_string()), None, "public key"),
        ] {
            let params = CsrParams::builder()
                .key_source(KeySource::Import {
                    private_key_pem: private,
                    public_key_pem: public,
                })
                .build();
            let err = build_csr_with(&engine, &params).unwrap_err();
            assert_eq!(err, CsrKitError::MissingKey { which });
        }
        assert_eq!(engine.calls.get(), 0);
    }

    #[test]
    fn test_import_mode_uses_supplied_key() {
        let key_pair = KeyPair::generate_ecdsa(EcCurve::P384);
        let params = CsrParams::builder()
            .curve(EcCurve::P384)
            .hash(HashAlgorithm::Sha384)
            .key_source(KeySource::import(
                key_pair.to_pkcs8_pem().unwrap(),
                key_pair.to_public_key_pem().unwrap(),
            ))
            .build();
        let signed = build_csr_with(&RustCryptoEngine, &params).unwrap();
        assert_eq!(signed.request.public_key().unwrap(), key_pair.public_key());
        signed.request.verify().unwrap();
    }

    #[test]
    fn test_import_mismatch_is_a_key_import_error() {
        let key_pair = KeyPair::generate_ecdsa_p256();
        let params = CsrParams::builder()
            .algorithm(KeyAlgorithm::RsassaPkcs1V15)
            .key_source(KeySource::import(
                key_pair.to_pkcs8_pem().unwrap(),
                key_pair.to_public_key_pem().unwrap(),
            ))
            .build();
        let err = build_csr(&params).unwrap_err();
        assert!(matches!(err, CsrKitError::KeyImport { .. }));
        assert!(err.to_string().starts_with("importKey: "));
    }

    #[test]
    fn test_engine_failures_carry_the_operation_name() {
        let engine = FakeEngine {
            fail_sign: true,
            ..FakeEngine::default()
        };
        let err = build_csr_with(&engine, &CsrParams::builder().build()).unwrap_err();
        assert!(matches!(err, CsrKitError::SigningError(_)));
        assert!(err.to_string().starts_with("sign: "));

        let engine = FakeEngine {
            fail_generate: true,
            ..FakeEngine::default()
        };
        let err = build_csr_with(&engine, &CsrParams::builder().build()).unwrap_err();
        assert!(err.to_string().starts_with("generateKey: "));
        assert_eq!(engine.calls.get(), 1);
    }

    #[test]
    fn test_bad_san_row_aborts_the_build() {
        let params = CsrParams::builder()
            .extensions(vec![ExtensionRow::new(AltNameKind::IpAddress, "10.0.0.999")])
            .build();
        assert!(matches!(
            build_csr(&params),
            Err(CsrKitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tampered_request_fails_verification() {
        let signed = build_csr_with(&RustCryptoEngine, &CsrParams::builder().build()).unwrap();
        let mut request = signed.request;
        request.inner.info.subject = to_x509_name(&[DistinguishedNameField::new(
            AttributeType::CommonName,
            "tampered",
        )])
        .unwrap();
        assert!(matches!(
            request.verify(),
            Err(CsrKitError::VerificationError(_))
        ));
    }

    #[test]
    fn test_base64_matches_pem_body() {
        let signed = build_csr_with(&RustCryptoEngine, &CsrParams::builder().build()).unwrap();
        let pem = signed.request.to_pem().unwrap();
        let body: String = pem.lines().filter(|l| !l.starts_with("-----")).collect();
        assert_eq!(signed.request.to_base64().unwrap(), body);
    }
}
