use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::AnyRef;
use der::{Any, Decode, Encode};
use rsa::pkcs1::{RsaPssParams, TrailerField};
use x509_cert::spki::{AlgorithmIdentifier, AlgorithmIdentifierOwned, AlgorithmIdentifierRef};

use crate::error::{CsrKitError, Result};

/// Salt length used for every RSA-PSS signature produced by this crate.
pub const PSS_SALT_LEN: usize = 32;

pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ID_RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
const ID_MGF1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.8");
const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Key algorithms a request can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    RsassaPkcs1V15,
    RsaPss,
    Ecdsa,
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsassaPkcs1V15 => "RSASSA-PKCS1-V1_5",
            KeyAlgorithm::RsaPss => "RSA-PSS",
            KeyAlgorithm::Ecdsa => "ECDSA",
        }
    }

    pub fn is_rsa(&self) -> bool {
        !matches!(self, KeyAlgorithm::Ecdsa)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CsrKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSASSA-PKCS1-V1_5" => Ok(KeyAlgorithm::RsassaPkcs1V15),
            "RSA-PSS" => Ok(KeyAlgorithm::RsaPss),
            "ECDSA" => Ok(KeyAlgorithm::Ecdsa),
            _ => Err(CsrKitError::InvalidInput(format!(
                "unsupported key algorithm '{s}', expected RSASSA-PKCS1-V1_5, RSA-PSS or ECDSA"
            ))),
        }
    }
}

/// Hash functions that can be paired with a key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// The digest algorithm OID, as used inside RSA-PSS parameters.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha1 => ObjectIdentifier::new_unwrap("1.3.14.3.2.26"),
            HashAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            HashAlgorithm::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            HashAlgorithm::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        [
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ]
        .into_iter()
        .find(|hash| hash.oid() == oid)
        .ok_or_else(|| CsrKitError::DecodingError(format!("unsupported digest algorithm {oid}")))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CsrKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "SHA-1" | "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA-256" | "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA-384" | "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA-512" | "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CsrKitError::InvalidInput(format!(
                "unsupported hash algorithm '{s}', expected SHA-1, SHA-256, SHA-384 or SHA-512"
            ))),
        }
    }
}

/// Named curves available for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub fn name(&self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    /// Size in bytes of a field element (and of a scalar) on this curve.
    pub fn field_len(&self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EcCurve {
    type Err = CsrKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P-256" | "P256" | "PRIME256V1" | "SECP256R1" => Ok(EcCurve::P256),
            "P-384" | "P384" | "SECP384R1" => Ok(EcCurve::P384),
            "P-521" | "P521" | "SECP521R1" => Ok(EcCurve::P521),
            _ => Err(CsrKitError::InvalidInput(format!(
                "unsupported curve '{s}', expected P-256, P-384 or P-521"
            ))),
        }
    }
}

/// Everything needed to generate or import a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Rsa { modulus_bits: usize },
    Ecdsa { curve: EcCurve },
}

impl KeySpec {
    /// Picks the RSA modulus length or the ECDSA curve depending on the algorithm.
    pub fn for_algorithm(algorithm: KeyAlgorithm, modulus_bits: usize, curve: EcCurve) -> Self {
        if algorithm.is_rsa() {
            KeySpec::Rsa { modulus_bits }
        } else {
            KeySpec::Ecdsa { curve }
        }
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Rsa { modulus_bits } => write!(f, "RSA-{modulus_bits}"),
            KeySpec::Ecdsa { curve } => write!(f, "ECDSA {curve}"),
        }
    }
}

/// Represents the supported signature algorithms for requests and certificates.
///
/// This enum provides a mapping to the corresponding `AlgorithmIdentifier` for each
/// algorithm, including RSASSA-PSS parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with the given digest.
    RsaPkcs1V15(HashAlgorithm),
    /// RSASSA-PSS with MGF1 over the same digest.
    RsaPss { hash: HashAlgorithm, salt_len: usize },
    /// ECDSA over a prehashed message.
    Ecdsa(HashAlgorithm),
}

impl SignatureAlgorithm {
    /// Pairs a key algorithm with a hash. PSS always uses [`PSS_SALT_LEN`].
    pub fn new(algorithm: KeyAlgorithm, hash: HashAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::RsassaPkcs1V15 => SignatureAlgorithm::RsaPkcs1V15(hash),
            KeyAlgorithm::RsaPss => SignatureAlgorithm::RsaPss {
                hash,
                salt_len: PSS_SALT_LEN,
            },
            KeyAlgorithm::Ecdsa => SignatureAlgorithm::Ecdsa(hash),
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::RsaPkcs1V15(hash) => *hash,
            SignatureAlgorithm::RsaPss { hash, .. } => *hash,
            SignatureAlgorithm::Ecdsa(hash) => *hash,
        }
    }

    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::RsaPkcs1V15(_) => KeyAlgorithm::RsassaPkcs1V15,
            SignatureAlgorithm::RsaPss { .. } => KeyAlgorithm::RsaPss,
            SignatureAlgorithm::Ecdsa(_) => KeyAlgorithm::Ecdsa,
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha1) => SHA1_WITH_RSA,
            SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha256) => SHA256_WITH_RSA,
            SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha384) => SHA384_WITH_RSA,
            SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha512) => SHA512_WITH_RSA,
            SignatureAlgorithm::RsaPss { .. } => ID_RSASSA_PSS,
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha1) => ECDSA_WITH_SHA1,
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256) => ECDSA_WITH_SHA256,
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha384) => ECDSA_WITH_SHA384,
            SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha512) => ECDSA_WITH_SHA512,
        }
    }

    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// PKCS#1 v1.5 identifiers carry an explicit NULL, ECDSA identifiers carry no
    /// parameters and RSA-PSS carries `RSASSA-PSS-params`.
    pub fn to_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = match self {
            SignatureAlgorithm::RsaPkcs1V15(_) => Some(Any::from(AnyRef::NULL)),
            SignatureAlgorithm::Ecdsa(_) => None,
            SignatureAlgorithm::RsaPss { hash, salt_len } => {
                let salt_len = u8::try_from(*salt_len).map_err(|_| {
                    CsrKitError::EncodingError(format!("PSS salt length {salt_len} too large"))
                })?;
                let digest = AlgorithmIdentifierRef {
                    oid: hash.oid(),
                    parameters: Some(AnyRef::NULL),
                };
                let params = RsaPssParams {
                    hash: digest.clone(),
                    mask_gen: AlgorithmIdentifier {
                        oid: ID_MGF1,
                        parameters: Some(digest),
                    },
                    salt_len,
                    trailer_field: TrailerField::BC,
                };
                Some(Any::from_der(&params.to_der()?)?)
            }
        };
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        })
    }

    /// Recovers the algorithm from an `AlgorithmIdentifierOwned`, reading RSA-PSS
    /// hash and salt length from its parameters.
    pub fn from_algorithm_identifier(id: &AlgorithmIdentifierOwned) -> Result<Self> {
        let algorithm = match id.oid {
            SHA1_WITH_RSA => SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha1),
            SHA256_WITH_RSA => SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha256),
            SHA384_WITH_RSA => SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha384),
            SHA512_WITH_RSA => SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha512),
            ECDSA_WITH_SHA1 => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha1),
            ECDSA_WITH_SHA256 => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256),
            ECDSA_WITH_SHA384 => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha384),
            ECDSA_WITH_SHA512 => SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha512),
            ID_RSASSA_PSS => {
                let encoded = id
                    .parameters
                    .as_ref()
                    .ok_or_else(|| {
                        CsrKitError::DecodingError("RSASSA-PSS parameters are missing".to_string())
                    })?
                    .to_der()?;
                let params = RsaPssParams::from_der(&encoded)?;
                SignatureAlgorithm::RsaPss {
                    hash: HashAlgorithm::from_oid(params.hash.oid)?,
                    salt_len: usize::from(params.salt_len),
                }
            }
            oid => {
                return Err(CsrKitError::DecodingError(format!(
                    "unsupported signature algorithm {oid}"
                )));
            }
        };
        Ok(algorithm)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key_algorithm(), self.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Tagged;

    #[test]
    fn test_parse_names_from_form_values() {
        assert_eq!(
            "RSASSA-PKCS1-V1_5".parse::<KeyAlgorithm>().unwrap(),
            KeyAlgorithm::RsassaPkcs1V15
        );
        assert_eq!("rsa-pss".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::RsaPss);
        assert_eq!("SHA-384".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha384);
        assert_eq!("P-521".parse::<EcCurve>().unwrap(), EcCurve::P521);
        assert!("DSA".parse::<KeyAlgorithm>().is_err());
        assert!("MD5".parse::<HashAlgorithm>().is_err());
        assert!("P-224".parse::<EcCurve>().is_err());
    }

    #[test]
    fn test_pss_identifier_round_trip() {
        let algorithm = SignatureAlgorithm::new(KeyAlgorithm::RsaPss, HashAlgorithm::Sha384);
        let id = algorithm.to_algorithm_identifier().unwrap();
        assert_eq!(id.oid, ID_RSASSA_PSS);
        let decoded = SignatureAlgorithm::from_algorithm_identifier(&id).unwrap();
        assert_eq!(
            decoded,
            SignatureAlgorithm::RsaPss {
                hash: HashAlgorithm::Sha384,
                salt_len: 32
            }
        );
    }

    #[test]
    fn test_pkcs1_identifier_has_null_parameters() {
        let id = SignatureAlgorithm::RsaPkcs1V15(HashAlgorithm::Sha256)
            .to_algorithm_identifier()
            .unwrap();
        assert_eq!(id.oid, const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION);
        assert_eq!(id.parameters.unwrap().tag(), der::Tag::Null);
    }

    #[test]
    fn test_ecdsa_identifier_has_no_parameters() {
        let id = SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha512)
            .to_algorithm_identifier()
            .unwrap();
        assert_eq!(id.oid, const_oid::db::rfc5912::ECDSA_WITH_SHA_512);
        assert!(id.parameters.is_none());
    }

    #[test]
    fn test_key_spec_follows_algorithm() {
        assert_eq!(
            KeySpec::for_algorithm(KeyAlgorithm::RsaPss, 3072, EcCurve::P384),
            KeySpec::Rsa { modulus_bits: 3072 }
        );
        assert_eq!(
            KeySpec::for_algorithm(KeyAlgorithm::Ecdsa, 3072, EcCurve::P384),
            KeySpec::Ecdsa {
                curve: EcCurve::P384
            }
        );
    }
}
