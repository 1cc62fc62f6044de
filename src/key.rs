use std::fmt;

use der::Encode;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::algorithm::{EcCurve, ID_EC_PUBLIC_KEY, KeyAlgorithm, KeySpec, RSA_ENCRYPTION};
use crate::error::{CsrKitError, Result};
use crate::pem_utils::{self, PRIVATE_KEY, PUBLIC_KEY};

/// Supported key types for request and certificate operations.
///
/// RSA keys serve both RSASSA-PKCS1-v1_5 and RSA-PSS; the padding is a property
/// of the signature algorithm, not of the key.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        secret: p256::SecretKey,
    },
    EcdsaP384 {
        secret: p384::SecretKey,
    },
    EcdsaP521 {
        secret: p521::SecretKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("spec", &self.spec())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a key pair matching `spec`.
    pub fn generate(spec: &KeySpec) -> Result<Self> {
        match spec {
            KeySpec::Rsa { modulus_bits } => Self::generate_rsa(*modulus_bits),
            KeySpec::Ecdsa { curve } => Ok(Self::generate_ecdsa(*curve)),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CsrKitError::KeyGenerationError(format!("RSA-{bits}: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA key pair on the given curve.
    pub fn generate_ecdsa(curve: EcCurve) -> Self {
        let mut rng = rand_core::OsRng;
        match curve {
            EcCurve::P256 => KeyPair::EcdsaP256 {
                secret: p256::SecretKey::random(&mut rng),
            },
            EcCurve::P384 => KeyPair::EcdsaP384 {
                secret: p384::SecretKey::random(&mut rng),
            },
            EcCurve::P521 => KeyPair::EcdsaP521 {
                secret: p521::SecretKey::random(&mut rng),
            },
        }
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        Self::generate_ecdsa(EcCurve::P256)
    }

    /// The [`KeySpec`] this key would have been generated from.
    pub fn spec(&self) -> KeySpec {
        match self {
            KeyPair::Rsa { public, .. } => KeySpec::Rsa {
                modulus_bits: public.size() * 8,
            },
            KeyPair::EcdsaP256 { .. } => KeySpec::Ecdsa {
                curve: EcCurve::P256,
            },
            KeyPair::EcdsaP384 { .. } => KeySpec::Ecdsa {
                curve: EcCurve::P384,
            },
            KeyPair::EcdsaP521 { .. } => KeySpec::Ecdsa {
                curve: EcCurve::P521,
            },
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Exports the public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Imports a PEM PKCS#8 private key and PEM SPKI public key for the given spec.
    ///
    /// The public key must belong to the private key. Error messages name the
    /// failing half and the expected format but never echo key material.
    pub fn import_from_pem(
        spec: &KeySpec,
        algorithm: KeyAlgorithm,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self> {
        let import_error = |which: &'static str, format: &'static str, reason: String| {
            CsrKitError::KeyImport {
                which,
                format,
                algorithm: format!("{algorithm} ({spec})"),
                reason,
            }
        };

        let private_der = pem_utils::pem_to_der_with_label(private_key_pem, PRIVATE_KEY)
            .map_err(|e| import_error("private key", "PKCS#8", e.to_string()))?;
        let public_der = pem_utils::pem_to_der_with_label(public_key_pem, PUBLIC_KEY)
            .map_err(|e| import_error("public key", "SPKI", e.to_string()))?;

        let private = Self::from_pkcs8_der_for(spec, &private_der)
            .map_err(|e| import_error("private key", "PKCS#8", e))?;
        let public = PublicKey::from_spki_der_for(spec, &public_der)
            .map_err(|e| import_error("public key", "SPKI", e))?;

        if private.public_key() != public {
            return Err(import_error(
                "public key",
                "SPKI",
                "the public key does not belong to the private key".to_string(),
            ));
        }
        Ok(private)
    }

    fn from_pkcs8_der_for(spec: &KeySpec, der: &[u8]) -> std::result::Result<Self, String> {
        match spec {
            KeySpec::Rsa { .. } => {
                let private = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| e.to_string())?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            KeySpec::Ecdsa {
                curve: EcCurve::P256,
            } => p256::SecretKey::from_pkcs8_der(der)
                .map(|secret| KeyPair::EcdsaP256 { secret })
                .map_err(|e| e.to_string()),
            KeySpec::Ecdsa {
                curve: EcCurve::P384,
            } => p384::SecretKey::from_pkcs8_der(der)
                .map(|secret| KeyPair::EcdsaP384 { secret })
                .map_err(|e| e.to_string()),
            KeySpec::Ecdsa {
                curve: EcCurve::P521,
            } => p521::SecretKey::from_pkcs8_der(der)
                .map(|secret| KeyPair::EcdsaP521 { secret })
                .map_err(|e| e.to_string()),
        }
    }

    /// Imports a PEM PKCS#8 private key of any supported algorithm.
    ///
    /// The algorithm and curve are read from the key itself.
    pub fn import_from_pkcs8_pem(pem: &str) -> Result<Self> {
        let der = pem_utils::pem_to_der_with_label(pem, PRIVATE_KEY)?;
        Self::import_from_pkcs8_der(&der)
    }

    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)
            .map_err(|e| CsrKitError::DecodingError(format!("invalid PKCS#8 private key: {e}")))?;
        let candidates: &[KeySpec] = match info.algorithm.oid {
            RSA_ENCRYPTION => &[KeySpec::Rsa { modulus_bits: 0 }],
            ID_EC_PUBLIC_KEY => &[
                KeySpec::Ecdsa {
                    curve: EcCurve::P256,
                },
                KeySpec::Ecdsa {
                    curve: EcCurve::P384,
                },
                KeySpec::Ecdsa {
                    curve: EcCurve::P521,
                },
            ],
            oid => {
                return Err(CsrKitError::DecodingError(format!(
                    "unsupported private key algorithm {oid}"
                )));
            }
        };
        candidates
            .iter()
            .find_map(|spec| Self::from_pkcs8_der_for(spec, der).ok())
            .ok_or_else(|| {
                CsrKitError::DecodingError(
                    "private key uses an unsupported curve or is malformed".to_string(),
                )
            })
    }

    /// Exports the private key as a PEM PKCS#8 document.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der(),
            KeyPair::EcdsaP256 { secret } => secret.to_pkcs8_der(),
            KeyPair::EcdsaP384 { secret } => secret.to_pkcs8_der(),
            KeyPair::EcdsaP521 { secret } => secret.to_pkcs8_der(),
        }
        .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;
        Ok(pem_utils::der_to_pem(document.as_bytes(), PRIVATE_KEY))
    }

    /// Exports the public key as a PEM SPKI document.
    pub fn to_public_key_pem(&self) -> Result<String> {
        let der = self.as_spki()?.to_der()?;
        Ok(pem_utils::der_to_pem(&der, PUBLIC_KEY))
    }
}

/// The public half of a [`KeyPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    EcdsaP521(p521::PublicKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { secret } => PublicKey::EcdsaP256(secret.public_key()),
            KeyPair::EcdsaP384 { secret } => PublicKey::EcdsaP384(secret.public_key()),
            KeyPair::EcdsaP521 { secret } => PublicKey::EcdsaP521(secret.public_key()),
        }
    }

    /// Converts the key to SPKI format.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP384(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP521(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
        };
        Ok(spki)
    }

    /// DER encoding of the SPKI structure.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(public) => public.to_public_key_der(),
            PublicKey::EcdsaP256(public) => public.to_public_key_der(),
            PublicKey::EcdsaP384(public) => public.to_public_key_der(),
            PublicKey::EcdsaP521(public) => public.to_public_key_der(),
        }?;
        Ok(document.as_bytes().to_vec())
    }

    /// Reads a public key of any supported algorithm from an SPKI structure.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let candidates: &[KeySpec] = match spki.algorithm.oid {
            RSA_ENCRYPTION => &[KeySpec::Rsa { modulus_bits: 0 }],
            ID_EC_PUBLIC_KEY => &[
                KeySpec::Ecdsa {
                    curve: EcCurve::P256,
                },
                KeySpec::Ecdsa {
                    curve: EcCurve::P384,
                },
                KeySpec::Ecdsa {
                    curve: EcCurve::P521,
                },
            ],
            oid => {
                return Err(CsrKitError::DecodingError(format!(
                    "unsupported public key algorithm {oid}"
                )));
            }
        };
        candidates
            .iter()
            .find_map(|spec| Self::from_spki_der_for(spec, &der).ok())
            .ok_or_else(|| {
                CsrKitError::DecodingError(
                    "public key uses an unsupported curve or is malformed".to_string(),
                )
            })
    }

    fn from_spki_der_for(spec: &KeySpec, der: &[u8]) -> std::result::Result<Self, String> {
        match spec {
            KeySpec::Rsa { .. } => RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Rsa)
                .map_err(|e| e.to_string()),
            KeySpec::Ecdsa {
                curve: EcCurve::P256,
            } => p256::PublicKey::from_public_key_der(der)
                .map(PublicKey::EcdsaP256)
                .map_err(|e| e.to_string()),
            KeySpec::Ecdsa {
                curve: EcCurve::P384,
            } => p384::PublicKey::from_public_key_der(der)
                .map(PublicKey::EcdsaP384)
                .map_err(|e| e.to_string()),
            KeySpec::Ecdsa {
                curve: EcCurve::P521,
            } => p521::PublicKey::from_public_key_der(der)
                .map(PublicKey::EcdsaP521)
                .map_err(|e| e.to_string()),
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, PublicKey::Rsa(_))
    }

    pub fn spec(&self) -> KeySpec {
        match self {
            PublicKey::Rsa(public) => KeySpec::Rsa {
                modulus_bits: public.size() * 8,
            },
            PublicKey::EcdsaP256(_) => KeySpec::Ecdsa {
                curve: EcCurve::P256,
            },
            PublicKey::EcdsaP384(_) => KeySpec::Ecdsa {
                curve: EcCurve::P384,
            },
            PublicKey::EcdsaP521(_) => KeySpec::Ecdsa {
                curve: EcCurve::P521,
            },
        }
    }
}
