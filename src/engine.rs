//! The crypto capability the request assembler depends on.
//!
//! Key generation, key import, signing, verification and hashing are consumed
//! through these traits rather than called directly, so the assembler can be
//! exercised with a fake engine. [`RustCryptoEngine`] is the production
//! implementation on top of the RustCrypto crates.

use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::Digest;

use crate::algorithm::{EcCurve, HashAlgorithm, KeyAlgorithm, KeySpec, SignatureAlgorithm};
use crate::error::{CsrKitError, Result};
use crate::key::{KeyPair, PublicKey};

/// Produces fresh key pairs.
pub trait KeyPairGenerator {
    fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair>;
}

/// Turns caller supplied PEM text into a key pair.
pub trait KeyImporter {
    fn import_key_pair(
        &self,
        spec: &KeySpec,
        algorithm: KeyAlgorithm,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<KeyPair>;
}

/// Signs a message (not a digest) with a private key.
pub trait Signer {
    fn sign(&self, algorithm: &SignatureAlgorithm, key: &KeyPair, data: &[u8]) -> Result<Vec<u8>>;
}

/// Checks a signature over a message against a public key.
pub trait Verifier {
    fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()>;
}

pub trait Digester {
    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>>;
}

/// Everything a request build needs from the host crypto engine.
pub trait CryptoEngine: KeyPairGenerator + KeyImporter + Signer + Digester {}

impl<T> CryptoEngine for T where T: KeyPairGenerator + KeyImporter + Signer + Digester {}

/// [`CryptoEngine`] backed by the `rsa`, `p256`, `p384`, `p521`, `sha1` and `sha2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoEngine;

impl KeyPairGenerator for RustCryptoEngine {
    fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair> {
        KeyPair::generate(spec)
    }
}

impl KeyImporter for RustCryptoEngine {
    fn import_key_pair(
        &self,
        spec: &KeySpec,
        algorithm: KeyAlgorithm,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<KeyPair> {
        KeyPair::import_from_pem(spec, algorithm, private_key_pem, public_key_pem)
    }
}

impl Digester for RustCryptoEngine {
    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        let digest = match algorithm {
            HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        };
        Ok(digest)
    }
}

impl Signer for RustCryptoEngine {
    fn sign(&self, algorithm: &SignatureAlgorithm, key: &KeyPair, data: &[u8]) -> Result<Vec<u8>> {
        let hashed = self.digest(algorithm.hash(), data)?;
        match (algorithm, key) {
            (SignatureAlgorithm::RsaPkcs1V15(hash), KeyPair::Rsa { private, .. }) => {
                sign_rsa(private, pkcs1v15_scheme(*hash), &hashed)
            }
            (SignatureAlgorithm::RsaPss { hash, salt_len }, KeyPair::Rsa { private, .. }) => {
                sign_rsa(private, pss_scheme(*hash, *salt_len), &hashed)
            }
            (SignatureAlgorithm::Ecdsa(_), KeyPair::EcdsaP256 { secret }) => {
                let prehash = ecdsa_prehash(&hashed, EcCurve::P256);
                let signature: p256::ecdsa::Signature = p256::ecdsa::SigningKey::from(secret)
                    .sign_prehash(&prehash)
                    .map_err(|e| CsrKitError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (SignatureAlgorithm::Ecdsa(_), KeyPair::EcdsaP384 { secret }) => {
                let prehash = ecdsa_prehash(&hashed, EcCurve::P384);
                let signature: p384::ecdsa::Signature = p384::ecdsa::SigningKey::from(secret)
                    .sign_prehash(&prehash)
                    .map_err(|e| CsrKitError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (SignatureAlgorithm::Ecdsa(_), KeyPair::EcdsaP521 { secret }) => {
                let prehash = ecdsa_prehash(&hashed, EcCurve::P521);
                let signing_key = p521::ecdsa::SigningKey::from(
                    ecdsa::SigningKey::<p521::NistP521>::from(secret),
                );
                let signature: p521::ecdsa::Signature = signing_key
                    .sign_prehash(&prehash)
                    .map_err(|e| CsrKitError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (algorithm, key) => Err(CsrKitError::SigningError(format!(
                "{algorithm} cannot be used with a {} key",
                key.spec()
            ))),
        }
    }
}

impl Verifier for RustCryptoEngine {
    fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let hashed = self.digest(algorithm.hash(), data)?;
        let failed = |e: String| CsrKitError::VerificationError(format!("{algorithm}: {e}"));
        match (algorithm, key) {
            (SignatureAlgorithm::RsaPkcs1V15(hash), PublicKey::Rsa(public)) => {
                verify_rsa(public, pkcs1v15_scheme(*hash), &hashed, signature).map_err(failed)
            }
            (SignatureAlgorithm::RsaPss { hash, salt_len }, PublicKey::Rsa(public)) => {
                verify_rsa(public, pss_scheme(*hash, *salt_len), &hashed, signature)
                    .map_err(failed)
            }
            (SignatureAlgorithm::Ecdsa(_), PublicKey::EcdsaP256(public)) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| failed(e.to_string()))?;
                p256::ecdsa::VerifyingKey::from(public)
                    .verify_prehash(&ecdsa_prehash(&hashed, EcCurve::P256), &signature)
                    .map_err(|e| failed(e.to_string()))
            }
            (SignatureAlgorithm::Ecdsa(_), PublicKey::EcdsaP384(public)) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|e| failed(e.to_string()))?;
                p384::ecdsa::VerifyingKey::from(public)
                    .verify_prehash(&ecdsa_prehash(&hashed, EcCurve::P384), &signature)
                    .map_err(|e| failed(e.to_string()))
            }
            (SignatureAlgorithm::Ecdsa(_), PublicKey::EcdsaP521(public)) => {
                let signature = p521::ecdsa::Signature::from_der(signature)
                    .map_err(|e| failed(e.to_string()))?;
                let verifying_key = p521::ecdsa::VerifyingKey::from(
                    ecdsa::VerifyingKey::<p521::NistP521>::from(public),
                );
                verifying_key
                    .verify_prehash(&ecdsa_prehash(&hashed, EcCurve::P521), &signature)
                    .map_err(|e| failed(e.to_string()))
            }
            _ => Err(failed("algorithm does not match the public key".to_string())),
        }
    }
}

/// Left-pads a digest with zeros up to the curve's field length.
///
/// Leading zeros leave the integer value of the digest unchanged, but lift
/// SHA-1 on P-384 and SHA-1/SHA-256 on P-521 over the minimum prehash length
/// the ECDSA implementation accepts.
fn ecdsa_prehash(hashed: &[u8], curve: EcCurve) -> Vec<u8> {
    let mut prehash = vec![0u8; curve.field_len().saturating_sub(hashed.len())];
    prehash.extend_from_slice(hashed);
    prehash
}

fn pkcs1v15_scheme(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    }
}

fn pss_scheme(hash: HashAlgorithm, salt_len: usize) -> Pss {
    match hash {
        HashAlgorithm::Sha1 => Pss::new_with_salt::<sha1::Sha1>(salt_len),
        HashAlgorithm::Sha256 => Pss::new_with_salt::<sha2::Sha256>(salt_len),
        HashAlgorithm::Sha384 => Pss::new_with_salt::<sha2::Sha384>(salt_len),
        HashAlgorithm::Sha512 => Pss::new_with_salt::<sha2::Sha512>(salt_len),
    }
}

fn sign_rsa<S: rsa::traits::SignatureScheme>(
    private: &RsaPrivateKey,
    scheme: S,
    hashed: &[u8],
) -> Result<Vec<u8>> {
    let mut rng = rand_core::OsRng;
    private
        .sign_with_rng(&mut rng, scheme, hashed)
        .map_err(|e| CsrKitError::SigningError(e.to_string()))
}

fn verify_rsa<S: rsa::traits::SignatureScheme>(
    public: &RsaPublicKey,
    scheme: S,
    hashed: &[u8],
    signature: &[u8],
) -> std::result::Result<(), String> {
    public
        .verify(scheme, hashed, signature)
        .map_err(|e| e.to_string())
}
