use const_oid::AssociatedOid;
use der::{Decode, Encode, asn1::OctetString, oid::ObjectIdentifier};
use x509_cert::ext::Extension;

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use super::alt_name::{AlternativeName, ExtensionRow};
use crate::algorithm::HashAlgorithm;
use crate::engine::Digester;
use crate::error::{CsrKitError, Result};

/// An extension with a typed value that maps to one OID.
///
/// ```
/// use csrkit::csr::alt_name::AlternativeName;
/// use csrkit::csr::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![AlternativeName::DnsName("example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    const OID: ObjectIdentifier;

    /// DER of the `extnValue` contents.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// An extension in its untyped form, as carried in a request or certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Wraps a typed extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: &E,
        critical: bool,
    ) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes the value as a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(CsrKitError::DecodingError(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509_extension(&self) -> Result<Extension> {
        Ok(Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())
                .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
        })
    }

    pub fn from_x509_extension(extension: &Extension) -> Self {
        Self {
            oid: extension.extn_id,
            critical: extension.critical,
            value: extension.extn_value.as_bytes().to_vec(),
        }
    }
}

/// Finds and decodes the first extension of type `E`.
pub fn find_extension<E: ToAndFromX509Extension>(
    extensions: &[ExtensionParam],
) -> Result<Option<E>> {
    extensions
        .iter()
        .find(|ext| ext.oid == E::OID)
        .map(ExtensionParam::to_extension)
        .transpose()
}

/// Subject Key Identifier: the raw key id bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let key_id = OctetString::new(self.0.clone())
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))?;
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(key_id);
        ski.to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Subject Alternative Name, names kept in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<AlternativeName>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(AlternativeName::to_general_name)
                .collect::<Result<Vec<_>>>()?,
        );
        san.to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(AlternativeName::from_general_name)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Basic Constraints, only placed on issued certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };
        bc.to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        X509KeyUsage::from(self.0)
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        x509_cert::ext::pkix::ExtendedKeyUsage(oids)
            .to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .into_iter()
            .map(ExtendedKeyUsageOption::from)
            .collect();
        Ok(Self { usage })
    }
}

/// Key purposes; anything unnamed is kept by OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    Other(ObjectIdentifier),
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            const_oid::db::rfc5912::ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            oid => ExtendedKeyUsageOption::Other(oid),
        }
    }
}

/// Authority Key Identifier in its key identifier form only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(
                OctetString::new(self.key_identifier.as_slice())
                    .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
            ),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        aki.to_der()
            .map_err(|e| CsrKitError::EncodingError(e.to_string()))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let key_identifier = aki.key_identifier.ok_or_else(|| {
            CsrKitError::DecodingError("authority key identifier has no key identifier".to_string())
        })?;
        Ok(Self {
            key_identifier: key_identifier.as_bytes().to_vec(),
        })
    }
}

/// Builds the non-critical Subject Key Identifier extension.
///
/// The identifier is SHA-1 over `spki_der`, the complete DER encoded
/// `SubjectPublicKeyInfo`. Digest failures are returned unchanged.
pub fn build_subject_key_identifier<D: Digester + ?Sized>(
    digester: &D,
    spki_der: &[u8],
) -> Result<ExtensionParam> {
    let key_id = digester.digest(HashAlgorithm::Sha1, spki_der)?;
    ExtensionParam::from_extension(&SubjectKeyIdentifier(key_id), false)
}

/// Builds the non-critical Subject Alternative Name extension from table rows.
///
/// Blank rows are dropped first. Returns `None` when nothing is left, since
/// an extension with no names must not be emitted. A row that cannot be
/// parsed, such as a malformed IP address, fails the whole extension.
pub fn build_subject_alt_names(rows: &[ExtensionRow]) -> Result<Option<ExtensionParam>> {
    let names = rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(ExtensionRow::to_alternative_name)
        .collect::<Result<Vec<_>>>()?;
    if names.is_empty() {
        return Ok(None);
    }
    ExtensionParam::from_extension(&SubjectAltName { names }, false).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::alt_name::AltNameKind;
    use crate::engine::RustCryptoEngine;

    #[test]
    fn test_empty_rows_produce_no_extension() {
        assert_eq!(build_subject_alt_names(&[]).unwrap(), None);
        let blank = [ExtensionRow::new(AltNameKind::DnsName, "  ")];
        assert_eq!(build_subject_alt_names(&blank).unwrap(), None);
    }

    #[test]
    fn test_ip_row_encodes_four_bytes() {
        let rows = [ExtensionRow::new(AltNameKind::IpAddress, "10.0.0.1")];
        let ext = build_subject_alt_names(&rows).unwrap().unwrap();
        assert_eq!(ext.oid, const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME);
        assert!(!ext.critical);
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(&ext.value).unwrap();
        assert_eq!(san.0.len(), 1);
        match &san.0[0] {
            x509_cert::ext::pkix::name::GeneralName::IpAddress(octets) => {
                assert_eq!(octets.as_bytes(), &[10, 0, 0, 1])
            }
            other => panic!("unexpected general name {other:?}"),
        }
    }

    #[test]
    fn test_bad_ip_row_fails_the_extension() {
        let rows = [
            ExtensionRow::new(AltNameKind::DnsName, "www.example.com"),
            ExtensionRow::new(AltNameKind::IpAddress, "10.0.0.999"),
        ];
        assert!(build_subject_alt_names(&rows).is_err());
    }

    #[test]
    fn test_other_name_row_produces_extension() {
        let rows = [ExtensionRow::new(AltNameKind::OtherName, "alice@corp.example")];
        let ext = build_subject_alt_names(&rows).unwrap().unwrap();
        let san: SubjectAltName = ext.to_extension().unwrap();
        assert_eq!(
            san.names,
            vec![AlternativeName::OtherName("alice@corp.example".to_string())]
        );
    }

    #[test]
    fn test_rows_keep_their_order() {
        let rows = [
            ExtensionRow::new(AltNameKind::EmailAddress, "ops@example.com"),
            ExtensionRow::new(AltNameKind::DnsName, ""),
            ExtensionRow::new(AltNameKind::DnsName, "example.com"),
            ExtensionRow::new(AltNameKind::UniformResourceLocator, "https://example.com"),
        ];
        let ext = build_subject_alt_names(&rows).unwrap().unwrap();
        let kinds: Vec<_> = ext
            .to_extension::<SubjectAltName>()
            .unwrap()
            .names
            .iter()
            .map(AlternativeName::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AltNameKind::EmailAddress,
                AltNameKind::DnsName,
                AltNameKind::UniformResourceLocator
            ]
        );
    }

    #[test]
    fn test_subject_key_identifier_is_sha1_of_input() {
        let ext = build_subject_key_identifier(&RustCryptoEngine, b"abc").unwrap();
        assert_eq!(ext.oid, const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER);
        assert!(!ext.critical);
        let ski: SubjectKeyIdentifier = ext.to_extension().unwrap();
        assert_eq!(
            ski.0,
            vec![
                0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
                0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d
            ]
        );
    }

    #[test]
    fn test_to_extension_checks_oid() {
        let ext =
            ExtensionParam::from_extension(&SubjectKeyIdentifier(vec![1, 2, 3]), false).unwrap();
        assert!(ext.to_extension::<AuthorityKeyIdentifier>().is_err());
    }

    #[test]
    fn test_leaf_basic_constraints_omit_path_length() {
        let leaf = BasicConstraints::default();
        let param = ExtensionParam::from_extension(&leaf, true).unwrap();
        // SEQUENCE {} since cA FALSE is the DEFAULT
        assert_eq!(param.value, vec![0x30, 0x00]);
        assert_eq!(param.to_extension::<BasicConstraints>().unwrap(), leaf);
    }

    #[test]
    fn test_key_usage_and_extended_key_usage() {
        let ku = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::CRLSign);
        let decoded = KeyUsage::from_x509_extension_value(&ku.to_x509_extension_value().unwrap())
            .unwrap();
        assert_eq!(ku, decoded);

        let eku = ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::Other(const_oid::db::rfc5912::ID_KP_CODE_SIGNING),
            ],
        };
        let decoded =
            ExtendedKeyUsage::from_x509_extension_value(&eku.to_x509_extension_value().unwrap())
                .unwrap();
        assert_eq!(eku, decoded);
    }
}
