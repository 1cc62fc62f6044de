use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::{Ia5String, OctetString};
use der::{Any, Tag, Tagged};
use serde::Deserialize;
use x509_cert::ext::pkix::name::{GeneralName, OtherName};

use super::params::{AttributeType, DistinguishedNameField, to_x509_name};
use crate::error::{CsrKitError, Result};
use crate::validation;

/// Microsoft user principal name, the only supported OtherName type.
pub const UPN_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2.3");

/// The row types a subject alternative name can be entered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum AltNameKind {
    #[serde(rename = "DNSName")]
    DnsName,
    #[serde(rename = "IPAddress")]
    IpAddress,
    #[serde(rename = "EmailAddress")]
    EmailAddress,
    #[serde(rename = "DirectoryName")]
    DirectoryName,
    #[serde(rename = "UniformResourceLocator")]
    UniformResourceLocator,
    #[serde(rename = "OtherName")]
    OtherName,
}

impl AltNameKind {
    pub fn name(&self) -> &'static str {
        match self {
            AltNameKind::DnsName => "DNSName",
            AltNameKind::IpAddress => "IPAddress",
            AltNameKind::EmailAddress => "EmailAddress",
            AltNameKind::DirectoryName => "DirectoryName",
            AltNameKind::UniformResourceLocator => "UniformResourceLocator",
            AltNameKind::OtherName => "OtherName",
        }
    }
}

impl fmt::Display for AltNameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AltNameKind {
    type Err = CsrKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dnsname" | "dns" => Ok(AltNameKind::DnsName),
            "ipaddress" | "ip" => Ok(AltNameKind::IpAddress),
            "emailaddress" | "email" => Ok(AltNameKind::EmailAddress),
            "directoryname" | "dirname" => Ok(AltNameKind::DirectoryName),
            "uniformresourcelocator" | "url" | "uri" => Ok(AltNameKind::UniformResourceLocator),
            "othername" | "upn" => Ok(AltNameKind::OtherName),
            _ => Err(CsrKitError::InvalidInput(format!(
                "unknown alternative name type '{s}', expected DNSName, IPAddress, EmailAddress, \
                 DirectoryName, UniformResourceLocator or OtherName"
            ))),
        }
    }
}

/// One `{type, value}` row of the alternative name table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionRow {
    #[serde(rename = "type")]
    pub kind: AltNameKind,
    pub value: String,
}

impl ExtensionRow {
    pub fn new(kind: AltNameKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Rows whose value is blank are skipped when building the extension.
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Advisory check of the value against the live-validation rules for its type.
    ///
    /// Directory and other names have no such rule and always pass.
    pub fn is_valid(&self) -> bool {
        let value = self.value.trim();
        match self.kind {
            AltNameKind::DnsName => validation::validate_dns(value),
            AltNameKind::IpAddress => validation::validate_ipv4(value),
            AltNameKind::EmailAddress => validation::validate_email(value),
            AltNameKind::UniformResourceLocator => validation::validate_url(value),
            AltNameKind::DirectoryName | AltNameKind::OtherName => true,
        }
    }

    pub fn to_alternative_name(&self) -> Result<AlternativeName> {
        AlternativeName::parse(self.kind, &self.value)
    }
}

/// Parses `Type=value`, e.g. `DNSName=www.example.com` or `DirectoryName=CN=a,O=b`.
impl FromStr for ExtensionRow {
    type Err = CsrKitError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, value) = s.split_once('=').ok_or_else(|| {
            CsrKitError::InvalidInput(format!(
                "alternative name '{s}' must be written as TYPE=VALUE"
            ))
        })?;
        Ok(Self::new(kind.parse()?, value))
    }
}

/// A typed subject alternative name, one variant per supported GeneralName.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlternativeName {
    DnsName(String),
    EmailAddress(String),
    Url(String),
    IpAddress([u8; 4]),
    DirectoryName(Vec<DistinguishedNameField>),
    /// User principal name carried in an OtherName.
    OtherName(String),
}

impl AlternativeName {
    /// Parses a row value for the given kind. Surrounding whitespace is ignored.
    pub fn parse(kind: AltNameKind, value: &str) -> Result<Self> {
        let value = value.trim();
        let name = match kind {
            AltNameKind::DnsName => AlternativeName::DnsName(value.to_string()),
            AltNameKind::EmailAddress => AlternativeName::EmailAddress(value.to_string()),
            AltNameKind::UniformResourceLocator => AlternativeName::Url(encode_uri(value)),
            AltNameKind::IpAddress => AlternativeName::IpAddress(parse_ipv4(value)?),
            AltNameKind::DirectoryName => {
                AlternativeName::DirectoryName(parse_directory_name(value)?)
            }
            AltNameKind::OtherName => AlternativeName::OtherName(value.to_string()),
        };
        Ok(name)
    }

    pub fn kind(&self) -> AltNameKind {
        match self {
            AlternativeName::DnsName(_) => AltNameKind::DnsName,
            AlternativeName::EmailAddress(_) => AltNameKind::EmailAddress,
            AlternativeName::Url(_) => AltNameKind::UniformResourceLocator,
            AlternativeName::IpAddress(_) => AltNameKind::IpAddress,
            AlternativeName::DirectoryName(_) => AltNameKind::DirectoryName,
            AlternativeName::OtherName(_) => AltNameKind::OtherName,
        }
    }

    pub fn to_general_name(&self) -> Result<GeneralName> {
        let general_name = match self {
            AlternativeName::DnsName(name) => GeneralName::DnsName(ia5(self.kind(), name)?),
            AlternativeName::EmailAddress(email) => {
                GeneralName::Rfc822Name(ia5(self.kind(), email)?)
            }
            AlternativeName::Url(url) => {
                GeneralName::UniformResourceIdentifier(ia5(self.kind(), url)?)
            }
            AlternativeName::IpAddress(octets) => GeneralName::IpAddress(
                OctetString::new(octets.to_vec())
                    .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
            ),
            AlternativeName::DirectoryName(fields) => {
                GeneralName::DirectoryName(to_x509_name(fields)?)
            }
            AlternativeName::OtherName(upn) => GeneralName::OtherName(OtherName {
                type_id: UPN_OID,
                value: Any::new(Tag::Utf8String, upn.as_bytes())
                    .map_err(|e| CsrKitError::EncodingError(e.to_string()))?,
            }),
        };
        Ok(general_name)
    }

    pub fn from_general_name(name: &GeneralName) -> Result<Self> {
        let alternative = match name {
            GeneralName::DnsName(dns) => AlternativeName::DnsName(dns.to_string()),
            GeneralName::Rfc822Name(email) => AlternativeName::EmailAddress(email.to_string()),
            GeneralName::UniformResourceIdentifier(uri) => AlternativeName::Url(uri.to_string()),
            GeneralName::IpAddress(octets) => {
                let octets = <[u8; 4]>::try_from(octets.as_bytes()).map_err(|_| {
                    CsrKitError::DecodingError(format!(
                        "IP address of {} bytes is not IPv4",
                        octets.as_bytes().len()
                    ))
                })?;
                AlternativeName::IpAddress(octets)
            }
            GeneralName::DirectoryName(dn) => {
                AlternativeName::DirectoryName(DistinguishedNameField::from_x509_name(dn)?)
            }
            GeneralName::OtherName(other) if other.type_id == UPN_OID => {
                if other.value.tag() != Tag::Utf8String {
                    return Err(CsrKitError::DecodingError(format!(
                        "user principal name is a {}, expected UTF8String",
                        other.value.tag()
                    )));
                }
                let upn = String::from_utf8(other.value.value().to_vec())
                    .map_err(|e| CsrKitError::DecodingError(e.to_string()))?;
                AlternativeName::OtherName(upn)
            }
            GeneralName::OtherName(other) => {
                return Err(CsrKitError::DecodingError(format!(
                    "unsupported other name type {}",
                    other.type_id
                )));
            }
            _ => {
                return Err(CsrKitError::DecodingError(
                    "unsupported general name type".to_string(),
                ));
            }
        };
        Ok(alternative)
    }
}

impl fmt::Display for AlternativeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlternativeName::DnsName(name) => write!(f, "DNS:{name}"),
            AlternativeName::EmailAddress(email) => write!(f, "email:{email}"),
            AlternativeName::Url(url) => write!(f, "URI:{url}"),
            AlternativeName::IpAddress([a, b, c, d]) => write!(f, "IP Address:{a}.{b}.{c}.{d}"),
            AlternativeName::DirectoryName(fields) => {
                let rendered: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(f, "DirName:{}", rendered.join(","))
            }
            AlternativeName::OtherName(upn) => write!(f, "othername:UPN:{upn}"),
        }
    }
}

fn ia5(kind: AltNameKind, value: &str) -> Result<Ia5String> {
    Ia5String::new(value).map_err(|_| {
        CsrKitError::InvalidInput(format!("{kind} value '{value}' must be ASCII"))
    })
}

/// Exactly four dot-separated decimal octets, each 0..=255.
fn parse_ipv4(value: &str) -> Result<[u8; 4]> {
    let invalid = || CsrKitError::InvalidInput(format!("invalid IPv4 address '{value}'"));
    let mut octets = [0u8; 4];
    let mut parts = value.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *octet = part.parse().map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(octets)
}

/// Parses `CN=a, O=b` into fields. Unknown types and tokens without `=` are errors.
fn parse_directory_name(value: &str) -> Result<Vec<DistinguishedNameField>> {
    value
        .split(',')
        .map(|token| {
            let (attribute, field) = token.split_once('=').ok_or_else(|| {
                CsrKitError::InvalidInput(format!(
                    "directory name component '{}' must be written as TYPE=VALUE",
                    token.trim()
                ))
            })?;
            let attribute: AttributeType = attribute.parse()?;
            let field = field.trim();
            if field.is_empty() {
                return Err(CsrKitError::InvalidInput(format!(
                    "directory name component {} has no value",
                    attribute.short_name()
                )));
            }
            Ok(DistinguishedNameField::new(attribute, field))
        })
        .collect()
}

/// Percent-encodes everything except the characters a URI may contain verbatim,
/// leaving existing reserved characters (`/`, `?`, `#`, ...) alone.
pub fn encode_uri(value: &str) -> String {
    const UNESCAPED: &[u8] = b";,/?:@&=+$-_.!~*'()#";
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || UNESCAPED.contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
