use std::time::SystemTime;

use der::asn1::UtcTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

use crate::algorithm::SignatureAlgorithm;
use crate::csr::extensions::ExtensionParam;
use crate::error::{CsrKitError, Result};

/// Certificate fields covered by the issuer's signature, in an editable form.
///
/// Times are kept as `OffsetDateTime` and encoded as UTCTime, so anything
/// finer than a second is dropped on the way to DER.
#[derive(Debug, Clone)]
pub struct TbsCertificate {
    /// Big-endian serial number
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub not_before: time::OffsetDateTime,
    pub not_after: time::OffsetDateTime,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Always produces a v3 certificate without unique ids.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        let validity = Validity {
            not_before: utc_time(self.not_before)?,
            not_after: utc_time(self.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| CsrKitError::EncodingError(format!("serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.to_algorithm_identifier()?,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }

    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let extensions = inner
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect();

        Ok(Self {
            serial_number: inner.serial_number.as_bytes().to_vec(),
            signature_algorithm: SignatureAlgorithm::from_algorithm_identifier(&inner.signature)?,
            issuer: inner.issuer.clone(),
            not_before: offset_date_time(&inner.validity.not_before),
            not_after: offset_date_time(&inner.validity.not_after),
            subject: inner.subject.clone(),
            subject_public_key_info: inner.subject_public_key_info.clone(),
            extensions,
        })
    }
}

fn utc_time(at: time::OffsetDateTime) -> Result<Time> {
    UtcTime::from_system_time(SystemTime::from(at))
        .map(Time::UtcTime)
        .map_err(|e| CsrKitError::EncodingError(format!("validity: {e}")))
}

fn offset_date_time(at: &Time) -> time::OffsetDateTime {
    time::OffsetDateTime::from(at.to_system_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::HashAlgorithm;
    use crate::key::KeyPair;

    #[test]
    fn test_validity_is_truncated_to_seconds() {
        let not_before = time::OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_250_000_000)
            .unwrap();
        let tbs = TbsCertificate {
            serial_number: vec![0x01, 0x02],
            signature_algorithm: SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256),
            issuer: Name::default(),
            not_before,
            not_after: not_before + time::Duration::days(1),
            subject: Name::default(),
            subject_public_key_info: KeyPair::generate_ecdsa_p256().as_spki().unwrap(),
            extensions: vec![],
        };

        let inner = tbs.to_tbs_certificate_inner().unwrap();
        assert_eq!(inner.version, Version::V3);
        let decoded = TbsCertificate::from_tbs_certificate_inner(&inner).unwrap();
        assert_eq!(decoded.serial_number, vec![0x01, 0x02]);
        assert_eq!(decoded.not_before.unix_timestamp(), 1_700_000_000);
        assert_eq!(decoded.not_before.nanosecond(), 0);
        assert_eq!(decoded.not_after - decoded.not_before, time::Duration::days(1));
        assert!(decoded.extensions.is_empty());
    }
}
