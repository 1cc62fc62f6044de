//! TOML request files.
//!
//! ```toml
//! algorithm = "RSA-PSS"
//! hash = "SHA-256"
//! modulus_length = 3072
//!
//! [subject]
//! common_name = "test.example.com"
//! country = "US"
//!
//! [[extensions]]
//! type = "DNSName"
//! value = "www.example.com"
//!
//! [key]
//! private_key_file = "key.pem"
//! public_key_file = "pub.pem"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::csr::alt_name::ExtensionRow;
use crate::csr::params::{CsrParams, KeySource, SubjectFields};
use crate::error::{CsrKitError, Result};

/// A request description as read from a TOML file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    pub algorithm: Option<String>,
    pub hash: Option<String>,
    pub curve: Option<String>,
    pub modulus_length: Option<usize>,
    pub subject: SubjectFields,
    pub extensions: Vec<ExtensionRow>,
    /// Import these keys instead of generating a pair.
    pub key: Option<KeyFiles>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyFiles {
    pub private_key_file: Option<PathBuf>,
    pub public_key_file: Option<PathBuf>,
}

impl RequestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| CsrKitError::InvalidInput(format!("invalid request file: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CsrKitError::InvalidInput(format!("can't read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolves names and reads key files. Relative key paths are taken
    /// relative to `base_dir`.
    pub fn to_params(&self, base_dir: &Path) -> Result<CsrParams> {
        let key_source = match &self.key {
            None => KeySource::Generate,
            Some(files) => KeySource::Import {
                private_key_pem: read_key(base_dir, files.private_key_file.as_deref())?,
                public_key_pem: read_key(base_dir, files.public_key_file.as_deref())?,
            },
        };

        let mut params = CsrParams::builder()
            .subject(self.subject.clone())
            .extensions(self.extensions.clone())
            .key_source(key_source)
            .build();
        if let Some(algorithm) = &self.algorithm {
            params.algorithm = algorithm.parse()?;
        }
        if let Some(hash) = &self.hash {
            params.hash = hash.parse()?;
        }
        if let Some(curve) = &self.curve {
            params.curve = curve.parse()?;
        }
        if let Some(modulus_length) = self.modulus_length {
            params.modulus_length = modulus_length;
        }
        Ok(params)
    }
}

fn read_key(base_dir: &Path, file: Option<&Path>) -> Result<Option<String>> {
    file.map(|file| {
        let path = base_dir.join(file);
        fs::read_to_string(&path).map_err(|e| {
            CsrKitError::InvalidInput(format!("can't read key file {}: {e}", path.display()))
        })
    })
    .transpose()
}
