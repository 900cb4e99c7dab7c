//! ---
//! prov_section: "05-trust-certificates"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Trust certificate aggregation for execution drivers."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::Result;

/// Opaque, compressed aggregate of trusted certificates.
///
/// The token is the base64 form of the gzip-compressed concatenation of every
/// certificate, each preceded by a newline. Before the first refresh the
/// token is empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TrustBundle {
    token: String,
}

impl TrustBundle {
    /// Bundle published before any refresh completed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compress a certificate set into a bundle.
    pub fn encode(certificates: &BTreeSet<String>) -> Result<Self> {
        let mut joined = String::new();
        for certificate in certificates {
            joined.push('\n');
            joined.push_str(certificate);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(joined.as_bytes())?;
        let compressed = encoder.finish()?;
        Ok(Self {
            token: BASE64.encode(compressed),
        })
    }

    /// Wrap a token produced elsewhere.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The token as injected into execution containers.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Whether no refresh has populated the bundle yet.
    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// Decompress the bundle back into its newline-joined text.
    pub fn decode(&self) -> Result<String> {
        if self.token.is_empty() {
            return Ok(String::new());
        }
        let compressed = BASE64.decode(self.token.as_bytes())?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl fmt::Debug for TrustBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustBundle")
            .field("token_len", &self.token.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificates_are_joined_in_sorted_order() {
        let certs: BTreeSet<String> = ["-----B-----", "-----A-----"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        let bundle = TrustBundle::encode(&certs).unwrap();
        assert!(!bundle.is_empty());
        assert_eq!(bundle.decode().unwrap(), "\n-----A-----\n-----B-----");
    }

    #[test]
    fn empty_set_still_produces_a_token() {
        let bundle = TrustBundle::encode(&BTreeSet::new()).unwrap();
        assert!(!bundle.is_empty());
        assert_eq!(bundle.decode().unwrap(), "");
        assert_eq!(TrustBundle::empty().decode().unwrap(), "");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(TrustBundle::from_token("%%%").decode().is_err());
        assert!(TrustBundle::from_token(BASE64.encode("plain")).decode().is_err());
    }
}
