//! Manifest change detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a fingerprint
const FINGERPRINT_BYTES: usize = 8;

/// Compact identifier of a manifest's full text.
///
/// Used only to notice that dependencies changed since the last successful
/// install, never for integrity checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestFingerprint(String);

impl ManifestFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ManifestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint manifest text
pub fn fingerprint(manifest_text: &str) -> ManifestFingerprint {
    let digest = Sha256::digest(manifest_text.as_bytes());
    ManifestFingerprint(hex::encode(&digest[..FINGERPRINT_BYTES]))
}
