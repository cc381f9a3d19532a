//! Utils facet: encoding, randomness and identifiers

use rand::RngCore;

use crate::encoding;
use crate::error::TrustResult;

/// Encoding and randomness helpers
pub trait Utils: Send + Sync {
    /// Unpadded base64url encode
    fn b64url_encode(&self, data: &[u8]) -> String;

    /// Unpadded base64url decode
    fn b64url_decode(&self, encoded: &str) -> TrustResult<Vec<u8>>;

    /// Fill `buffer` with cryptographically secure random bytes
    fn random_fill(&self, buffer: &mut [u8]);

    /// New random UUID string
    fn make_uuid(&self) -> String;
}

/// [`Utils`] backed by the OS random source
#[derive(Clone, Debug, Default)]
pub struct OsUtils;

impl Utils for OsUtils {
    fn b64url_encode(&self, data: &[u8]) -> String {
        encoding::encode(data)
    }

    fn b64url_decode(&self, encoded: &str) -> TrustResult<Vec<u8>> {
        encoding::decode(encoded)
    }

    fn random_fill(&self, buffer: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buffer);
    }

    fn make_uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
