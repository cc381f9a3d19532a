//! Errors raised by the default crypto facet

use thiserror::Error;

/// Failures of the Ed25519 / X25519 primitives
///
/// A signature that parses but does not match is reported as
/// [`SignatureVerificationFailed`](CryptoError::SignatureVerificationFailed)
/// here; the facet turns that into a negative verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material of the wrong size
    #[error("Key material is {actual} bytes, expected {expected}")]
    InvalidKeyLength {
        /// Required size
        expected: usize,
        /// Size received
        actual: usize,
    },

    /// Signature bytes of the wrong size
    #[error("Signature is {actual} bytes, expected {expected}")]
    InvalidSignatureLength {
        /// Required size
        expected: usize,
        /// Size received
        actual: usize,
    },

    /// Well-formed signature that does not match
    #[error("Signature does not match")]
    SignatureVerificationFailed,

    /// Key lacks `CAN_SIGN` or is invalid
    #[error("Key `{0}` may not sign")]
    SigningNotPermitted(String),

    /// Key record has no private half
    #[error("Key `{0}` carries no private key material")]
    MissingKeyMaterial(String),

    /// Sealing a payload failed
    #[error("Sealing failed: {0}")]
    EncryptionFailed(String),

    /// Sealed payload is truncated or was not sealed for this key
    #[error("Sealed payload could not be opened")]
    DecryptionFailed,

    /// Verifying or exchange key bytes do not decode
    #[error("Public key does not decode")]
    InvalidPublicKey,

    /// Private key bytes do not decode
    #[error("Private key does not decode")]
    InvalidSecretKey,
}

/// Result alias for the crypto layer
pub type CryptoResult<T> = Result<T, CryptoError>;
