//! X25519 key exchange and sealed payloads
//!
//! Payload encryption towards a key holder uses an ephemeral X25519
//! exchange against the recipient's exchange key:
//!
//! ```text
//! sealed = ephemeral_public (32) || nonce (12) || ciphertext || tag (16)
//! ```

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use super::cipher::Cipher;
use super::error::{CryptoError, CryptoResult};
use super::hash::Hash;

/// Size of a shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

/// Size of an exchange public key in bytes
pub const EXCHANGE_KEY_SIZE: usize = 32;

const SEAL_CONTEXT: &str = "trustflow-seal-v1";

/// A public key for key exchange (X25519)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ExchangePublicKey(pub [u8; EXCHANGE_KEY_SIZE]);

impl ExchangePublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != EXCHANGE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: EXCHANGE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; EXCHANGE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(ExchangePublicKey(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; EXCHANGE_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ExchangePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangePublicKey({}...)", &hex::encode(self.0)[..16])
    }
}

/// Shared secret derived from key exchange
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret {
    secret: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the raw bytes (be careful with this!)
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.secret
    }
}

/// An ephemeral keypair for key exchange
///
/// Used once and then discarded (forward secrecy)
#[derive(ZeroizeOnDrop)]
pub struct EphemeralKeypair {
    #[zeroize(skip)]
    public_key: ExchangePublicKey,
    secret_key: [u8; 32],
}

impl EphemeralKeypair {
    /// Generate a new ephemeral keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        EphemeralKeypair {
            public_key: ExchangePublicKey(public.to_bytes()),
            secret_key: secret.to_bytes(),
        }
    }

    /// Get the public key to share with the peer
    pub fn public_key(&self) -> &ExchangePublicKey {
        &self.public_key
    }

    /// Compute shared secret with a peer's public key
    pub fn diffie_hellman(&self, peer_public: &ExchangePublicKey) -> SharedSecret {
        KeyExchange::derive_shared(&self.secret_key, peer_public)
    }
}

/// Key exchange operations
pub struct KeyExchange;

impl KeyExchange {
    /// Generate an ephemeral keypair for one-time use
    pub fn generate_ephemeral() -> EphemeralKeypair {
        EphemeralKeypair::generate()
    }

    /// X25519 between a raw secret and a peer's public key
    pub fn derive_shared(my_secret: &[u8; 32], their_public: &ExchangePublicKey) -> SharedSecret {
        let secret = StaticSecret::from(*my_secret);
        let peer = X25519Public::from(their_public.0);

        SharedSecret {
            secret: secret.diffie_hellman(&peer).to_bytes(),
        }
    }

    /// Exchange public key for an identity seed
    pub fn identity_to_exchange(identity_secret: &[u8; 32]) -> ExchangePublicKey {
        let secret = StaticSecret::from(*identity_secret);
        ExchangePublicKey(X25519Public::from(&secret).to_bytes())
    }

    /// Encrypt `plaintext` so only the holder of `recipient`'s secret can open it
    pub fn seal(recipient: &ExchangePublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let ephemeral = Self::generate_ephemeral();
        let shared = ephemeral.diffie_hellman(recipient);
        let key = Self::seal_key(&shared, ephemeral.public_key(), recipient);

        let ciphertext = Cipher::encrypt_with_aad(&key, plaintext, ephemeral.public_key().as_bytes())?;

        let mut sealed = Vec::with_capacity(EXCHANGE_KEY_SIZE + ciphertext.len());
        sealed.extend_from_slice(ephemeral.public_key().as_bytes());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a payload produced by [`KeyExchange::seal`]
    pub fn open(identity_secret: &[u8; 32], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < EXCHANGE_KEY_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let ephemeral = ExchangePublicKey::from_bytes(&sealed[..EXCHANGE_KEY_SIZE])?;
        let recipient = Self::identity_to_exchange(identity_secret);
        let shared = Self::derive_shared(identity_secret, &ephemeral);
        let key = Self::seal_key(&shared, &ephemeral, &recipient);

        Cipher::decrypt_with_aad(&key, &sealed[EXCHANGE_KEY_SIZE..], ephemeral.as_bytes())
    }

    fn seal_key(
        shared: &SharedSecret,
        ephemeral: &ExchangePublicKey,
        recipient: &ExchangePublicKey,
    ) -> [u8; 32] {
        let mut input = Vec::with_capacity(SHARED_SECRET_SIZE + 2 * EXCHANGE_KEY_SIZE);
        input.extend_from_slice(shared.as_bytes());
        input.extend_from_slice(ephemeral.as_bytes());
        input.extend_from_slice(recipient.as_bytes());
        Hash::derive_key_from_slice(&input, SEAL_CONTEXT)
    }
}
