//! BLAKE3 hashing and key derivation

/// Size of a hash output in bytes
pub const HASH_SIZE: usize = 32;

/// A hash output
pub type HashOutput = [u8; HASH_SIZE];

/// Hashing and key derivation operations
pub struct Hash;

impl Hash {
    /// Compute hash of data
    pub fn hash(data: &[u8]) -> HashOutput {
        blake3::hash(data).into()
    }

    /// Derive a key from a master key and context string
    ///
    /// The context should uniquely name the purpose of the derived key
    /// (e.g. "trustflow-seal-v1").
    pub fn derive_key(master: &[u8; 32], context: &str) -> [u8; 32] {
        blake3::derive_key(context, master)
    }

    /// Derive a key from arbitrary-length input
    pub fn derive_key_from_slice(input: &[u8], context: &str) -> [u8; 32] {
        Self::derive_key(&Self::hash(input), context)
    }

    /// Short hex fingerprint of some public material, for logs
    pub fn fingerprint(data: &[u8]) -> String {
        hex::encode(&Self::hash(data)[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"device-reading-42";
        assert_eq!(Hash::hash(data), Hash::hash(data));
        assert_ne!(Hash::hash(b"input1"), Hash::hash(b"input2"));
    }

    #[test]
    fn test_key_derivation_contexts() {
        let master = [0u8; 32];

        let key1 = Hash::derive_key(&master, "purpose-1");
        let key2 = Hash::derive_key(&master, "purpose-2");
        assert_ne!(key1, key2);
        assert_eq!(key1, Hash::derive_key(&master, "purpose-1"));

        let from_slice = Hash::derive_key_from_slice(&[1, 2, 3], "purpose-1");
        assert_ne!(from_slice, key1);
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fp = Hash::fingerprint(b"public key");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
