//! Unpadded base64url helpers shared by the envelope, key and utils code

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine};

use crate::error::{TrustError, TrustResult};

/// Encode bytes as unpadded base64url
pub fn encode(data: &[u8]) -> String {
    B64URL.encode(data)
}

/// Decode unpadded base64url
pub fn decode(encoded: &str) -> TrustResult<Vec<u8>> {
    B64URL
        .decode(encoded)
        .map_err(|e| TrustError::Format(format!("invalid base64url: {e}")))
}

/// Serde adapter storing `Vec<u8>` as a base64url string
pub mod b64url {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64url
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode(bytes))
    }

    /// Deserialize bytes from base64url
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter storing `Option<Vec<u8>>` as an optional base64url string
pub mod b64url_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize optional bytes as base64url
    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&super::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional bytes from base64url
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
