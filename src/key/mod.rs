//! Role-scoped key records
//!
//! A [`KeyModel`] is plain data: identifiers, opaque key material and a
//! packed [`KeyFlags`] word. The keystore facet owns the authoritative
//! copy; everything else works on clones.

mod flags;

pub use flags::{KeyFlags, Origin, Role};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding;
use crate::error::TrustResult;

/// Opaque private or shared key material
///
/// Never inspected by the core. Zeroized on drop and redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct KeyData(#[serde(with = "encoding::b64url")] Vec<u8>);

impl KeyData {
    /// Wrap raw material
    pub fn new(bytes: Vec<u8>) -> Self {
        KeyData(bytes)
    }

    /// Borrow the raw material
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether any material is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyData({} bytes)", self.0.len())
    }
}

/// A key together with its fleet scope and flags
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModel {
    /// Unique within a fleet
    #[serde(rename = "kid")]
    pub key_id: String,
    /// Trust domain the key belongs to
    #[serde(rename = "fleetId")]
    pub fleet_id: String,
    /// Private or shared material
    #[serde(rename = "keyData", default)]
    pub key_data: KeyData,
    /// Public half, if the algorithm has one
    #[serde(
        rename = "publicKey",
        default,
        skip_serializing_if = "Option::is_none",
        with = "encoding::b64url_opt"
    )]
    pub public_key: Option<Vec<u8>>,
    /// Packed capability, origin and role bits
    #[serde(with = "flag_bits")]
    pub flags: KeyFlags,
}

impl KeyModel {
    /// Create a key record
    pub fn new(
        key_id: impl Into<String>,
        fleet_id: impl Into<String>,
        key_data: KeyData,
        public_key: Option<Vec<u8>>,
        flags: KeyFlags,
    ) -> Self {
        KeyModel {
            key_id: key_id.into(),
            fleet_id: fleet_id.into(),
            key_data,
            public_key,
            flags,
        }
    }

    /// Whether every bit of `flag` is set
    pub fn has_flag(&self, flag: KeyFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Set or clear `flag`
    pub fn set_flag(&mut self, flag: KeyFlags, on: bool) {
        self.flags.set(flag, on);
    }

    /// Role carried in the role nibble
    pub fn role(&self) -> Role {
        self.flags.role()
    }

    /// Role nibble as a number
    pub fn role_flag(&self) -> u8 {
        self.role().number()
    }

    /// Replace the role
    pub fn set_role(&mut self, role: Role) {
        self.flags = self.flags.with_role(role);
    }

    /// Replace the role from a raw number; unknown numbers store [`Role::Undef`]
    pub fn set_role_flag(&mut self, role: i64) {
        self.set_role(Role::by_number(role));
    }

    /// Origin sub-field
    pub fn origin(&self) -> Origin {
        self.flags.origin()
    }

    /// Replace the origin
    pub fn set_origin(&mut self, origin: Origin) {
        self.flags = self.flags.with_origin(origin);
    }

    /// Usable as a signer: `CAN_SIGN` set and `INVALID` clear
    pub fn can_sign(&self) -> bool {
        self.has_flag(KeyFlags::CAN_SIGN) && !self.has_flag(KeyFlags::INVALID)
    }

    /// Whether the key is flagged invalid
    pub fn is_invalid(&self) -> bool {
        self.has_flag(KeyFlags::INVALID)
    }

    /// Copy suitable for sharing; never usable as a signer
    pub fn export(&self) -> KeyModel {
        let mut exported = self.clone();
        exported.set_flag(KeyFlags::CAN_SIGN, false);
        exported
    }

    /// Serialize to the provisioning JSON form
    pub fn to_json(&self) -> TrustResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serialize [`KeyFlags`] as its raw number so packed sub-fields survive
mod flag_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::KeyFlags;

    pub fn serialize<S>(flags: &KeyFlags, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(flags.bits())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<KeyFlags, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(KeyFlags::from_bits_retain(u32::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key(flags: KeyFlags) -> KeyModel {
        KeyModel::new(
            "device-1",
            "fleet-a",
            KeyData::new(vec![7u8; 32]),
            Some(vec![9u8; 32]),
            flags,
        )
    }

    #[test]
    fn test_flag_toggle_roundtrip() {
        let flags = [
            KeyFlags::CAN_SIGN,
            KeyFlags::INVALID,
            KeyFlags::EXPIRABLE,
            KeyFlags::REVOKABLE,
            KeyFlags::OUR_OWN,
        ];

        for flag in flags {
            let mut key = sample_key(KeyFlags::empty());
            key.set_flag(flag, true);
            assert!(key.has_flag(flag));
            key.set_flag(flag, false);
            assert!(!key.has_flag(flag));
        }
    }

    #[test]
    fn test_export_clears_signing_capability() {
        let all = KeyFlags::CAN_SIGN
            | KeyFlags::OUR_OWN
            | KeyFlags::REVOKABLE
            | KeyFlags::EXPIRABLE;

        for flags in [KeyFlags::empty(), KeyFlags::CAN_SIGN, all] {
            let mut key = sample_key(flags);
            key.set_role(Role::FleetSigning);

            let exported = key.export();
            assert!(!exported.has_flag(KeyFlags::CAN_SIGN));
            assert!(!exported.can_sign());
            assert_eq!(exported.role(), Role::FleetSigning);
            assert_eq!(exported.key_id, key.key_id);
        }
    }

    #[test]
    fn test_can_sign_requires_valid_key() {
        let mut key = sample_key(KeyFlags::CAN_SIGN);
        assert!(key.can_sign());

        key.set_flag(KeyFlags::INVALID, true);
        assert!(!key.can_sign());
    }

    #[test]
    fn test_role_setters() {
        let mut key = sample_key(KeyFlags::CAN_SIGN);
        assert_eq!(key.role(), Role::Undef);

        key.set_role_flag(1);
        assert_eq!(key.role(), Role::FleetSigning);
        assert_eq!(key.role_flag(), 1);

        key.set_role_flag(15);
        assert_eq!(key.role(), Role::Undef);
        assert!(key.can_sign());
    }

    #[test]
    fn test_json_roundtrip_keeps_packed_bits() {
        let mut key = sample_key(KeyFlags::CAN_SIGN | KeyFlags::OUR_OWN);
        key.set_role(Role::FleetProvisioning);
        key.set_origin(Origin::Hsm);

        let json = key.to_json().unwrap();
        assert!(json.contains("\"kid\":\"device-1\""));
        assert!(json.contains("\"fleetId\":\"fleet-a\""));

        let restored: KeyModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, key);
        assert_eq!(restored.origin(), Origin::Hsm);
    }

    #[test]
    fn test_debug_redacts_key_data() {
        let key = sample_key(KeyFlags::CAN_SIGN);
        let debug = format!("{:?}", key);
        assert!(debug.contains("KeyData(32 bytes)"));
        assert!(!debug.contains("7, 7, 7"));
    }
}
