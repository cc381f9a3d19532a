//! Key flag vocabulary
//!
//! All key attributes pack into a single `u32`:
//!
//! ```text
//!  15      12 11  10    8 7     5 4       0
//! ┌──────────┬───┬───────┬───────┬─────────┐
//! │   role   │ - │origin │   -   │ cap/lc  │
//! └──────────┴───┴───────┴───────┴─────────┘
//! ```
//!
//! Decoding never fails: flag data may come off the wire, so unknown
//! numbers and names resolve to a sentinel instead of an error.

use bitflags::bitflags;

bitflags! {
    /// Capability, lifecycle and provenance bits plus the packed
    /// origin and role sub-fields
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct KeyFlags: u32 {
        /// Key may produce signatures
        const CAN_SIGN = 0x0001;
        /// Key must not be used
        const INVALID = 0x0002;
        /// Key has an expiry
        const EXPIRABLE = 0x0004;
        /// Key can be revoked
        const REVOKABLE = 0x0008;
        /// Key belongs to this node
        const OUR_OWN = 0x0010;
        /// Origin sub-field mask
        const ORIGIN = 0x0700;
        /// Role nibble mask
        const ROLE = 0xF000;
    }
}

const ORIGIN_SHIFT: u32 = 8;
const ROLE_SHIFT: u32 = 12;

/// Names accepted by [`KeyFlags::by_name`]
const FLAG_NAMES: &[(&str, KeyFlags)] = &[
    ("CAN_SIGN", KeyFlags::CAN_SIGN),
    ("INVALID", KeyFlags::INVALID),
    ("EXPIRABLE", KeyFlags::EXPIRABLE),
    ("REVOKABLE", KeyFlags::REVOKABLE),
    ("OUR_OWN", KeyFlags::OUR_OWN),
];

impl KeyFlags {
    /// Look up a single capability/lifecycle flag by its number
    ///
    /// Anything that is not exactly one known flag bit yields `INVALID`.
    pub fn by_number(n: u32) -> KeyFlags {
        FLAG_NAMES
            .iter()
            .map(|(_, f)| *f)
            .find(|f| f.bits() == n)
            .unwrap_or(KeyFlags::INVALID)
    }

    /// Look up a flag by its upper-case name, `INVALID` if unknown
    pub fn by_name(name: &str) -> KeyFlags {
        FLAG_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
            .unwrap_or(KeyFlags::INVALID)
    }

    /// Decoded role nibble
    pub fn role(self) -> Role {
        Role::by_number(i64::from((self.bits() & Self::ROLE.bits()) >> ROLE_SHIFT))
    }

    /// Replace the role nibble
    pub fn with_role(self, role: Role) -> KeyFlags {
        let bits = (self.bits() & !Self::ROLE.bits()) | role.to_bits();
        KeyFlags::from_bits_retain(bits)
    }

    /// Decoded origin sub-field
    pub fn origin(self) -> Origin {
        Origin::by_number(i64::from(
            (self.bits() & Self::ORIGIN.bits()) >> ORIGIN_SHIFT,
        ))
    }

    /// Replace the origin sub-field
    pub fn with_origin(self, origin: Origin) -> KeyFlags {
        let bits = (self.bits() & !Self::ORIGIN.bits()) | origin.to_bits();
        KeyFlags::from_bits_retain(bits)
    }
}

/// Role a key plays in the trust chain, stored in the role nibble
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Role {
    /// Unassigned role: device-scoped keys and the decode sentinel
    #[default]
    Undef = 0,
    /// Fleet signing
    FleetSigning = 1,
    /// Fleet encryption
    FleetEncryption = 2,
    /// Fleet provisioning
    FleetProvisioning = 3,
}

impl Role {
    /// Every defined role
    pub const ALL: [Role; 4] = [
        Role::Undef,
        Role::FleetSigning,
        Role::FleetEncryption,
        Role::FleetProvisioning,
    ];

    /// Total decode from a number; unknown values map to [`Role::Undef`]
    pub fn by_number(n: i64) -> Role {
        match n {
            1 => Role::FleetSigning,
            2 => Role::FleetEncryption,
            3 => Role::FleetProvisioning,
            _ => Role::Undef,
        }
    }

    /// Total decode from a name; unknown names map to [`Role::Undef`]
    pub fn by_name(name: &str) -> Role {
        Self::ALL
            .into_iter()
            .find(|r| r.name() == name)
            .unwrap_or(Role::Undef)
    }

    /// Wire name of the role
    pub fn name(self) -> &'static str {
        match self {
            Role::Undef => "ROLE_UNDEF",
            Role::FleetSigning => "ROLE_F_S",
            Role::FleetEncryption => "ROLE_F_E",
            Role::FleetProvisioning => "ROLE_F_P",
        }
    }

    /// Numeric value carried in protected headers
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Role positioned in the flag word
    pub fn to_bits(self) -> u32 {
        u32::from(self.number()) << ROLE_SHIFT
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where key material came from; values are mutually exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Origin {
    /// No origin recorded, or an unrecognized value
    #[default]
    Unknown = 0,
    /// Loaded from persistent storage
    Persistent = 1,
    /// Burned into flash at manufacture
    Flash = 2,
    /// Generated on this node
    Generated = 3,
    /// Supplied by another party
    External = 4,
    /// Held in a hardware security module
    Hsm = 5,
    /// Issued through a PKI / provisioning service
    Pki = 6,
}

impl Origin {
    /// Every origin including the sentinel
    pub const ALL: [Origin; 7] = [
        Origin::Unknown,
        Origin::Persistent,
        Origin::Flash,
        Origin::Generated,
        Origin::External,
        Origin::Hsm,
        Origin::Pki,
    ];

    /// Total decode from a number
    pub fn by_number(n: i64) -> Origin {
        Self::ALL
            .into_iter()
            .find(|o| i64::from(*o as u8) == n)
            .unwrap_or(Origin::Unknown)
    }

    /// Total decode from a name
    pub fn by_name(name: &str) -> Origin {
        Self::ALL
            .into_iter()
            .find(|o| o.name() == name)
            .unwrap_or(Origin::Unknown)
    }

    /// Upper-case name of the origin
    pub fn name(self) -> &'static str {
        match self {
            Origin::Unknown => "ORIGIN_UNKNOWN",
            Origin::Persistent => "ORIGIN_PERSISTENT",
            Origin::Flash => "ORIGIN_FLASH",
            Origin::Generated => "ORIGIN_GENERATED",
            Origin::External => "ORIGIN_EXTERNAL",
            Origin::Hsm => "ORIGIN_HSM",
            Origin::Pki => "ORIGIN_PKI",
        }
    }

    /// Origin positioned in the flag word
    pub fn to_bits(self) -> u32 {
        u32::from(self as u8) << ORIGIN_SHIFT
    }
}
