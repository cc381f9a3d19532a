//! Protected header carried by each signature layer

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::{TrustError, TrustResult};
use crate::key::Role;

/// Decoded protected header
///
/// Every field is optional when decoding: absent stays absent. Fields are
/// emitted in declaration order, which is the canonical order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    /// Id of the signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Fleet of the signing key
    #[serde(rename = "fleetId", default, skip_serializing_if = "Option::is_none")]
    pub fleet_id: Option<String>,
    /// Signature algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Role number of the signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
    /// Signing time, milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ProtectedHeader {
    /// Header with every field populated
    pub fn new(
        kid: impl Into<String>,
        fleet_id: impl Into<String>,
        alg: impl Into<String>,
        role: Role,
        timestamp: i64,
    ) -> Self {
        ProtectedHeader {
            kid: Some(kid.into()),
            fleet_id: Some(fleet_id.into()),
            alg: Some(alg.into()),
            role: Some(i64::from(role.number())),
            timestamp: Some(timestamp),
        }
    }

    /// Declared role; an absent or unknown number decodes to [`Role::Undef`]
    pub fn role(&self) -> Role {
        self.role.map(Role::by_number).unwrap_or_default()
    }

    /// Canonical base64url form
    pub fn encode(&self) -> TrustResult<String> {
        Ok(encoding::encode(&serde_json::to_vec(self)?))
    }

    /// Decode from base64url JSON
    pub fn decode(protected: &str) -> TrustResult<Self> {
        let bytes = encoding::decode(protected)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrustError::Format(format!("invalid protected header: {e}")))
    }
}
