//! Canonical multi-signature envelopes
//!
//! An envelope carries one payload and an ordered list of signature
//! layers. Each party in the trust chain appends one layer; layer order is
//! signing order and is never rearranged.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "payload": "<base64url>",
//!   "signatures": [
//!     {"protected": "<base64url JSON header>", "signature": "<base64url>"}
//!   ]
//! }
//! ```
//!
//! Keys are emitted in that order with no whitespace, and base64url is
//! unpadded, so `Envelope::parse(&e.serialize()?)` reproduces `e` exactly.
//!
//! # Example
//!
//! ```rust
//! use trustflow::envelope::{Envelope, ProtectedHeader};
//! use trustflow::key::Role;
//!
//! let mut envelope = Envelope::new(b"device-reading-42");
//! let header = ProtectedHeader::new("dev-1", "fleet-a", "EdDSA", Role::Undef, 0);
//! envelope.append_signature(&header, &[0u8; 64]).unwrap();
//!
//! let wire = envelope.serialize().unwrap();
//! assert_eq!(Envelope::parse(&wire).unwrap(), envelope);
//! ```

mod header;

pub use header::ProtectedHeader;

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::{TrustError, TrustResult};

/// What a signature layer commits to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SigningInput {
    /// `protected "." payload`
    #[default]
    Payload,
    /// `protected "." payload "." prior_signature`, binding a cosignature
    /// to the layer beneath it
    PriorLayer,
}

/// One signature layer as it appears on the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// base64url JSON protected header
    pub protected: String,
    /// base64url signature value
    pub signature: String,
}

impl Layer {
    /// Decode the protected header
    pub fn header(&self) -> TrustResult<ProtectedHeader> {
        ProtectedHeader::decode(&self.protected)
    }

    /// Decode the signature value
    pub fn signature_bytes(&self) -> TrustResult<Vec<u8>> {
        encoding::decode(&self.signature)
    }
}

/// A layer whose signing input has been computed but which is not yet signed
#[derive(Clone, Debug)]
pub struct PendingLayer {
    protected: String,
    signing_input: Vec<u8>,
}

impl PendingLayer {
    /// Bytes the signer must sign
    pub fn signing_input(&self) -> &[u8] {
        &self.signing_input
    }
}

/// Multi-signature message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    signatures: Vec<Layer>,
}

impl Envelope {
    /// Fresh envelope with no signature layers
    pub fn new(payload: &[u8]) -> Self {
        Envelope {
            payload: Some(encoding::encode(payload)),
            signatures: Vec::new(),
        }
    }

    /// Encoded payload, if present
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Decoded payload bytes
    pub fn payload_bytes(&self) -> TrustResult<Vec<u8>> {
        encoding::decode(self.require_payload()?)
    }

    /// Replace the payload of an unsigned envelope
    ///
    /// Fails once any layer exists, since every layer commits to the payload.
    pub fn replace_payload(&mut self, payload: &[u8]) -> TrustResult<()> {
        if !self.signatures.is_empty() {
            return Err(TrustError::Format(format!(
                "cannot replace the payload of an envelope with {} signature layers",
                self.signatures.len()
            )));
        }
        self.payload = Some(encoding::encode(payload));
        Ok(())
    }

    /// Number of signature layers
    pub fn layer_count(&self) -> usize {
        self.signatures.len()
    }

    /// Layer at `index`, in signing order
    pub fn layer_at(&self, index: usize) -> TrustResult<&Layer> {
        self.signatures.get(index).ok_or(TrustError::Index {
            index,
            len: self.signatures.len(),
        })
    }

    /// All layers, in signing order
    pub fn layers(&self) -> &[Layer] {
        &self.signatures
    }

    /// Append a signature layer after every existing one
    ///
    /// Returns the new layer's index.
    pub fn append_signature(
        &mut self,
        header: &ProtectedHeader,
        signature: &[u8],
    ) -> TrustResult<usize> {
        self.require_payload()?;
        self.push(header.encode()?, signature)
    }

    /// Compute what the next layer must sign
    pub fn prepare_layer(
        &self,
        header: &ProtectedHeader,
        input: SigningInput,
    ) -> TrustResult<PendingLayer> {
        let protected = header.encode()?;
        let signing_input = self.signing_input(&protected, self.signatures.len(), input)?;
        Ok(PendingLayer {
            protected,
            signing_input,
        })
    }

    /// Append a prepared layer with its signature
    pub fn push_layer(&mut self, pending: PendingLayer, signature: &[u8]) -> TrustResult<usize> {
        self.push(pending.protected, signature)
    }

    /// What the layer at `index` was signed over
    pub fn signing_input_at(&self, index: usize, input: SigningInput) -> TrustResult<Vec<u8>> {
        let layer = self.layer_at(index)?;
        self.signing_input(&layer.protected, index, input)
    }

    /// Canonical wire form
    pub fn serialize(&self) -> TrustResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the wire form, checking every base64url field and protected header
    pub fn parse(json: &str) -> TrustResult<Self> {
        let envelope: Envelope = serde_json::from_str(json)
            .map_err(|e| TrustError::Format(format!("invalid envelope: {e}")))?;

        if let Some(payload) = &envelope.payload {
            encoding::decode(payload)?;
        }
        for layer in &envelope.signatures {
            ProtectedHeader::decode(&layer.protected)?;
            encoding::decode(&layer.signature)?;
        }
        Ok(envelope)
    }

    fn require_payload(&self) -> TrustResult<&str> {
        self.payload
            .as_deref()
            .ok_or_else(|| TrustError::Format("envelope has no payload".into()))
    }

    fn push(&mut self, protected: String, signature: &[u8]) -> TrustResult<usize> {
        self.require_payload()?;
        self.signatures.push(Layer {
            protected,
            signature: encoding::encode(signature),
        });
        Ok(self.signatures.len() - 1)
    }

    /// Signing input for a layer at `position` with the given header
    fn signing_input(
        &self,
        protected: &str,
        position: usize,
        input: SigningInput,
    ) -> TrustResult<Vec<u8>> {
        let payload = self.require_payload()?;

        let mut bytes = Vec::with_capacity(protected.len() + payload.len() + 1);
        bytes.extend_from_slice(protected.as_bytes());
        bytes.push(b'.');
        bytes.extend_from_slice(payload.as_bytes());

        if input == SigningInput::PriorLayer {
            let prior = position
                .checked_sub(1)
                .and_then(|i| self.signatures.get(i))
                .ok_or_else(|| {
                    TrustError::Format(format!("layer {position} has no prior layer to bind to"))
                })?;
            bytes.push(b'.');
            bytes.extend_from_slice(prior.signature.as_bytes());
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Role;

    fn header(kid: &str, role: Role) -> ProtectedHeader {
        ProtectedHeader::new(kid, "fleet-a", "EdDSA", role, 1_700_000_000_000)
    }

    #[test]
    fn test_new_envelope_is_unsigned() {
        let envelope = Envelope::new(b"device-reading-42");
        assert_eq!(envelope.layer_count(), 0);
        assert_eq!(envelope.payload_bytes().unwrap(), b"device-reading-42");
    }

    #[test]
    fn test_roundtrip_zero_one_many_layers() {
        let mut envelope = Envelope::new(b"device-reading-42");
        assert_eq!(Envelope::parse(&envelope.serialize().unwrap()).unwrap(), envelope);

        envelope.append_signature(&header("dev", Role::Undef), &[1u8; 64]).unwrap();
        assert_eq!(Envelope::parse(&envelope.serialize().unwrap()).unwrap(), envelope);

        envelope.append_signature(&header("gw", Role::FleetSigning), &[2u8; 64]).unwrap();
        envelope.append_signature(&header("cloud", Role::FleetSigning), &[3u8; 64]).unwrap();
        let wire = envelope.serialize().unwrap();
        let parsed = Envelope::parse(&wire).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.serialize().unwrap(), wire);
    }

    #[test]
    fn test_canonical_wire_shape() {
        let mut envelope = Envelope::new(b"hi");
        envelope.append_signature(&ProtectedHeader::default(), &[0xff]).unwrap();

        assert_eq!(
            envelope.serialize().unwrap(),
            r#"{"payload":"aGk","signatures":[{"protected":"e30","signature":"_w"}]}"#
        );
    }

    #[test]
    fn test_layers_append_in_order() {
        let mut envelope = Envelope::new(b"data");
        assert_eq!(envelope.append_signature(&header("dev", Role::Undef), &[1]).unwrap(), 0);
        assert_eq!(envelope.append_signature(&header("gw", Role::FleetSigning), &[2]).unwrap(), 1);

        assert_eq!(envelope.layer_at(0).unwrap().header().unwrap().kid.as_deref(), Some("dev"));
        assert_eq!(envelope.layer_at(1).unwrap().header().unwrap().role(), Role::FleetSigning);
        assert_eq!(
            envelope.layer_at(2),
            Err(TrustError::Index { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_append_requires_payload() {
        let mut envelope = Envelope::parse(r#"{"signatures":[]}"#).unwrap();
        assert_eq!(envelope.payload(), None);
        assert!(matches!(
            envelope.append_signature(&header("dev", Role::Undef), &[1]),
            Err(TrustError::Format(_))
        ));
        assert_eq!(envelope.serialize().unwrap(), r#"{"signatures":[]}"#);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(Envelope::parse("{"), Err(TrustError::Format(_))));
        assert!(Envelope::parse(r#"{"payload":"aGk"}"#).is_err());
        assert!(Envelope::parse(r#"{"payload":"a+b=","signatures":[]}"#).is_err());
        assert!(Envelope::parse(
            r#"{"payload":"aGk","signatures":[{"protected":"e30","signature":"*"}]}"#
        )
        .is_err());
        assert!(Envelope::parse(r#"{"payload":1,"signatures":[]}"#).is_err());

        // Valid base64url whose header is not JSON
        let not_json = format!(
            r#"{{"payload":"aGk","signatures":[{{"protected":"{}","signature":"_w"}}]}}"#,
            encoding::encode(b"not json")
        );
        assert!(matches!(Envelope::parse(&not_json), Err(TrustError::Format(_))));
    }

    #[test]
    fn test_prior_layer_signing_input() {
        let mut envelope = Envelope::new(b"data");

        let first = header("dev", Role::Undef);
        assert!(envelope.prepare_layer(&first, SigningInput::PriorLayer).is_err());

        let pending = envelope.prepare_layer(&first, SigningInput::Payload).unwrap();
        let expected = format!("{}.{}", first.encode().unwrap(), envelope.payload().unwrap());
        assert_eq!(pending.signing_input(), expected.as_bytes());
        envelope.push_layer(pending, &[9u8; 4]).unwrap();

        let second = header("gw", Role::FleetSigning);
        let pending = envelope.prepare_layer(&second, SigningInput::PriorLayer).unwrap();
        envelope.push_layer(pending.clone(), &[8u8; 4]).unwrap();

        assert_eq!(
            envelope.signing_input_at(1, SigningInput::PriorLayer).unwrap(),
            pending.signing_input()
        );
        assert!(pending
            .signing_input()
            .ends_with(envelope.layer_at(0).unwrap().signature.as_bytes()));
    }

    #[test]
    fn test_replace_payload_only_when_unsigned() {
        let mut envelope = Envelope::new(b"plain");
        envelope.replace_payload(b"sealed").unwrap();
        assert_eq!(envelope.payload_bytes().unwrap(), b"sealed");

        envelope.append_signature(&header("dev", Role::Undef), &[1]).unwrap();
        assert!(envelope.replace_payload(b"other").is_err());
    }
}
