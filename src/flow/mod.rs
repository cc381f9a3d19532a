//! Declarative signing and verification flows
//!
//! A [`Flow`] is a named, ordered list of [`FlowArguments`]. The
//! [`FlowEngine`] compiles it once into a [`CompiledFlow`], which can then
//! be run any number of times, concurrently, against different envelopes.
//!
//! ```text
//! SignFlow     : sign   ROLE_UNDEF  -> layer 0 (device)
//! CosignFlow   : cosign ROLE_F_S    -> layer 1 (gateway, bound to layer 0)
//! VerifyFlow   : verify layer 0 ROLE_UNDEF, verify layer 1 ROLE_F_S
//! FromFleetFlow: verify layer 0 ROLE_F_S
//! ```

mod engine;

pub use engine::{CompiledFlow, FlowEngine};

use crate::envelope::{Envelope, SigningInput};
use crate::key::Role;

/// Name of the device signing flow
pub const SIGN_FLOW: &str = "SignFlow";
/// Name of the gateway cosigning flow
pub const COSIGN_FLOW: &str = "CosignFlow";
/// Name of the device + gateway verification flow
pub const VERIFY_FLOW: &str = "VerifyFlow";
/// Name of the fleet-to-device verification flow
pub const FROM_FLEET_FLOW: &str = "FromFleetFlow";

/// Facet operation a step invokes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Append a signature layer
    Sign,
    /// Check an existing layer
    Verify,
    /// Seal the payload towards a key holder
    Encrypt,
    /// Open a sealed payload
    Decrypt,
}

/// Where a step's result goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Mutate the envelope: append a layer or replace the payload
    Append,
    /// Consume the existing layer at this index
    Layer(usize),
}

/// One step of a flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowArguments {
    /// Step name, used in logs
    pub name: String,
    /// Role of the key the step needs
    pub role: Role,
    /// Facet operation
    pub operation: Operation,
    /// Output slot
    pub slot: Slot,
    /// What a sign or verify step covers
    pub input: SigningInput,
}

impl FlowArguments {
    /// Sign the payload with the `role` key
    pub fn sign(name: impl Into<String>, role: Role) -> Self {
        Self::new(name, role, Operation::Sign, Slot::Append, SigningInput::Payload)
    }

    /// Sign the payload and the previous layer with the `role` key
    pub fn cosign(name: impl Into<String>, role: Role) -> Self {
        Self::new(name, role, Operation::Sign, Slot::Append, SigningInput::PriorLayer)
    }

    /// Check layer `index`, which must have been signed by a `role` key
    pub fn verify(name: impl Into<String>, role: Role, index: usize) -> Self {
        Self::new(name, role, Operation::Verify, Slot::Layer(index), SigningInput::Payload)
    }

    /// Check cosignature layer `index`
    pub fn verify_cosign(name: impl Into<String>, role: Role, index: usize) -> Self {
        Self::new(
            name,
            role,
            Operation::Verify,
            Slot::Layer(index),
            SigningInput::PriorLayer,
        )
    }

    /// Seal the payload towards the `role` key
    pub fn encrypt(name: impl Into<String>, role: Role) -> Self {
        Self::new(name, role, Operation::Encrypt, Slot::Append, SigningInput::Payload)
    }

    /// Open the payload with our own `role` key
    pub fn decrypt(name: impl Into<String>, role: Role) -> Self {
        Self::new(name, role, Operation::Decrypt, Slot::Append, SigningInput::Payload)
    }

    fn new(
        name: impl Into<String>,
        role: Role,
        operation: Operation,
        slot: Slot,
        input: SigningInput,
    ) -> Self {
        FlowArguments {
            name: name.into(),
            role,
            operation,
            slot,
            input,
        }
    }
}

/// Named ordered sequence of steps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    /// Flow name
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<FlowArguments>,
}

impl Flow {
    /// Empty flow
    pub fn new(name: impl Into<String>) -> Self {
        Flow {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: FlowArguments) -> Self {
        self.steps.push(step);
        self
    }

    /// Device signs the payload
    pub fn sign_flow() -> Self {
        Flow::new(SIGN_FLOW).step(FlowArguments::sign("device-sign", Role::Undef))
    }

    /// Gateway cosigns on top of the device layer
    pub fn cosign_flow() -> Self {
        Flow::new(COSIGN_FLOW).step(FlowArguments::cosign("gateway-cosign", Role::FleetSigning))
    }

    /// Check the device layer and the gateway cosignature
    pub fn verify_flow() -> Self {
        Flow::new(VERIFY_FLOW)
            .step(FlowArguments::verify("device-layer", Role::Undef, 0))
            .step(FlowArguments::verify_cosign(
                "gateway-layer",
                Role::FleetSigning,
                1,
            ))
    }

    /// Check a message signed by the fleet authority
    pub fn from_fleet_flow() -> Self {
        Flow::new(FROM_FLEET_FLOW).step(FlowArguments::verify(
            "fleet-layer",
            Role::FleetSigning,
            0,
        ))
    }

    /// Whether running the flow yields a verdict
    pub fn has_verify_steps(&self) -> bool {
        self.steps.iter().any(|s| s.operation == Operation::Verify)
    }
}

/// Default flows with the API names they are exposed under
pub fn default_flows() -> Vec<(&'static str, Flow)> {
    vec![
        ("sign", Flow::sign_flow()),
        ("cosign", Flow::cosign_flow()),
        ("verify", Flow::verify_flow()),
        ("fromFleet", Flow::from_fleet_flow()),
    ]
}

/// Result of running a flow
///
/// Signing flows carry the updated envelope. Flows with verify steps also
/// carry a verdict: the conjunction of every verify step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowOutput {
    envelope: Envelope,
    verdict: Option<bool>,
}

impl FlowOutput {
    pub(crate) fn new(envelope: Envelope, verdict: Option<bool>) -> Self {
        FlowOutput { envelope, verdict }
    }

    /// Envelope after the flow
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Take the envelope
    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }

    /// Verdict of a verification flow, `None` for pure signing flows
    pub fn verdict(&self) -> Option<bool> {
        self.verdict
    }

    /// True only for a verification flow whose every check passed
    pub fn is_verified(&self) -> bool {
        self.verdict == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flow_shapes() {
        let sign = Flow::sign_flow();
        assert_eq!(sign.steps.len(), 1);
        assert_eq!(sign.steps[0].operation, Operation::Sign);
        assert!(!sign.has_verify_steps());

        let verify = Flow::verify_flow();
        assert_eq!(verify.steps[0].slot, Slot::Layer(0));
        assert_eq!(verify.steps[1].slot, Slot::Layer(1));
        assert_eq!(verify.steps[1].input, SigningInput::PriorLayer);
        assert!(verify.has_verify_steps());
    }

    #[test]
    fn test_default_flow_names_are_unique() {
        let flows = default_flows();
        let mut names: Vec<_> = flows.iter().map(|(api, _)| *api).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), flows.len());
    }
}
