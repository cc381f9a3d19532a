//! Flow compilation and execution

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Flow, FlowArguments, FlowOutput, Operation, Slot};
use crate::envelope::{Envelope, ProtectedHeader, SigningInput};
use crate::error::{TrustError, TrustResult};
use crate::key::Role;
use crate::platform::{select_by_role, KeySelection, Platform};

/// Compiles [`Flow`] descriptors against a platform and fleet
#[derive(Clone)]
pub struct FlowEngine {
    platform: Arc<Platform>,
    fleet_id: String,
    selection: KeySelection,
}

impl FlowEngine {
    /// Engine for the configured fleet
    pub fn new(platform: Arc<Platform>) -> TrustResult<Self> {
        let fleet_id = platform.config().fleet_id()?.to_string();
        let selection = KeySelection::from_config(platform.config().key_selection());
        Ok(FlowEngine {
            platform,
            fleet_id,
            selection,
        })
    }

    /// Platform the engine runs on
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// Fleet flows are scoped to by default
    pub fn fleet_id(&self) -> &str {
        &self.fleet_id
    }

    /// Compile a flow scoped to the configured fleet
    pub fn compile(&self, flow: Flow) -> TrustResult<Arc<CompiledFlow>> {
        self.compile_for_fleet(flow, &self.fleet_id)
    }

    /// Compile a flow whose key lookups are scoped to `fleet_id`
    pub fn compile_for_fleet(&self, flow: Flow, fleet_id: &str) -> TrustResult<Arc<CompiledFlow>> {
        validate(&flow)?;
        debug!(
            "Compiled flow `{}` ({} steps) for fleet `{}`",
            flow.name,
            flow.steps.len(),
            fleet_id
        );

        Ok(Arc::new(CompiledFlow {
            yields_verdict: flow.has_verify_steps(),
            name: flow.name,
            steps: flow.steps,
            platform: self.platform.clone(),
            fleet_id: fleet_id.to_string(),
            selection: self.selection,
        }))
    }
}

fn validate(flow: &Flow) -> TrustResult<()> {
    let invalid = |reason: String| TrustError::InvalidFlow {
        flow: flow.name.clone(),
        reason,
    };

    if flow.name.is_empty() {
        return Err(invalid("flow name is empty".into()));
    }
    if flow.steps.is_empty() {
        return Err(invalid("flow has no steps".into()));
    }

    for step in &flow.steps {
        match (step.operation, step.slot) {
            (Operation::Verify, Slot::Layer(index)) => {
                if index == 0 && step.input == SigningInput::PriorLayer {
                    return Err(invalid(format!(
                        "step `{}` binds layer 0 to a prior layer",
                        step.name
                    )));
                }
            }
            (Operation::Verify, Slot::Append) => {
                return Err(invalid(format!("verify step `{}` needs a layer index", step.name)));
            }
            (_, Slot::Layer(_)) => {
                return Err(invalid(format!(
                    "step `{}` must append, not consume a layer",
                    step.name
                )));
            }
            (Operation::Encrypt | Operation::Decrypt, Slot::Append)
                if step.input == SigningInput::PriorLayer =>
            {
                return Err(invalid(format!(
                    "step `{}` cannot bind to a prior layer",
                    step.name
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// A flow ready to run
///
/// Steps run strictly in order, each on a private working copy of the
/// envelope. The first error ends the run and the working copy is dropped,
/// so callers see either a complete result or an error.
pub struct CompiledFlow {
    name: String,
    steps: Vec<FlowArguments>,
    platform: Arc<Platform>,
    fleet_id: String,
    selection: KeySelection,
    yields_verdict: bool,
}

impl CompiledFlow {
    /// Flow name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[FlowArguments] {
        &self.steps
    }

    /// Fleet key lookups are scoped to
    pub fn fleet_id(&self) -> &str {
        &self.fleet_id
    }

    /// Run the flow over `envelope`
    pub async fn run(&self, envelope: Envelope) -> TrustResult<FlowOutput> {
        let mut working = envelope;
        let mut verdict = true;

        for (i, step) in self.steps.iter().enumerate() {
            debug!("Flow `{}` step {} `{}` ({:?})", self.name, i, step.name, step.operation);

            let outcome = match step.operation {
                Operation::Sign => self.sign(step, &mut working).await,
                Operation::Verify => self.verify(step, &working).await,
                Operation::Encrypt => self.encrypt(step, &mut working).await,
                Operation::Decrypt => self.decrypt(step, &mut working).await,
            };

            match outcome {
                Ok(passed) => {
                    if !passed {
                        debug!("Flow `{}` step `{}` check failed", self.name, step.name);
                    }
                    verdict &= passed;
                }
                Err(e) => {
                    warn!("Flow `{}` failed at step `{}`: {}", self.name, step.name, e);
                    return Err(e);
                }
            }
        }

        let verdict = self.yields_verdict.then_some(verdict);
        Ok(FlowOutput::new(working, verdict))
    }

    async fn sign(&self, step: &FlowArguments, envelope: &mut Envelope) -> TrustResult<bool> {
        let keystore = self.platform.keystore();
        let crypto = self.platform.crypto();

        let key = keystore.get_key_by_role(step.role, &self.fleet_id).await?;
        let header = ProtectedHeader::new(
            key.key_id.as_str(),
            key.fleet_id.as_str(),
            crypto.algorithm(),
            key.role(),
            self.platform.time().now_ms(),
        );

        let pending = envelope.prepare_layer(&header, step.input)?;
        let signature = crypto.sign(&key, pending.signing_input()).await?;
        let index = envelope.push_layer(pending, &signature)?;

        debug!("Flow `{}` appended layer {} with key `{}`", self.name, index, key.key_id);
        Ok(true)
    }

    async fn verify(&self, step: &FlowArguments, envelope: &Envelope) -> TrustResult<bool> {
        let Slot::Layer(index) = step.slot else {
            return Err(TrustError::InvalidFlow {
                flow: self.name.clone(),
                reason: format!("verify step `{}` needs a layer index", step.name),
            });
        };

        let layer = envelope.layer_at(index)?;
        let header = layer.header()?;

        if header.role.map(Role::by_number) != Some(step.role) {
            debug!(
                "Layer {} declares role {:?}, step `{}` expects {}",
                index, header.role, step.name, step.role
            );
            return Ok(false);
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| TrustError::Format(format!("layer {index} header has no kid")))?;
        let key = self
            .platform
            .keystore()
            .get_key(kid)
            .await?
            .ok_or_else(|| TrustError::KeyNotFound(format!("kid `{kid}`")))?;

        if key.is_invalid() {
            return Err(TrustError::KeyInvalid(format!("kid `{kid}`")));
        }
        if key.role() != step.role || header.fleet_id.as_deref() != Some(key.fleet_id.as_str()) {
            debug!("Layer {} header does not match stored key `{}`", index, kid);
            return Ok(false);
        }
        if key.fleet_id != self.fleet_id {
            debug!(
                "Layer {} key `{}` belongs to fleet `{}`, flow verifies fleet `{}`",
                index, kid, key.fleet_id, self.fleet_id
            );
            return Ok(false);
        }

        let signing_input = envelope.signing_input_at(index, step.input)?;
        let signature = layer.signature_bytes()?;
        self.platform
            .crypto()
            .verify(&key, &signing_input, &signature)
            .await
    }

    async fn encrypt(&self, step: &FlowArguments, envelope: &mut Envelope) -> TrustResult<bool> {
        if envelope.layer_count() > 0 {
            return Err(TrustError::Format(format!(
                "step `{}` cannot encrypt a payload that is already signed",
                step.name
            )));
        }

        let keys = self.platform.keystore().get_keys().await?;
        let key = select_by_role(&keys, step.role, &self.fleet_id, self.selection, false)?;

        let plaintext = envelope.payload_bytes()?;
        let sealed = self.platform.crypto().encrypt(&key, &plaintext).await?;
        envelope.replace_payload(&sealed)?;
        Ok(true)
    }

    async fn decrypt(&self, step: &FlowArguments, envelope: &mut Envelope) -> TrustResult<bool> {
        let key = self
            .platform
            .keystore()
            .get_key_by_role(step.role, &self.fleet_id)
            .await?;

        let sealed = envelope.payload_bytes()?;
        let plaintext = self.platform.crypto().decrypt(&key, &sealed).await?;

        // Existing layers commit to the sealed payload, not the plaintext
        *envelope = Envelope::new(&plaintext);
        Ok(true)
    }
}
