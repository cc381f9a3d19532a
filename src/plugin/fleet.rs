//! Built-in fleet messaging plugin

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Plugin, PluginBase, PluginBuilder};
use crate::error::TrustResult;
use crate::flow::{Flow, FlowArguments};
use crate::key::Role;

/// Factory name of [`FleetPlugin`]
pub const FLEET_PLUGIN: &str = "fleet";
/// Fleet authority signs a message for devices
pub const FLEET_TO_DEVICE_API: &str = "fleetToDevice";
/// Check a device message cosigned by a fleet signer
pub const FLEET_FROM_DEVICE_API: &str = "fleetFromDevice";

/// Adds fleet-to-device and device-to-fleet APIs
#[derive(Debug)]
pub struct FleetPlugin {
    base: PluginBase,
}

impl FleetPlugin {
    /// Build the plugin from validated arguments
    pub fn new(builder: PluginBuilder) -> TrustResult<Self> {
        let base = builder.build()?;
        Ok(FleetPlugin { base })
    }

    /// [`PluginFactory`](super::PluginFactory) entry point
    pub fn factory(builder: PluginBuilder) -> TrustResult<Arc<dyn Plugin>> {
        Ok(Arc::new(Self::new(builder)?))
    }

    fn to_device_flow() -> Flow {
        Flow::new("FleetToDeviceFlow").step(FlowArguments::sign("fleet-sign", Role::FleetSigning))
    }

    fn from_device_flow() -> Flow {
        Flow {
            name: "FleetFromDeviceFlow".into(),
            ..Flow::verify_flow()
        }
    }
}

#[async_trait]
impl Plugin for FleetPlugin {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn init(&self) -> TrustResult<bool> {
        self.base.register_flow(FLEET_TO_DEVICE_API, Self::to_device_flow())?;
        self.base.register_flow(FLEET_FROM_DEVICE_API, Self::from_device_flow())?;
        info!("Plugin `{}` ready", self.base.name());
        Ok(true)
    }
}
