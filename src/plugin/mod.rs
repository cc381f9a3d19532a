//! Plugin system
//!
//! A plugin adds named APIs to an [`SdkWrapper`] during bring-up. Plugins are
//! built from a [`PluginBuilder`] by a [`PluginFactory`], and factories are
//! looked up by name in a [`PluginRegistry`] so configuration can list them.
//!
//! Plugins hold only a weak reference back to the wrapper, which owns them.

mod fleet;

pub use fleet::{FleetPlugin, FLEET_FROM_DEVICE_API, FLEET_PLUGIN, FLEET_TO_DEVICE_API};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{TrustError, TrustResult};
use crate::flow::Flow;
use crate::sdk::{api_from_flow, Implementation, SdkWrapper};

/// Extension loaded into an [`SdkWrapper`]
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &str;

    /// Register the plugin's APIs; `false` aborts bring-up
    async fn init(&self) -> TrustResult<bool>;
}

/// Builds a plugin from validated construction arguments
pub type PluginFactory = fn(PluginBuilder) -> TrustResult<Arc<dyn Plugin>>;

/// Construction arguments for a plugin
///
/// Every field is required; [`build`](PluginBuilder::build) reports the
/// first one missing.
#[derive(Default)]
pub struct PluginBuilder {
    name: Option<String>,
    implementation: Option<Arc<Implementation>>,
    wrapper: Option<Weak<SdkWrapper>>,
}

impl PluginBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with the implementation and wrapper taken from `wrapper`
    pub fn for_wrapper(wrapper: &Arc<SdkWrapper>) -> Self {
        PluginBuilder {
            name: None,
            implementation: Some(wrapper.implementation().clone()),
            wrapper: Some(Arc::downgrade(wrapper)),
        }
    }

    /// Set the plugin name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the implementation
    pub fn implementation(mut self, implementation: Arc<Implementation>) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Set the owning wrapper
    pub fn wrapper(mut self, wrapper: &Arc<SdkWrapper>) -> Self {
        self.wrapper = Some(Arc::downgrade(wrapper));
        self
    }

    /// Validate and produce the shared plugin state
    pub fn build(self) -> TrustResult<PluginBase> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            Some(_) => return Err(TrustError::PluginConstruction("plugin name is empty".into())),
            None => return Err(TrustError::PluginConstruction("plugin name is missing".into())),
        };
        let implementation = self.implementation.ok_or_else(|| {
            TrustError::PluginConstruction(format!("plugin `{name}` has no implementation"))
        })?;
        let wrapper = self.wrapper.ok_or_else(|| {
            TrustError::PluginConstruction(format!("plugin `{name}` has no wrapper"))
        })?;

        Ok(PluginBase {
            name,
            implementation,
            wrapper,
        })
    }
}

/// State every plugin carries
pub struct PluginBase {
    name: String,
    implementation: Arc<Implementation>,
    wrapper: Weak<SdkWrapper>,
}

impl PluginBase {
    /// Plugin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform and flow engine
    pub fn implementation(&self) -> &Arc<Implementation> {
        &self.implementation
    }

    /// Owning wrapper, if it is still alive
    pub fn wrapper(&self) -> TrustResult<Arc<SdkWrapper>> {
        self.wrapper
            .upgrade()
            .ok_or_else(|| TrustError::PluginInit(self.name.clone()))
    }

    /// Compile `flow` and expose it as API `api`
    pub fn register_flow(&self, api: &str, flow: Flow) -> TrustResult<()> {
        let compiled = self.implementation.engine().compile(flow)?;
        debug!("Plugin `{}` registers API `{}`", self.name, api);
        self.wrapper()?.register_api(api, api_from_flow(compiled));
        Ok(())
    }
}

impl fmt::Debug for PluginBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBase")
            .field("name", &self.name)
            .field("wrapper_alive", &(self.wrapper.strong_count() > 0))
            .finish()
    }
}

/// Plugin factories by name
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Registry with no factories
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plugins
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FLEET_PLUGIN, FleetPlugin::factory);
        registry
    }

    /// Add or replace a factory
    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Look up a factory
    pub fn get(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).copied()
    }

    /// Registered factory names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
