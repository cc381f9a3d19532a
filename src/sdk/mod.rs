//! SDK facade and bring-up
//!
//! [`Sdk::init`] validates the configuration, brings the platform up, builds
//! the [`SdkWrapper`] with the default flows, then loads the configured
//! plugins. The whole sequence is bounded by `initTimeoutMs`.
//!
//! ```rust,no_run
//! use trustflow::envelope::Envelope;
//! use trustflow::platform::{Config, Facets};
//! use trustflow::plugin::PluginRegistry;
//! use trustflow::sdk::Sdk;
//!
//! # async fn run() -> trustflow::TrustResult<()> {
//! let config = Config::from_json(r#"{"fleetId": "fleet-a", "plugins": ["fleet"]}"#)?;
//! let sdk = Sdk::init(config, Facets::default(), &PluginRegistry::with_defaults()).await?;
//!
//! let signed = sdk.call("sign", Envelope::new(b"device-reading-42")).await?;
//! println!("{}", signed.envelope().serialize()?);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::envelope::Envelope;
use crate::error::{TrustError, TrustResult};
use crate::flow::{default_flows, CompiledFlow, FlowEngine, FlowOutput};
use crate::platform::{Config, Facets, Platform};
use crate::plugin::{Plugin, PluginBuilder, PluginRegistry};

/// Callable API: one envelope in, a flow result out
pub type ApiFn = Arc<dyn Fn(Envelope) -> BoxFuture<'static, TrustResult<FlowOutput>> + Send + Sync>;

/// Wrap a compiled flow as an [`ApiFn`]
pub fn api_from_flow(flow: Arc<CompiledFlow>) -> ApiFn {
    Arc::new(move |envelope: Envelope| {
        let flow = flow.clone();
        async move { flow.run(envelope).await }.boxed()
    })
}

/// Platform plus the engine that compiles flows against it
pub struct Implementation {
    platform: Arc<Platform>,
    engine: FlowEngine,
}

impl Implementation {
    /// Engine over `platform`
    pub fn new(platform: Arc<Platform>) -> TrustResult<Self> {
        let engine = FlowEngine::new(platform.clone())?;
        Ok(Implementation { platform, engine })
    }

    /// Platform facets
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// Flow engine
    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }
}

/// Facade over the registered APIs and loaded plugins
pub struct SdkWrapper {
    implementation: Arc<Implementation>,
    apis: RwLock<HashMap<String, ApiFn>>,
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
    default_flows: HashMap<String, Arc<CompiledFlow>>,
}

impl SdkWrapper {
    /// Compile the default flows and expose them as APIs
    pub fn new(implementation: Arc<Implementation>) -> TrustResult<Arc<Self>> {
        let mut apis = HashMap::new();
        let mut flows = HashMap::new();

        for (api, flow) in default_flows() {
            let compiled = implementation.engine().compile(flow)?;
            apis.insert(api.to_string(), api_from_flow(compiled.clone()));
            flows.insert(compiled.name().to_string(), compiled);
        }

        Ok(Arc::new(SdkWrapper {
            implementation,
            apis: RwLock::new(apis),
            plugins: RwLock::new(HashMap::new()),
            default_flows: flows,
        }))
    }

    /// Platform and flow engine
    pub fn implementation(&self) -> &Arc<Implementation> {
        &self.implementation
    }

    /// Look up an API
    pub fn api(&self, name: &str) -> Option<ApiFn> {
        self.apis
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Invoke an API by name
    pub async fn call(&self, name: &str, envelope: Envelope) -> TrustResult<FlowOutput> {
        let api = self
            .api(name)
            .ok_or_else(|| TrustError::ApiNotFound(name.to_string()))?;
        api(envelope).await
    }

    /// Register an API; an existing one with the same name is replaced
    pub fn register_api(&self, name: &str, api: ApiFn) {
        if name.is_empty() {
            warn!("Ignoring API registration with an empty name");
            return;
        }
        let replaced = self
            .apis
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), api)
            .is_some();
        if replaced {
            debug!("API `{}` replaced", name);
        }
    }

    /// Names of every registered API
    pub fn api_names(&self) -> Vec<String> {
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = apis.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Look up a loaded plugin
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Add a plugin under its own name; `None` is ignored
    pub fn register_plugin(&self, plugin: Option<Arc<dyn Plugin>>) {
        let Some(plugin) = plugin else {
            return;
        };
        let name = plugin.name().to_string();
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, plugin);
    }

    /// Snapshot of the loaded plugins
    pub fn plugins(&self) -> HashMap<String, Arc<dyn Plugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Compiled default flow by flow name, e.g. `SignFlow`
    pub fn default_flow(&self, name: &str) -> Option<Arc<CompiledFlow>> {
        self.default_flows.get(name).cloned()
    }
}

/// SDK entry point
pub struct Sdk;

impl Sdk {
    /// Bring the SDK up
    ///
    /// Fails with [`TrustError::Config`] before anything async happens if a
    /// required key is missing, and with [`TrustError::InitTimeout`] if
    /// bring-up outlasts the configured bound.
    pub async fn init(
        config: Config,
        facets: Facets,
        registry: &PluginRegistry,
    ) -> TrustResult<Arc<SdkWrapper>> {
        let timeout = config.init_timeout();
        let platform = Platform::new(config, facets)?;

        match tokio::time::timeout(timeout, Self::bring_up(platform, registry)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("SDK bring-up exceeded {:?}", timeout);
                Err(TrustError::InitTimeout(timeout))
            }
        }
    }

    async fn bring_up(platform: Platform, registry: &PluginRegistry) -> TrustResult<Arc<SdkWrapper>> {
        platform.init().await?;
        let plugin_names = platform.config().plugins()?;

        let implementation = Arc::new(Implementation::new(Arc::new(platform))?);
        let wrapper = SdkWrapper::new(implementation)?;

        let mut plugins = Vec::with_capacity(plugin_names.len());
        for name in &plugin_names {
            let factory = registry.get(name).ok_or_else(|| {
                TrustError::PluginConstruction(format!("no factory named `{name}`"))
            })?;
            plugins.push(factory(PluginBuilder::for_wrapper(&wrapper).name(name.as_str()))?);
        }

        for plugin in plugins {
            wrapper.register_plugin(Some(plugin.clone()));
            if !plugin.init().await? {
                warn!("Plugin `{}` refused to start", plugin.name());
                return Err(TrustError::PluginInit(plugin.name().to_string()));
            }
            debug!("Plugin `{}` initialized", plugin.name());
        }

        info!(
            "SDK ready for fleet `{}` with {} plugins",
            wrapper.implementation().engine().fleet_id(),
            plugin_names.len()
        );
        Ok(wrapper)
    }
}
