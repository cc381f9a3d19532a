//! Platform facets
//!
//! The trust-flow core talks to the outside world only through these
//! traits:
//!
//! - [`Crypto`]: sign / verify / encrypt / decrypt
//! - [`Keystore`]: CRUD over [`KeyModel`](crate::key::KeyModel) records
//! - [`Data`]: namespaced key-value storage
//! - [`Time`]: clock and date formatting
//! - [`Utils`]: base64url, randomness, UUIDs
//!
//! [`Platform`] bundles one implementation of each with the configuration.

pub mod config;
mod crypto;
mod data;
mod keystore;
mod time;
mod utils;

use std::sync::Arc;

pub use config::Config;
pub use crypto::{Crypto, KeyMaterial};
pub use data::{Data, MemoryData};
pub use keystore::{select_by_role, DataKeystore, KeySelection, Keystore};
pub use time::{SystemClock, Time};
pub use utils::{OsUtils, Utils};

use crate::crypto::Ed25519Crypto;
use crate::error::TrustResult;

/// Facet implementations supplied at construction
///
/// When `keystore` is `None`, a [`DataKeystore`] over `data` is built from
/// the configuration.
#[derive(Clone)]
pub struct Facets {
    /// Crypto facet
    pub crypto: Arc<dyn Crypto>,
    /// Data facet
    pub data: Arc<dyn Data>,
    /// Time facet
    pub time: Arc<dyn Time>,
    /// Utils facet
    pub utils: Arc<dyn Utils>,
    /// Keystore facet override
    pub keystore: Option<Arc<dyn Keystore>>,
}

impl Default for Facets {
    fn default() -> Self {
        Facets {
            crypto: Arc::new(Ed25519Crypto::new()),
            data: Arc::new(MemoryData::new()),
            time: Arc::new(SystemClock),
            utils: Arc::new(OsUtils),
            keystore: None,
        }
    }
}

/// Configuration plus one implementation of every facet
pub struct Platform {
    config: Config,
    crypto: Arc<dyn Crypto>,
    keystore: Arc<dyn Keystore>,
    data: Arc<dyn Data>,
    time: Arc<dyn Time>,
    utils: Arc<dyn Utils>,
}

impl Platform {
    /// Validate the configuration and assemble the facets
    ///
    /// Fails synchronously with [`TrustError::Config`](crate::TrustError::Config)
    /// listing every missing required key.
    pub fn new(config: Config, facets: Facets) -> TrustResult<Self> {
        config.check_config(config::REQUIRED_KEYS)?;

        let keystore = match facets.keystore {
            Some(keystore) => keystore,
            None => Arc::new(
                DataKeystore::new(
                    config.keystore_name(),
                    facets.data.clone(),
                    facets.crypto.clone(),
                    facets.utils.clone(),
                )
                .with_selection(KeySelection::from_config(config.key_selection()))
                .with_self_key_id(config.self_key_id().map(str::to_string)),
            ),
        };

        Ok(Platform {
            config,
            crypto: facets.crypto,
            keystore,
            data: facets.data,
            time: facets.time,
            utils: facets.utils,
        })
    }

    /// Bring the facets up; currently loads the keystore
    pub async fn init(&self) -> TrustResult<()> {
        self.keystore.load().await?;
        Ok(())
    }

    /// Check additional required configuration keys
    pub fn check_config(&self, required: &[&str]) -> TrustResult<bool> {
        self.config.check_config(required)
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crypto facet
    pub fn crypto(&self) -> &Arc<dyn Crypto> {
        &self.crypto
    }

    /// Keystore facet
    pub fn keystore(&self) -> &Arc<dyn Keystore> {
        &self.keystore
    }

    /// Data facet
    pub fn data(&self) -> &Arc<dyn Data> {
        &self.data
    }

    /// Time facet
    pub fn time(&self) -> &Arc<dyn Time> {
        &self.time
    }

    /// Utils facet
    pub fn utils(&self) -> &Arc<dyn Utils> {
        &self.utils
    }
}
