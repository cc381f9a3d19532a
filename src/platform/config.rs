//! SDK configuration
//!
//! Configuration is a JSON object. Only `fleetId` is mandatory; the rest
//! falls back to defaults.
//!
//! ```json
//! {
//!   "fleetId": "fleet-a",
//!   "keystore": "keystore",
//!   "selfKeyId": "device-1",
//!   "initTimeoutMs": 5000,
//!   "keySelection": "mostRecent",
//!   "plugins": ["fleet"]
//! }
//! ```

use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{TrustError, TrustResult};

/// Keys every configuration must carry
pub const REQUIRED_KEYS: &[&str] = &["fleetId"];

/// Default keystore store name
pub const DEFAULT_KEYSTORE: &str = "keystore";

/// Default bound on SDK bring-up
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed configuration object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
}

impl Config {
    /// Wrap a JSON object
    pub fn new(values: Map<String, Value>) -> Self {
        Config { values }
    }

    /// Parse configuration text; anything but a JSON object is rejected
    pub fn from_json(json: &str) -> TrustResult<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(values) => Ok(Config { values }),
            other => Err(TrustError::Format(format!(
                "configuration must be a JSON object, got {other}"
            ))),
        }
    }

    /// Succeeds only if every key in `required` is present
    ///
    /// The error lists every missing key, in the order requested.
    pub fn check_config(&self, required: &[&str]) -> TrustResult<bool> {
        let missing: Vec<String> = required
            .iter()
            .filter(|k| !self.values.contains_key(**k))
            .map(|k| k.to_string())
            .collect();

        if missing.is_empty() {
            Ok(true)
        } else {
            Err(TrustError::Config { missing })
        }
    }

    /// Raw value lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value lookup
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Fleet this node belongs to
    pub fn fleet_id(&self) -> TrustResult<&str> {
        self.get_str("fleetId").ok_or_else(|| TrustError::Config {
            missing: vec!["fleetId".to_string()],
        })
    }

    /// Store name used by the keystore
    pub fn keystore_name(&self) -> &str {
        self.get_str("keystore").unwrap_or(DEFAULT_KEYSTORE)
    }

    /// Key returned by `Keystore::get_self_key`, if pinned
    pub fn self_key_id(&self) -> Option<&str> {
        self.get_str("selfKeyId")
    }

    /// Tie-break policy name for role lookups
    pub fn key_selection(&self) -> Option<&str> {
        self.get_str("keySelection")
    }

    /// Bound on SDK bring-up
    pub fn init_timeout(&self) -> Duration {
        self.values
            .get("initTimeoutMs")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INIT_TIMEOUT)
    }

    /// Plugin factory names, in bring-up order
    pub fn plugins(&self) -> TrustResult<Vec<String>> {
        match self.values.get("plugins") {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        TrustError::Format(format!("plugin reference must be a string, got {item}"))
                    })
                })
                .collect(),
            Some(other) => Err(TrustError::Format(format!(
                "`plugins` must be an array, got {other}"
            ))),
        }
    }
}
