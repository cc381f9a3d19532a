//! Keystore facet
//!
//! The keystore is the sole owner of authoritative [`KeyModel`] records.
//! Callers receive clones; changes go back through the trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Crypto, Data, Utils};
use crate::error::{TrustError, TrustResult};
use crate::key::{KeyFlags, KeyModel, Origin, Role};

/// Entry under which the ordered key list is persisted
const KEYS_ENTRY: &str = "keys";

/// Which key wins when several match a role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeySelection {
    /// The most recently generated or stored key
    #[default]
    MostRecent,
    /// The oldest matching key
    FirstFound,
}

impl KeySelection {
    /// Parse a configuration value; unknown values keep the default
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("firstFound") => KeySelection::FirstFound,
            _ => KeySelection::MostRecent,
        }
    }
}

/// CRUD over key records
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Load persisted keys, returning how many were found
    async fn load(&self) -> TrustResult<usize>;

    /// Look up a key by id
    async fn get_key(&self, kid: &str) -> TrustResult<Option<KeyModel>>;

    /// Every key, oldest first
    async fn get_keys(&self) -> TrustResult<Vec<KeyModel>>;

    /// This node's own identity key
    async fn get_self_key(&self) -> TrustResult<Option<KeyModel>>;

    /// Signing key for `role` within `fleet_id`
    ///
    /// Only keys with `CAN_SIGN` set and `INVALID` clear qualify. Fails with
    /// [`TrustError::KeyInvalid`] when the only matches are invalid, and with
    /// [`TrustError::KeyNotFound`] when nothing matches.
    async fn get_key_by_role(&self, role: Role, fleet_id: &str) -> TrustResult<KeyModel>;

    /// Generate and store a new key; a random id is assigned when `kid` is `None`
    async fn generate_key(
        &self,
        flags: KeyFlags,
        kid: Option<&str>,
        fleet_id: &str,
    ) -> TrustResult<KeyModel>;

    /// Store an existing key under `flags` and `fleet_id`
    async fn set_key(&self, key: KeyModel, flags: KeyFlags, fleet_id: &str) -> TrustResult<KeyModel>;

    /// Store a key delivered as provisioning JSON
    async fn set_key_from_provision(&self, provision: &str) -> TrustResult<KeyModel>;

    /// Set or clear a flag on a stored key
    async fn set_flag(&self, kid: &str, flag: KeyFlags, on: bool) -> TrustResult<KeyModel>;

    /// Remove a key; `false` if it was not stored
    async fn forget_key(&self, kid: &str) -> TrustResult<bool>;

    /// Persist the current key set
    async fn save_store(&self) -> TrustResult<()>;
}

/// Pick a key for `role` in `fleet_id` from `keys` (oldest first)
///
/// `require_signing` restricts candidates to signing-capable keys; invalid
/// keys never qualify.
pub fn select_by_role(
    keys: &[KeyModel],
    role: Role,
    fleet_id: &str,
    selection: KeySelection,
    require_signing: bool,
) -> TrustResult<KeyModel> {
    let matching = |k: &&KeyModel| k.fleet_id == fleet_id && k.role() == role;
    let usable = |k: &&KeyModel| {
        !k.is_invalid() && (!require_signing || k.has_flag(KeyFlags::CAN_SIGN))
    };

    let found = match selection {
        KeySelection::MostRecent => keys.iter().rev().filter(matching).find(usable),
        KeySelection::FirstFound => keys.iter().filter(matching).find(usable),
    };

    if let Some(key) = found {
        return Ok(key.clone());
    }

    if keys.iter().filter(matching).any(|k| k.is_invalid()) {
        return Err(TrustError::KeyInvalid(format!("{role} in fleet `{fleet_id}`")));
    }
    Err(TrustError::KeyNotFound(format!("{role} in fleet `{fleet_id}`")))
}

/// [`Keystore`] persisted through the [`Data`] facet
///
/// Keys live in memory in insertion order; `save_store` writes them to a
/// single entry of the configured store. Writers hold the lock for the
/// whole mutation, so readers never see a half-applied change.
pub struct DataKeystore {
    store: String,
    data: Arc<dyn Data>,
    crypto: Arc<dyn Crypto>,
    utils: Arc<dyn Utils>,
    selection: KeySelection,
    self_key_id: Option<String>,
    keys: RwLock<Vec<KeyModel>>,
}

impl DataKeystore {
    /// Create an empty keystore bound to `store`
    pub fn new(
        store: impl Into<String>,
        data: Arc<dyn Data>,
        crypto: Arc<dyn Crypto>,
        utils: Arc<dyn Utils>,
    ) -> Self {
        DataKeystore {
            store: store.into(),
            data,
            crypto,
            utils,
            selection: KeySelection::default(),
            self_key_id: None,
            keys: RwLock::new(Vec::new()),
        }
    }

    /// Use a different tie-break policy for role lookups
    pub fn with_selection(mut self, selection: KeySelection) -> Self {
        self.selection = selection;
        self
    }

    /// Designate which key `get_self_key` returns
    pub fn with_self_key_id(mut self, kid: Option<String>) -> Self {
        self.self_key_id = kid;
        self
    }

    /// Insert or replace by id; the key becomes the most recent
    async fn put(&self, key: KeyModel) -> KeyModel {
        let mut keys = self.keys.write().await;
        keys.retain(|k| k.key_id != key.key_id);
        keys.push(key.clone());
        key
    }
}

#[async_trait]
impl Keystore for DataKeystore {
    async fn load(&self) -> TrustResult<usize> {
        self.data
            .create_store(&self.store, json!({ KEYS_ENTRY: [] }))
            .await?;

        let stored = match self.data.get(&self.store, KEYS_ENTRY).await? {
            Some(value) => serde_json::from_value::<Vec<KeyModel>>(value)?,
            None => Vec::new(),
        };

        let count = stored.len();
        *self.keys.write().await = stored;
        info!("Keystore `{}` loaded {} keys", self.store, count);
        Ok(count)
    }

    async fn get_key(&self, kid: &str) -> TrustResult<Option<KeyModel>> {
        let keys = self.keys.read().await;
        Ok(keys.iter().find(|k| k.key_id == kid).cloned())
    }

    async fn get_keys(&self) -> TrustResult<Vec<KeyModel>> {
        Ok(self.keys.read().await.clone())
    }

    async fn get_self_key(&self) -> TrustResult<Option<KeyModel>> {
        let keys = self.keys.read().await;
        let found = match &self.self_key_id {
            Some(kid) => keys.iter().find(|k| &k.key_id == kid),
            None => keys
                .iter()
                .rev()
                .find(|k| k.has_flag(KeyFlags::OUR_OWN) && !k.is_invalid()),
        };
        Ok(found.cloned())
    }

    async fn get_key_by_role(&self, role: Role, fleet_id: &str) -> TrustResult<KeyModel> {
        let keys = self.keys.read().await;
        select_by_role(&keys, role, fleet_id, self.selection, true)
    }

    async fn generate_key(
        &self,
        flags: KeyFlags,
        kid: Option<&str>,
        fleet_id: &str,
    ) -> TrustResult<KeyModel> {
        let material = self.crypto.generate_key().await?;
        let kid = kid
            .map(str::to_string)
            .unwrap_or_else(|| self.utils.make_uuid());

        let mut flags = flags | KeyFlags::OUR_OWN;
        if flags.origin() == Origin::Unknown {
            flags = flags.with_origin(Origin::Generated);
        }

        let key = KeyModel::new(kid, fleet_id, material.key_data, material.public_key, flags);
        debug!(
            "Generated key `{}` role={} fleet=`{}`",
            key.key_id,
            key.role(),
            key.fleet_id
        );
        Ok(self.put(key).await)
    }

    async fn set_key(&self, mut key: KeyModel, flags: KeyFlags, fleet_id: &str) -> TrustResult<KeyModel> {
        key.flags = flags;
        key.fleet_id = fleet_id.to_string();
        if key.origin() == Origin::Unknown {
            key.set_origin(Origin::External);
        }
        debug!("Stored key `{}` role={}", key.key_id, key.role());
        Ok(self.put(key).await)
    }

    async fn set_key_from_provision(&self, provision: &str) -> TrustResult<KeyModel> {
        let mut key: KeyModel = serde_json::from_str(provision)?;
        if key.key_id.is_empty() {
            return Err(TrustError::Format("provisioned key has an empty kid".into()));
        }
        if key.origin() == Origin::Unknown {
            key.set_origin(Origin::Pki);
        }
        debug!("Provisioned key `{}` role={}", key.key_id, key.role());
        Ok(self.put(key).await)
    }

    async fn set_flag(&self, kid: &str, flag: KeyFlags, on: bool) -> TrustResult<KeyModel> {
        let mut keys = self.keys.write().await;
        let key = keys
            .iter_mut()
            .find(|k| k.key_id == kid)
            .ok_or_else(|| TrustError::KeyNotFound(format!("kid `{kid}`")))?;
        key.set_flag(flag, on);
        Ok(key.clone())
    }

    async fn forget_key(&self, kid: &str) -> TrustResult<bool> {
        let mut keys = self.keys.write().await;
        let before = keys.len();
        keys.retain(|k| k.key_id != kid);
        let removed = keys.len() != before;
        if removed {
            debug!("Forgot key `{}`", kid);
        }
        Ok(removed)
    }

    async fn save_store(&self) -> TrustResult<()> {
        let snapshot: Value = {
            let keys = self.keys.read().await;
            serde_json::to_value(&*keys)?
        };
        self.data.set(&self.store, KEYS_ENTRY, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Crypto;
    use crate::platform::{MemoryData, OsUtils};

    fn keystore(data: Arc<dyn Data>) -> DataKeystore {
        DataKeystore::new(
            "keystore",
            data,
            Arc::new(Ed25519Crypto::new()),
            Arc::new(OsUtils),
        )
    }

    fn fleet_signer() -> KeyFlags {
        KeyFlags::CAN_SIGN.with_role(Role::FleetSigning)
    }

    #[tokio::test]
    async fn test_generate_assigns_id_and_origin() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();

        let key = ks.generate_key(KeyFlags::CAN_SIGN, None, "fleet-a").await.unwrap();
        assert_eq!(key.key_id.len(), 36);
        assert_eq!(key.origin(), Origin::Generated);
        assert!(key.has_flag(KeyFlags::OUR_OWN));
        assert_eq!(ks.get_key(&key.key_id).await.unwrap(), Some(key));
    }

    #[tokio::test]
    async fn test_most_recent_key_wins() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();

        ks.generate_key(fleet_signer(), Some("old"), "fleet-a").await.unwrap();
        ks.generate_key(fleet_signer(), Some("new"), "fleet-a").await.unwrap();

        let key = ks.get_key_by_role(Role::FleetSigning, "fleet-a").await.unwrap();
        assert_eq!(key.key_id, "new");
    }

    #[tokio::test]
    async fn test_first_found_policy() {
        let ks = keystore(Arc::new(MemoryData::new())).with_selection(KeySelection::FirstFound);
        ks.load().await.unwrap();

        ks.generate_key(fleet_signer(), Some("old"), "fleet-a").await.unwrap();
        ks.generate_key(fleet_signer(), Some("new"), "fleet-a").await.unwrap();

        let key = ks.get_key_by_role(Role::FleetSigning, "fleet-a").await.unwrap();
        assert_eq!(key.key_id, "old");
    }

    #[tokio::test]
    async fn test_invalid_and_incapable_keys_are_skipped() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();

        ks.generate_key(fleet_signer(), Some("good"), "fleet-a").await.unwrap();
        ks.generate_key(fleet_signer(), Some("revoked"), "fleet-a").await.unwrap();
        ks.generate_key(
            KeyFlags::empty().with_role(Role::FleetSigning),
            Some("verify-only"),
            "fleet-a",
        )
        .await
        .unwrap();
        ks.set_flag("revoked", KeyFlags::INVALID, true).await.unwrap();

        let key = ks.get_key_by_role(Role::FleetSigning, "fleet-a").await.unwrap();
        assert_eq!(key.key_id, "good");
    }

    #[tokio::test]
    async fn test_role_lookup_errors() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();

        assert!(matches!(
            ks.get_key_by_role(Role::FleetSigning, "fleet-a").await,
            Err(TrustError::KeyNotFound(_))
        ));

        ks.generate_key(fleet_signer(), Some("only"), "fleet-a").await.unwrap();
        ks.set_flag("only", KeyFlags::INVALID, true).await.unwrap();
        assert!(matches!(
            ks.get_key_by_role(Role::FleetSigning, "fleet-a").await,
            Err(TrustError::KeyInvalid(_))
        ));

        // Other fleets do not match
        assert!(matches!(
            ks.get_key_by_role(Role::FleetSigning, "fleet-b").await,
            Err(TrustError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let data: Arc<dyn Data> = Arc::new(MemoryData::new());
        let ks = keystore(data.clone());
        ks.load().await.unwrap();

        ks.generate_key(fleet_signer(), Some("a"), "fleet-a").await.unwrap();
        ks.generate_key(fleet_signer(), Some("b"), "fleet-a").await.unwrap();
        ks.save_store().await.unwrap();

        let reopened = keystore(data);
        assert_eq!(reopened.load().await.unwrap(), 2);
        let ids: Vec<_> = reopened
            .get_keys()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.key_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_provision_and_forget() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();

        let source = ks.generate_key(fleet_signer(), Some("gw"), "fleet-a").await.unwrap();
        ks.forget_key("gw").await.unwrap();

        let provision = source.export().to_json().unwrap();
        let provisioned = ks.set_key_from_provision(&provision).await.unwrap();
        assert!(!provisioned.can_sign());
        assert_eq!(provisioned.public_key, source.public_key);

        assert!(ks.forget_key("gw").await.unwrap());
        assert!(!ks.forget_key("gw").await.unwrap());
        assert!(ks.set_key_from_provision("{not json").await.is_err());
    }

    #[tokio::test]
    async fn test_self_key() {
        let ks = keystore(Arc::new(MemoryData::new()));
        ks.load().await.unwrap();
        assert_eq!(ks.get_self_key().await.unwrap(), None);

        let own = ks.generate_key(KeyFlags::CAN_SIGN, Some("me"), "fleet-a").await.unwrap();
        let external = own.export();
        ks.set_key(
            KeyModel { key_id: "peer".into(), ..external },
            KeyFlags::empty(),
            "fleet-a",
        )
        .await
        .unwrap();

        assert_eq!(ks.get_self_key().await.unwrap().map(|k| k.key_id), Some("me".into()));
    }
}
