use crate::{config_map::ConfigMapRef, notify::Notifications};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use pod_identity_webhook_core::{CacheConfig, CacheKey, Entry, Request, Response};
use pod_identity_webhook_k8s_api::{AnnotationKeys, ConfigMap};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::{mpsc, watch};
use tracing::trace;

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds both identity tables and the pending notifications.
///
/// Watch tasks mutate the index through the `kubert::index` traits while holding the write lock;
/// lookups hold the read lock. Releasing waiters happens under the same write lock as the
/// ServiceAccount write that satisfies them, so a woken waiter always observes the new entry.
#[derive(Debug)]
pub struct Index {
    pub(crate) config: CacheConfig,
    pub(crate) annotations: AnnotationKeys,

    /// Keyed by ServiceAccount; absent keys have never been observed.
    service_accounts: HashMap<CacheKey, Observed>,

    /// Keyed by the ConfigMap snapshot's keys.
    config_maps: HashMap<CacheKey, Entry>,

    /// The watched ConfigMap, or `None` when the ConfigMap source is disabled.
    pub(crate) config_map: Option<ConfigMapRef>,

    /// The last snapshot applied, used as the previous state when the next one arrives.
    pub(crate) last_config_map: Option<ConfigMap>,

    notifications: Notifications,

    synced: Synced,
}

/// The state of an observed ServiceAccount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// The ServiceAccount exists but has no role annotation.
    NoIdentity(Entry),
    Identity(Entry),
}

#[derive(Debug)]
struct Synced {
    service_accounts: bool,
    config_map: bool,
    tx: watch::Sender<bool>,
}

// === impl Index ===

impl Index {
    pub fn new(
        config: CacheConfig,
        config_map: Option<ConfigMapRef>,
        refresh_tx: Option<mpsc::Sender<Request>>,
    ) -> Self {
        let annotations = AnnotationKeys::with_prefix(&config.annotation_prefix);
        let synced = Synced::new(config_map.is_none());
        Self {
            config,
            annotations,
            service_accounts: HashMap::default(),
            config_maps: HashMap::default(),
            config_map,
            last_config_map: None,
            notifications: Notifications::new(refresh_tx),
            synced,
        }
    }

    pub fn shared(
        config: CacheConfig,
        config_map: Option<ConfigMapRef>,
        refresh_tx: Option<mpsc::Sender<Request>>,
    ) -> SharedIndex {
        Arc::new(RwLock::new(Self::new(config, config_map, refresh_tx)))
    }

    /// Looks up the identity for a ServiceAccount.
    ///
    /// An annotated ServiceAccount wins over the ConfigMap. When the ServiceAccount has never been
    /// observed and the request opts in, the response carries a notifier that fires once it is.
    pub fn get(&self, req: &Request) -> Response {
        let key = req.key();
        let notifier = match self.service_accounts.get(&key) {
            Some(Observed::Identity(entry)) => {
                trace!(%key, "Found service account");
                return Response::found(entry);
            }
            Some(Observed::NoIdentity(_)) => None,
            None if req.request_notification => Some(self.notifications.subscribe(req)),
            None => None,
        };

        let mut rsp = match self.config_maps.get(&key) {
            Some(entry) => {
                trace!(%key, "Found configmap entry");
                Response::found(entry)
            }
            None => Response::not_found(self.config.default_token_expiration),
        };
        rsp.notifier = notifier;
        rsp
    }

    /// Returns `(use_regional_sts, token_expiration)` for a ServiceAccount.
    ///
    /// Any observed ServiceAccount supplies these, whether or not it has a role. Never subscribes.
    pub fn get_common_configurations(&self, name: &str, namespace: &str) -> (bool, i64) {
        let key = CacheKey::new(namespace, name);
        if let Some(observed) = self.service_accounts.get(&key) {
            let entry = observed.entry();
            return (entry.use_regional_sts, entry.token_expiration);
        }
        if let Some(entry) = self.config_maps.get(&key) {
            return (entry.use_regional_sts, entry.token_expiration);
        }
        (
            self.config.default_regional_sts,
            self.config.default_token_expiration,
        )
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<&Observed> {
        self.service_accounts.get(&CacheKey::new(namespace, name))
    }

    pub fn config_map_entry(&self, namespace: &str, name: &str) -> Option<&Entry> {
        self.config_maps.get(&CacheKey::new(namespace, name))
    }

    /// Renders the ServiceAccount table as a JSON object keyed by `namespace/name`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let table = self
            .service_accounts
            .iter()
            .map(|(key, observed)| (key, observed.entry()))
            .collect::<BTreeMap<_, _>>();
        serde_json::to_string(&table)
    }

    /// Empties both tables. Pending notifications are left in place.
    pub fn clear(&mut self) {
        self.service_accounts.clear();
        self.config_maps.clear();
        self.last_config_map = None;
    }

    /// Becomes `true` once every watched resource has completed its initial list.
    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced.tx.subscribe()
    }

    pub fn has_synced(&self) -> bool {
        *self.synced.tx.borrow()
    }

    pub fn service_accounts_len(&self) -> usize {
        self.service_accounts.len()
    }

    pub fn config_maps_len(&self) -> usize {
        self.config_maps.len()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Replaces the ServiceAccount entry and releases anyone waiting for it.
    pub(crate) fn set_service_account_entry(&mut self, key: CacheKey, entry: Entry) {
        self.service_accounts
            .insert(key.clone(), Observed::from(entry));
        self.notifications.release(&key);
    }

    pub(crate) fn remove_service_account_entry(&mut self, key: &CacheKey) -> bool {
        self.service_accounts.remove(key).is_some()
    }

    pub(crate) fn set_config_map_entry(&mut self, key: CacheKey, entry: Entry) {
        self.config_maps.insert(key, entry);
    }

    pub(crate) fn remove_config_map_entry(&mut self, key: &CacheKey) -> bool {
        self.config_maps.remove(key).is_some()
    }

    pub(crate) fn mark_service_accounts_synced(&mut self) {
        self.synced.service_accounts = true;
        self.synced.publish();
    }

    pub(crate) fn mark_config_map_synced(&mut self) {
        self.synced.config_map = true;
        self.synced.publish();
    }
}

// === impl Observed ===

impl Observed {
    pub fn entry(&self) -> &Entry {
        match self {
            Self::NoIdentity(entry) | Self::Identity(entry) => entry,
        }
    }
}

impl From<Entry> for Observed {
    fn from(entry: Entry) -> Self {
        if entry.has_identity() {
            Self::Identity(entry)
        } else {
            Self::NoIdentity(entry)
        }
    }
}

// === impl Synced ===

impl Synced {
    fn new(config_map_synced: bool) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            service_accounts: false,
            config_map: config_map_synced,
            tx,
        }
    }

    fn publish(&self) {
        let synced = self.service_accounts && self.config_map;
        self.tx.send_if_modified(|current| {
            if *current == synced {
                return false;
            }
            *current = synced;
            true
        });
    }
}
