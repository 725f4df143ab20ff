use crate::{Index, IngestError};
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use pod_identity_webhook_core::{CacheConfig, CacheKey, Entry};
use pod_identity_webhook_k8s_api::{ConfigMap, ResourceExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, trace};

/// The data key holding the JSON snapshot.
pub const CONFIG_DATA_KEY: &str = "config";

/// Identifies the single ConfigMap whose snapshot is indexed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigMapRef {
    pub namespace: String,
    pub name: String,
}

impl IndexNamespacedResource<ConfigMap> for Index {
    fn apply(&mut self, cm: ConfigMap) {
        if !self.is_watched(&cm) {
            trace!(name = %cm.name_any(), "Ignoring configmap");
            return;
        }

        let old = self.last_config_map.take();
        match self.apply_config_map(old.as_ref(), &cm) {
            Ok(()) => self.last_config_map = Some(cm),
            // The new snapshot was applied; only the removal of stale keys failed.
            Err(error @ IngestError::PreviousSnapshot(_)) => {
                error!(%error, "Failed to remove stale configmap entries");
                self.last_config_map = Some(cm);
            }
            Err(error) => {
                error!(%error, "Failed to apply configmap");
                self.last_config_map = old;
            }
        }
    }

    /// Entries stay in place when the ConfigMap is deleted; a later snapshot is diffed against the
    /// last one applied.
    fn delete(&mut self, namespace: String, name: String) {
        if self.config_map.as_ref().is_some_and(|r| r.is(&namespace, &name)) {
            info!(%namespace, %name, "Watched configmap deleted; keeping entries");
        }
    }

    fn reset(&mut self, cms: Vec<ConfigMap>, _removed: NamespacedRemoved) {
        for cm in cms {
            self.apply(cm);
        }
        self.mark_config_map_synced();
    }
}

// === impl Index ===

impl Index {
    /// Applies a full snapshot, removing keys that were present in `old` but not in `new`.
    ///
    /// Nothing is changed if `new` cannot be parsed. If `old` cannot be parsed, the new entries are
    /// still written but no keys are removed.
    pub fn apply_config_map(
        &mut self,
        old: Option<&ConfigMap>,
        new: &ConfigMap,
    ) -> Result<(), IngestError> {
        let snapshot = parse_snapshot(new)?;
        debug!(entries = snapshot.len(), "Applying configmap snapshot");

        let keys = snapshot.keys().cloned().collect::<HashSet<_>>();
        for (key, mut entry) in snapshot {
            if entry.token_expiration == 0 {
                entry.token_expiration = self.config.default_token_expiration;
            }
            entry.token_expiration = CacheConfig::clamp_token_expiration(entry.token_expiration);
            self.set_config_map_entry(key, entry);
        }

        let Some(old) = old else {
            return Ok(());
        };
        let previous =
            parse_snapshot(old).map_err(|error| IngestError::PreviousSnapshot(Box::new(error)))?;
        for key in previous.keys().filter(|k| !keys.contains(*k)) {
            if self.remove_config_map_entry(key) {
                debug!(%key, "Removed configmap entry");
            }
        }
        Ok(())
    }

    fn is_watched(&self, cm: &ConfigMap) -> bool {
        match (self.config_map.as_ref(), cm.namespace()) {
            (Some(r), Some(ns)) => r.is(&ns, &cm.name_any()),
            _ => false,
        }
    }
}

// === impl ConfigMapRef ===

impl ConfigMapRef {
    fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

fn parse_snapshot(cm: &ConfigMap) -> Result<HashMap<CacheKey, Entry>, IngestError> {
    let data = cm
        .data
        .as_ref()
        .and_then(|data| data.get(CONFIG_DATA_KEY))
        .ok_or(IngestError::MissingData(CONFIG_DATA_KEY))?;
    Ok(serde_json::from_str(data)?)
}
