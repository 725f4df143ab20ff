use crate::{Index, IngestError};
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use pod_identity_webhook_core::{role_arn, CacheConfig, CacheKey, Entry};
use pod_identity_webhook_k8s_api::{AnnotationKeys, ObjectRef, ServiceAccount};
use std::collections::BTreeMap;
use tracing::{debug, info_span, warn};

/// The payload of a ServiceAccount deletion.
#[derive(Clone, Debug)]
pub enum Deletion {
    /// The deleted object itself.
    Live(ServiceAccount),

    /// The last known identity of an object whose deletion was not observed directly.
    Tombstone(ObjectRef<ServiceAccount>),
}

impl IndexNamespacedResource<ServiceAccount> for Index {
    fn apply(&mut self, sa: ServiceAccount) {
        if let Err(error) = self.apply_service_account(&sa) {
            warn!(%error, "Ignoring service account");
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_service_account(Deletion::Tombstone(
            ObjectRef::new(&name).within(&namespace),
        ));
    }

    fn reset(&mut self, sas: Vec<ServiceAccount>, removed: NamespacedRemoved) {
        for sa in sas {
            self.apply(sa);
        }
        for (namespace, names) in removed {
            for name in names {
                self.delete_service_account(Deletion::Tombstone(
                    ObjectRef::new(&name).within(&namespace),
                ));
            }
        }
        self.mark_service_accounts_synced();
    }
}

// === impl Index ===

impl Index {
    /// Records a ServiceAccount from its annotations and releases anyone waiting for it.
    ///
    /// A ServiceAccount without a role annotation is still recorded, with an empty role.
    pub fn apply_service_account(&mut self, sa: &ServiceAccount) -> Result<(), IngestError> {
        let key = key_of(sa.metadata.namespace.as_deref(), sa.metadata.name.as_deref())?;
        let _span = info_span!("service_account", %key).entered();

        let empty = BTreeMap::new();
        let annotations = sa.metadata.annotations.as_ref().unwrap_or(&empty);
        let entry = mk_entry(&self.config, &self.annotations, annotations);
        debug!(role_arn = %entry.role_arn, "Updating");
        self.set_service_account_entry(key, entry);
        Ok(())
    }

    pub fn delete_service_account(&mut self, deletion: Deletion) {
        match deletion.key() {
            Ok(key) => {
                if self.remove_service_account_entry(&key) {
                    debug!(%key, "Deleted service account");
                }
            }
            Err(error) => warn!(%error, "Dropping service account deletion"),
        }
    }
}

// === impl Deletion ===

impl Deletion {
    pub fn key(&self) -> Result<CacheKey, IngestError> {
        match self {
            Self::Live(sa) => key_of(sa.metadata.namespace.as_deref(), sa.metadata.name.as_deref()),
            Self::Tombstone(obj) => key_of(obj.namespace.as_deref(), Some(obj.name.as_str())),
        }
    }
}

fn key_of(namespace: Option<&str>, name: Option<&str>) -> Result<CacheKey, IngestError> {
    match (namespace, name) {
        (Some(ns), Some(name)) if !ns.is_empty() && !name.is_empty() => Ok(CacheKey::new(ns, name)),
        _ => Err(IngestError::MissingIdentity {
            kind: "ServiceAccount",
        }),
    }
}

fn mk_entry(
    config: &CacheConfig,
    keys: &AnnotationKeys,
    annotations: &BTreeMap<String, String>,
) -> Entry {
    let role_arn = match annotations.get(&keys.role_arn) {
        Some(value) => {
            let arn = config.compose_role_arn.resolve(value);
            if !role_arn::is_valid(&arn) {
                warn!(%arn, "Role ARN is not a valid IAM role ARN; using it anyway");
            }
            arn
        }
        None => String::new(),
    };

    let audience = annotations
        .get(&keys.audience)
        .cloned()
        .unwrap_or_else(|| config.default_audience.clone());

    let use_regional_sts = match annotations.get(&keys.sts_regional_endpoints) {
        Some(value) => parse_bool(value).unwrap_or_else(|| {
            debug!(%value, "Ignoring invalid {}", keys.sts_regional_endpoints);
            config.default_regional_sts
        }),
        None => config.default_regional_sts,
    };

    let token_expiration = match annotations.get(&keys.token_expiration) {
        Some(value) => value.parse::<i64>().unwrap_or_else(|error| {
            debug!(%value, %error, "Ignoring invalid {}", keys.token_expiration);
            config.default_token_expiration
        }),
        None => config.default_token_expiration,
    };

    Entry {
        role_arn,
        audience,
        use_regional_sts,
        token_expiration: CacheConfig::clamp_token_expiration(token_expiration),
    }
}

/// Accepts `1`, `t`, `true`, `0`, `f` and `false`, with `t`/`f` and the words also in upper or
/// title case.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn bool_spellings() {
        for v in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        for v in ["", "yes", "tRuE", " true", "2"] {
            assert_eq!(parse_bool(v), None, "{v}");
        }
    }
}
