use crate::Notifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The IAM identity configuration cached for a single ServiceAccount.
///
/// An empty `role_arn` means the account is known but has no identity configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    #[serde(rename = "RoleARN")]
    pub role_arn: String,

    #[serde(rename = "Audience")]
    pub audience: String,

    #[serde(rename = "UseRegionalSTS")]
    pub use_regional_sts: bool,

    /// Seconds.
    #[serde(rename = "TokenExpiration")]
    pub token_expiration: i64,
}

/// Identifies a ServiceAccount as `<namespace>/<name>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    pub name: String,
    pub namespace: String,

    /// Subscribe to the arrival of the ServiceAccount when it has not been observed yet.
    pub request_notification: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Response {
    pub role_arn: String,
    pub audience: String,
    pub use_regional_sts: bool,
    pub token_expiration: i64,
    pub found_in_cache: bool,

    /// Set when the caller asked to be notified and the ServiceAccount is unobserved.
    pub notifier: Option<Notifier>,
}

// === impl Entry ===

impl Entry {
    pub fn has_identity(&self) -> bool {
        !self.role_arn.is_empty()
    }
}

// === impl CacheKey ===

impl CacheKey {
    pub fn new(namespace: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", namespace.as_ref(), name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl Request ===

impl Request {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            request_notification: false,
        }
    }

    pub fn with_notification(mut self) -> Self {
        self.request_notification = true;
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.namespace, &self.name)
    }
}

// === impl Response ===

impl Response {
    pub fn found(entry: &Entry) -> Self {
        Self {
            role_arn: entry.role_arn.clone(),
            audience: entry.audience.clone(),
            use_regional_sts: entry.use_regional_sts,
            token_expiration: entry.token_expiration,
            found_in_cache: true,
            notifier: None,
        }
    }

    pub fn not_found(token_expiration: i64) -> Self {
        Self {
            token_expiration,
            ..Default::default()
        }
    }
}
