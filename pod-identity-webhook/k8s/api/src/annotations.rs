//! ServiceAccount annotations carrying the IAM identity.
//!
//! Each key is `<prefix>/<suffix>`, where the prefix is configurable and defaults to
//! `eks.amazonaws.com`.

pub const ROLE_ARN: &str = "role-arn";
pub const AUDIENCE: &str = "audience";
pub const STS_REGIONAL_ENDPOINTS: &str = "sts-regional-endpoints";
pub const TOKEN_EXPIRATION: &str = "token-expiration";

/// Fully-qualified annotation keys for a given prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationKeys {
    pub role_arn: String,
    pub audience: String,
    pub sts_regional_endpoints: String,
    pub token_expiration: String,
}

impl AnnotationKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        let key = |suffix: &str| format!("{prefix}/{suffix}");
        Self {
            role_arn: key(ROLE_ARN),
            audience: key(AUDIENCE),
            sts_regional_endpoints: key(STS_REGIONAL_ENDPOINTS),
            token_expiration: key(TOKEN_EXPIRATION),
        }
    }
}
