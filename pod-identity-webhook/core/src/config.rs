/// Token lifetimes below this many seconds are raised to it.
pub const MIN_TOKEN_EXPIRATION: i64 = 600;

pub const DEFAULT_TOKEN_EXPIRATION: i64 = 86400;

pub const DEFAULT_AUDIENCE: &str = "sts.amazonaws.com";

pub const DEFAULT_ANNOTATION_PREFIX: &str = "eks.amazonaws.com";

/// Defaults applied while ingesting ServiceAccounts and ConfigMap snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub default_audience: String,

    /// Always at least [`MIN_TOKEN_EXPIRATION`]; see [`CacheConfig::clamp_token_expiration`].
    pub default_token_expiration: i64,

    pub default_regional_sts: bool,

    /// Prefix of the ServiceAccount annotations, e.g. `eks.amazonaws.com`.
    pub annotation_prefix: String,

    pub compose_role_arn: ComposeRoleArn,
}

/// Expands bare role names into full ARNs.
///
/// When enabled, an annotation value like `my-role` becomes
/// `arn:<partition>:iam::<account_id>:role/my-role`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposeRoleArn {
    pub enabled: bool,
    pub partition: String,
    pub account_id: String,
}

// === impl CacheConfig ===

impl CacheConfig {
    pub fn clamp_token_expiration(secs: i64) -> i64 {
        secs.max(MIN_TOKEN_EXPIRATION)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_audience: DEFAULT_AUDIENCE.to_string(),
            default_token_expiration: DEFAULT_TOKEN_EXPIRATION,
            default_regional_sts: false,
            annotation_prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            compose_role_arn: ComposeRoleArn::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_floor() {
        assert_eq!(CacheConfig::clamp_token_expiration(0), MIN_TOKEN_EXPIRATION);
        assert_eq!(CacheConfig::clamp_token_expiration(-5), MIN_TOKEN_EXPIRATION);
        assert_eq!(CacheConfig::clamp_token_expiration(599), MIN_TOKEN_EXPIRATION);
        assert_eq!(CacheConfig::clamp_token_expiration(3600), 3600);
    }
}
