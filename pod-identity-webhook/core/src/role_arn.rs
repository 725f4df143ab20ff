//! IAM role ARN composition and shape checks.

use crate::ComposeRoleArn;
use once_cell::sync::Lazy;
use regex::Regex;

static ROLE_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws[a-z0-9-]*:iam::(\d{12}|aws):role/[\w+=,.@/-]+$")
        .expect("role ARN regex must compile")
});

/// Returns true if `arn` has the shape of an IAM role ARN.
pub fn is_valid(arn: &str) -> bool {
    ROLE_ARN.is_match(arn)
}

fn is_qualified(value: &str) -> bool {
    value.starts_with("arn:")
}

// === impl ComposeRoleArn ===

impl ComposeRoleArn {
    /// Expands a bare role name into a full ARN when composition is enabled. Qualified ARNs are
    /// returned unchanged.
    pub fn resolve(&self, value: &str) -> String {
        if !self.enabled || is_qualified(value) {
            return value.to_string();
        }
        format!(
            "arn:{}:iam::{}:role/{}",
            self.partition, self.account_id, value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> ComposeRoleArn {
        ComposeRoleArn {
            enabled: true,
            partition: "aws-cn".to_string(),
            account_id: "111122223333".to_string(),
        }
    }

    #[test]
    fn valid_shapes() {
        for arn in [
            "arn:aws:iam::111122223333:role/r1",
            "arn:aws-cn:iam::111122223333:role/path/to/r1",
            "arn:aws-us-gov:iam::111122223333:role/r1",
            "arn:aws:iam::aws:role/service-role/r1",
            "arn:aws:iam::111122223333:role/r+=,.@_-1",
        ] {
            assert!(is_valid(arn), "{arn} must be valid");
        }
    }

    #[test]
    fn invalid_shapes() {
        for arn in [
            "",
            "r1",
            "arn:aws:iam::1111:role/r1",
            "arn:aws:iam::111122223333:user/u1",
            "arn:aws:s3:::bucket",
            "arn:aws:iam::111122223333:role/",
            "arn:aws:iam::111122223333:role/a b",
            "arn:aws:iam::111122223333:role/r1\n",
            "arn:aws:iam::111122223333:role/r*",
        ] {
            assert!(!is_valid(arn), "{arn} must be invalid");
        }
    }

    #[test]
    fn composes_bare_names() {
        assert_eq!(
            composer().resolve("r1"),
            "arn:aws-cn:iam::111122223333:role/r1"
        );
        assert_eq!(
            composer().resolve("path/r1"),
            "arn:aws-cn:iam::111122223333:role/path/r1"
        );
    }

    #[test]
    fn qualified_arns_unchanged() {
        let arn = "arn:aws:iam::444455556666:role/r1";
        assert_eq!(composer().resolve(arn), arn);
    }

    #[test]
    fn disabled_leaves_value() {
        assert_eq!(ComposeRoleArn::default().resolve("r1"), "r1");
    }
}
