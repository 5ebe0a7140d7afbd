//! Short-ARN expansion.
//!
//! Conductors usually reference functions by short name; the full ARN is
//! assembled at invoke time from the deployment environment.

use crate::error::{Result, SequenceError};

pub const STAGE_ENV: &str = "AWS_STAGE";
pub const ACCOUNT_ENV: &str = "AWS_ACCOUNT_ID";
pub const REGION_ENV: &str = "AWS_REGION";

/// The deployment identity used for ARN expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsEnv {
    pub stage: String,
    pub account_id: String,
    pub region: String,
}

impl AwsEnv {
    /// Read the deployment identity from the process environment. A missing
    /// variable is a fatal error at invoke time.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            stage: require(STAGE_ENV)?,
            account_id: require(ACCOUNT_ENV)?,
            region: require(REGION_ENV)?,
        })
    }
}

fn require(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(SequenceError::MissingEnv(name))
}

/// Expand a short function name into a full ARN. Names that already contain
/// a `:` are assumed to be full ARNs and pass through unchanged.
pub fn expand_arn(name: &str, env: &AwsEnv) -> String {
    if name.contains(':') {
        return name.to_string();
    }
    format!(
        "arn:aws:lambda:{}:{}:function:{}-{}",
        env.region, env.account_id, name, env.stage
    )
}

/// [`expand_arn`] against the process environment.
pub fn expand_function_arn(name: &str) -> Result<String> {
    if name.contains(':') {
        return Ok(name.to_string());
    }
    Ok(expand_arn(name, &AwsEnv::from_env()?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> AwsEnv {
        AwsEnv {
            stage: "dev".into(),
            account_id: "123456789012".into(),
            region: "us-east-1".into(),
        }
    }

    #[test]
    fn test_expand_short_name() {
        assert_eq!(
            expand_arn("fetch", &env()),
            "arn:aws:lambda:us-east-1:123456789012:function:fetch-dev"
        );
    }

    #[test]
    fn test_full_arn_passes_through() {
        let full = "arn:aws:lambda:eu-west-1:999:function:other-prod";
        assert_eq!(expand_arn(full, &env()), full);
        // And without touching the environment at all.
        assert_eq!(expand_function_arn(full).unwrap(), full);
    }

    #[test]
    fn test_missing_env_is_fatal() {
        // Scoped to a variable name no other test uses.
        let err = require("AWS_STAGE_DOES_NOT_EXIST_FOR_TEST");
        assert!(err.is_err());
    }
}
