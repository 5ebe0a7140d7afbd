//! Wrapper configuration.

use relay_sequence::AwsEnv;

/// Options applied to every invocation a [`crate::Runtime`] handles.
#[derive(Debug, Clone, Default)]
pub struct WrapperOptions {
    /// ARN of a tracker function to notify after each progression of an
    /// in-flight sequence.
    pub sequence_tracker: Option<String>,

    /// Maximum self-invocation count before the wrapper refuses to run.
    /// `None` disables the check.
    pub call_depth_limit: Option<u32>,

    /// Deployment identity for short-ARN expansion. When unset, the process
    /// environment is consulted at invoke time.
    pub aws_env: Option<AwsEnv>,
}

impl WrapperOptions {
    pub fn with_tracker(mut self, arn: impl Into<String>) -> Self {
        self.sequence_tracker = Some(arn.into());
        self
    }

    pub fn with_call_depth_limit(mut self, limit: u32) -> Self {
        self.call_depth_limit = Some(limit);
        self
    }

    pub fn with_aws_env(mut self, env: AwsEnv) -> Self {
        self.aws_env = Some(env);
        self
    }
}
