//! Explicit cloud context threaded into the resolver and uploader.

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Region and credentials profile for every cloud call of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsContext {
    pub region: String,
    pub profile: Option<String>,
}

impl AwsContext {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
        }
    }

    /// Load SDK configuration for this context without touching process-wide state.
    pub async fn sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}
