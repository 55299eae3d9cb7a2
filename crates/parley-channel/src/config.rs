//! Resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`ChannelResolver`](crate::ChannelResolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// The channel type every id is resolved under; channels are
    /// addressed as `{channel_type}:{id}`. Default: `"messaging"`.
    pub channel_type: String,

    /// Upper bound on one channel fetch. Default: 10 seconds.
    pub fetch_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            channel_type: "messaging".into(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}
