use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Limits applied to the request metrics.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum number of distinct `endpoint` label values tracked.
    /// Requests to endpoints beyond the cap are logged and not recorded.
    /// Unlimited when unset.
    pub max_endpoints: Option<usize>,
}
