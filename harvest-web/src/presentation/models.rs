//! Response bodies

use serde::{Deserialize, Serialize};

/// Body of a 429 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitErrorBody {
    pub error: String,
    /// Seconds until the client may retry
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
