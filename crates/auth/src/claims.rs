//! Token payload.

use serde::{Deserialize, Serialize};
use shared_types::EndpointId;

/// The contents signed into every bearer token (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub endpoint_id: EndpointId,
    pub endpoint_name: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Claims {
    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }
}
