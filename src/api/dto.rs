//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                      | Description                               |
// |---------------------------|-------------------------------------------|
// | UpdateOrderStatusRequest  | Body of the status update endpoint        |
// | HealthResponse            | Body of the health endpoint               |
//--------------------------------------------------------------------------------------------------
// Order request and response bodies are shared with the order service and live in
// `domain::models::dtos`.

use serde::{Deserialize, Serialize};

/// Request to move an order to another status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    /// Name of the new status, case-insensitive
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
