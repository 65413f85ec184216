//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batch`] - Bulk upload, delete and archive download
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod batch;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use batch::*;
pub use system::*;

// ============================================================================
// Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /documents/batch/delete and /documents/batch/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BatchIdsRequest {
    /// Document ids, as strings or numbers, in submission order
    #[schema(value_type = Vec<String>, example = json!(["1", "2", "3"]))]
    pub ids: Vec<RawId>,
}

/// A document id as sent by the client
///
/// Kept raw so a malformed id fails only its own item.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawId {
    /// Numeric JSON id
    Number(serde_json::Number),
    /// String id
    Text(String),
}

impl RawId {
    /// The id as the identifier reported back to the client
    pub fn into_identifier(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

impl BatchIdsRequest {
    /// Identifiers in submission order
    pub fn into_identifiers(self) -> Vec<String> {
        self.ids.into_iter().map(RawId::into_identifier).collect()
    }
}
