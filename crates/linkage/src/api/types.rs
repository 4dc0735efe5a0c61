//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use common::ConnectionStats;
use serde::{Deserialize, Serialize};

pub use crate::resolution::{ContactSummary, IdentifyResponse};

/// Body of `POST /identify`
///
/// Both fields are optional at the decoding stage so that a missing value is
/// reported as a validation failure naming the field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub email: Option<String>,
    pub phone_number: Option<PhoneNumberInput>,
}

/// Phone numbers arrive either as JSON integers or as digit strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumberInput {
    Number(i64),
    Text(String),
}

impl PhoneNumberInput {
    /// Textual form as stored in the contact table
    pub fn into_text(self) -> String {
        match self {
            PhoneNumberInput::Number(n) => n.to_string(),
            PhoneNumberInput::Text(s) => s,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub contacts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionStats>,
    pub timestamp: DateTime<Utc>,
}
