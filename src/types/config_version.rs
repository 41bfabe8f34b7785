//! Versioned retention parameter sets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::RetentionParams;

/// One immutable parameter version. Only `is_active` changes after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigVersion {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,
    pub params: RetentionParams,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ConfigVersion {
    pub fn new(
        params: RetentionParams,
        preset_name: Option<String>,
        note: Option<String>,
        created_by: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            created_by,
            preset_name,
            params,
            is_active: false,
            note,
        }
    }
}
