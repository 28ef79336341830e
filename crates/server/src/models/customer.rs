//! Registered customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use counterline_core::{CustomerId, Email, PhoneNumber, StoreId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub store_id: StoreId,
    pub name: String,
    /// National ID or tax number printed on credit tickets
    pub document_id: Option<String>,
    pub phone: Option<PhoneNumber>,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload. Phone and email are validated on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub phone: Option<PhoneNumber>,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CustomerInput {
    /// # Errors
    ///
    /// Returns a message if the name is blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

/// Search filter for the customer list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    /// Matches name, phone or document id
    pub q: Option<String>,
}
