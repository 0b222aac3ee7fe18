use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Input data for one printed receipt.
///
/// Supplied fresh for every print call and never persisted. The field
/// aliases accept the payload shape produced by the visit registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(alias = "devotee_id")]
    pub id: String,
    #[serde(default, alias = "devotee_name")]
    pub name: Option<String>,
    pub date: String,
    pub item: String,
}

impl ReceiptRecord {
    pub fn new(id: impl Into<String>, date: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            date: date.into(),
            item: item.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Holder name, if one was given and is not blank.
    pub fn holder_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Checks the fields every receipt must carry.
    pub fn validate(&self) -> Result<()> {
        let required = [("id", &self.id), ("item", &self.item), ("date", &self.date)];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Fixed text framing every receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptTemplate {
    pub header: String,
    pub item_label: String,
    pub footer: String,
}

impl Default for ReceiptTemplate {
    fn default() -> Self {
        Self {
            header: "JAIN TEMPLE".to_string(),
            item_label: "Selected Item".to_string(),
            footer: "Thank you for your visit!".to_string(),
        }
    }
}
