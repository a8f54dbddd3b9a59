//! Row import seam
//!
//! Turning a CSV row into a domain entity is owned by the entity modules;
//! the worker only needs to know whether a row went in or why it did not.

use async_trait::async_trait;
use csv::StringRecord;
use serde_json::Value;
use stockroom_common::EntityType;
use uuid::Uuid;

use super::models::RowData;

/// Who and what a row is being imported for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowContext {
    pub job_id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: EntityType,
}

/// One data row paired with the file's normalized header
#[derive(Debug, Clone, Copy)]
pub struct CsvRow<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl<'a> CsvRow<'a> {
    pub fn new(headers: &'a StringRecord, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    /// Value of `column`, trimmed; `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|header| header == column)
            .and_then(|index| self.record.get(index))
            .map(str::trim)
    }

    /// Raw key/value snapshot used for error diagnostics
    pub fn to_row_data(&self) -> RowData {
        self.headers
            .iter()
            .zip(self.record.iter())
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect()
    }
}

/// Why a single row was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RowFailure {
    pub field_name: Option<String>,
    pub message: String,
}

impl RowFailure {
    pub fn row(message: impl Into<String>) -> Self {
        Self {
            field_name: None,
            message: message.into(),
        }
    }

    pub fn field(field_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait RowImporter: Send + Sync {
    async fn import_row(&self, context: &RowContext, row: &CsvRow<'_>) -> Result<(), RowFailure>;
}

/// Accepts rows that carry every column their entity type requires
///
/// Stands in for entity creation so the pipeline runs end to end; it
/// persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredColumnsImporter;

impl RequiredColumnsImporter {
    pub fn required_columns(entity_type: EntityType) -> &'static [&'static str] {
        match entity_type {
            EntityType::Inventory => &["name", "item", "location", "quantity"],
            _ => &["name"],
        }
    }
}

#[async_trait]
impl RowImporter for RequiredColumnsImporter {
    async fn import_row(&self, context: &RowContext, row: &CsvRow<'_>) -> Result<(), RowFailure> {
        for column in Self::required_columns(context.entity_type) {
            match row.get(column) {
                Some(value) if !value.is_empty() => {},
                _ => return Err(RowFailure::field(*column, format!("{} is required", column))),
            }
        }

        if context.entity_type == EntityType::Inventory {
            let quantity = row.get("quantity").unwrap_or_default();
            if !quantity.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                return Err(RowFailure::field("quantity", "quantity must be a number"));
            }
        }

        Ok(())
    }
}
