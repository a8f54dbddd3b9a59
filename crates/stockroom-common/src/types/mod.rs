//! Types shared between the upload path and the import worker

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockroomError;

/// Queue topic carrying [`ImportProcessMessage`] payloads.
pub const IMPORT_PROCESS_TOPIC: &str = "import.process";

/// Kind of domain object a CSV import targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Items,
    Inventory,
    Locations,
    Containers,
    Categories,
    Borrowers,
}

impl EntityType {
    /// Every importable entity type, in display order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Items,
        EntityType::Inventory,
        EntityType::Locations,
        EntityType::Containers,
        EntityType::Categories,
        EntityType::Borrowers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Items => "items",
            EntityType::Inventory => "inventory",
            EntityType::Locations => "locations",
            EntityType::Containers => "containers",
            EntityType::Categories => "categories",
            EntityType::Borrowers => "borrowers",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|entity| entity.as_str() == s)
            .ok_or_else(|| StockroomError::InvalidEntityType(s.to_string()))
    }
}

/// Lifecycle status of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
            ImportStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportStatus::Completed | ImportStatus::Failed | ImportStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportStatus::Pending),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            "cancelled" => Ok(ImportStatus::Cancelled),
            _ => Err(StockroomError::InvalidImportStatus(s.to_string())),
        }
    }
}

/// Payload published on [`IMPORT_PROCESS_TOPIC`] once an upload is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProcessMessage {
    pub import_job_id: Uuid,
    pub workspace_id: Uuid,
}

impl ImportProcessMessage {
    pub fn new(import_job_id: Uuid, workspace_id: Uuid) -> Self {
        Self {
            import_job_id,
            workspace_id,
        }
    }
}
