//! models/execution_model.rs
//! Registro de ejecución por (campaña, bloque, contacto).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::error_model::CampaignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Sending => "sending",
            ExecutionStatus::Sent => "sent",
            ExecutionStatus::Failed => "failed",
        }
    }

    /// Ya tuvo su único intento (no se vuelve a enviar al reanudar)
    pub fn is_settled(&self) -> bool {
        matches!(self, ExecutionStatus::Sent | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "sending" => Ok(ExecutionStatus::Sending),
            "sent" => Ok(ExecutionStatus::Sent),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(CampaignError::Validation(format!(
                "Estado de ejecución desconocido: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub campaign_id: String,
    pub block_index: i64,
    pub contact_phone: String,
    pub contact_name: Option<String>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub remote_message_id: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total: i64,
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionQuery {
    pub status: Option<String>,
}

/// Respuesta del log de ejecuciones de una campaña
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionLogResponse {
    pub campaign_id: String,
    pub summary: ExecutionSummary,
    pub items: Vec<ExecutionRecord>,
}
