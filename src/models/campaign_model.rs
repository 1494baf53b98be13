//! models/campaign_model.rs
//! Estructuras de campañas: configuración, audiencia, contenido y contadores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::error_model::CampaignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// Estados desde los que se puede (re)iniciar el envío
    pub fn can_start(&self) -> bool {
        !self.is_terminal() && *self != CampaignStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "running" => Ok(CampaignStatus::Running),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(CampaignError::Validation(format!(
                "Estado de campaña desconocido: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBlockType {
    Text,
    Media,
}

/// Una unidad de contenido que se envía a cada contacto de la audiencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBlock {
    #[serde(rename = "type")]
    pub block_type: MessageBlockType,
    /// Texto del mensaje (o caption si es media)
    #[serde(default)]
    pub content: String,
    /// URL o base64 del archivo (solo media)
    pub media_url: Option<String>,
    /// "image", "video", "audio", "document"
    pub media_type: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    /// Delay (segundos) tras cada envío de este bloque
    pub delay_secs: Option<u64>,
}

impl MessageBlock {
    pub fn text(content: impl Into<String>) -> Self {
        MessageBlock {
            block_type: MessageBlockType::Text,
            content: content.into(),
            media_url: None,
            media_type: None,
            mime_type: None,
            file_name: None,
            delay_secs: None,
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), CampaignError> {
        match self.block_type {
            MessageBlockType::Text if self.content.trim().is_empty() => Err(
                CampaignError::Validation(format!("El bloque {} no tiene texto", index)),
            ),
            MessageBlockType::Media
                if self
                    .media_url
                    .as_deref()
                    .map(|m| m.trim().is_empty())
                    .unwrap_or(true) =>
            {
                Err(CampaignError::Validation(format!(
                    "El bloque {} es media pero no tiene media_url",
                    index
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignContact {
    /// Número o JID de destino
    pub phone: String,
    pub name: Option<String>,
}

/// Limpia la audiencia: recorta espacios, descarta teléfonos vacíos y
/// colapsa duplicados conservando la primera aparición.
pub fn normalize_contacts(contacts: Vec<CampaignContact>) -> Vec<CampaignContact> {
    let mut seen = std::collections::HashSet::new();
    contacts
        .into_iter()
        .filter_map(|c| {
            let phone = c.phone.trim().to_string();
            if phone.is_empty() || !seen.insert(phone.clone()) {
                return None;
            }
            let name = c
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            Some(CampaignContact { phone, name })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub instance_name: String,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub message_blocks: Vec<MessageBlock>,
    pub contacts: Vec<CampaignContact>,
    pub total_contacts: i64,
    pub default_delay_secs: Option<u64>,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CampaignRecord {
    /// Bloques a enviar; sin contenido configurado se usa un único bloque de
    /// texto con la descripción (o el nombre) de la campaña.
    pub fn effective_blocks(&self) -> Vec<MessageBlock> {
        if !self.message_blocks.is_empty() {
            return self.message_blocks.clone();
        }
        let text = self
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.name);
        vec![MessageBlock::text(text)]
    }
}

/// Request para crear una campaña
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub instance_name: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_blocks: Vec<MessageBlock>,
    #[serde(default)]
    pub contacts: Vec<CampaignContact>,
    pub default_delay_secs: Option<u64>,
}

/// Request para editar; solo se tocan los campos presentes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instance_name: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// true para quitar la programación
    #[serde(default)]
    pub clear_schedule: bool,
    pub message_blocks: Option<Vec<MessageBlock>>,
    pub contacts: Option<Vec<CampaignContact>>,
    pub default_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCampaignsQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub user_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListCampaignsResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<CampaignRecord>,
}

/// Respuesta de POST /campaigns/{id}/start
#[derive(Debug, Clone, Serialize)]
pub struct StartCampaignResponse {
    pub success: bool,
    pub task_id: String,
    pub campaign: CampaignRecord,
}
