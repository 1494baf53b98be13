use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::campaign_model::CampaignStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Running)
    }
}

/// Una corrida del motor de envío para una campaña
#[derive(Debug, Clone, Serialize)]
pub struct DispatchTask {
    pub task_id: String,
    pub campaign_id: String,
    pub status: TaskStatus,
    /// Estado en el que quedó la campaña al terminar la corrida
    pub final_campaign_status: Option<CampaignStatus>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
