use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::campaign_model::{
    normalize_contacts, CampaignRecord, CampaignStatus, CreateCampaignRequest,
    ListCampaignsQuery, ListCampaignsResponse, MessageBlock, UpdateCampaignRequest,
};
use crate::models::error_model::CampaignError;
use crate::services::{parse_optional_timestamp, parse_timestamp};

const CAMPAIGN_COLUMNS: &str = r#"
    id, user_id, name, description, instance_name, status, scheduled_at,
    message_blocks, contacts, total_contacts, default_delay_secs,
    sent_count, delivered_count, failed_count,
    created_at, updated_at, started_at, completed_at
"#;

/// Fila tal como vive en SQLite (timestamps en RFC3339, JSON en TEXT)
#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    instance_name: String,
    status: String,
    scheduled_at: Option<String>,
    message_blocks: String,
    contacts: String,
    total_contacts: i64,
    default_delay_secs: Option<i64>,
    sent_count: i64,
    delivered_count: i64,
    failed_count: i64,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<CampaignRow> for CampaignRecord {
    type Error = anyhow::Error;

    fn try_from(row: CampaignRow) -> Result<Self> {
        Ok(CampaignRecord {
            status: row.status.parse()?,
            scheduled_at: parse_optional_timestamp(row.scheduled_at)?,
            message_blocks: serde_json::from_str(&row.message_blocks)
                .with_context(|| format!("message_blocks corrupto en campaña {}", row.id))?,
            contacts: serde_json::from_str(&row.contacts)
                .with_context(|| format!("contacts corrupto en campaña {}", row.id))?,
            total_contacts: row.total_contacts,
            default_delay_secs: row.default_delay_secs.map(|d| d.max(0) as u64),
            sent_count: row.sent_count,
            delivered_count: row.delivered_count,
            failed_count: row.failed_count,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            started_at: parse_optional_timestamp(row.started_at)?,
            completed_at: parse_optional_timestamp(row.completed_at)?,
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            instance_name: row.instance_name,
        })
    }
}

/// Estado inicial según la programación: futura => scheduled, si no draft
fn initial_status(scheduled_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CampaignStatus {
    match scheduled_at {
        Some(at) if at > now => CampaignStatus::Scheduled,
        _ => CampaignStatus::Draft,
    }
}

fn validate_blocks(blocks: &[MessageBlock]) -> Result<(), CampaignError> {
    for (i, block) in blocks.iter().enumerate() {
        block.validate(i)?;
    }
    Ok(())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), CampaignError> {
    if value.trim().is_empty() {
        return Err(CampaignError::Validation(format!(
            "El campo '{}' es obligatorio",
            field
        )));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al correr migraciones de campañas")?;
        Ok(())
    }

    /// Crea la campaña en `draft` (o `scheduled` si trae fecha futura)
    pub async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<CampaignRecord> {
        require_non_blank("user_id", &req.user_id)?;
        require_non_blank("name", &req.name)?;
        require_non_blank("instance_name", &req.instance_name)?;
        validate_blocks(&req.message_blocks)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let status = initial_status(req.scheduled_at, now);
        let contacts = normalize_contacts(req.contacts);
        let total_contacts = contacts.len() as i64;
        let blocks_json = serde_json::to_string(&req.message_blocks)?;
        let contacts_json = serde_json::to_string(&contacts)?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, user_id, name, description, instance_name, status, scheduled_at,
                message_blocks, contacts, total_contacts, default_delay_secs,
                sent_count, delivered_count, failed_count, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, 0, ?12, ?12)
            "#,
        )
        .bind(&id)
        .bind(req.user_id.trim())
        .bind(req.name.trim())
        .bind(req.description)
        .bind(req.instance_name.trim())
        .bind(status.as_str())
        .bind(req.scheduled_at.map(|at| at.to_rfc3339()))
        .bind(blocks_json)
        .bind(contacts_json)
        .bind(total_contacts)
        .bind(req.default_delay_secs.map(|d| d as i64))
        .bind(&now_str)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar campaña")?;

        log::info!(
            "(create_campaign) Campaña {} creada en '{}' con {} contactos",
            id,
            status,
            total_contacts
        );
        self.get_campaign(&id).await
    }

    pub async fn get_campaign(&self, id: &str) -> Result<CampaignRecord> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al leer campaña")?
            .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
        row.try_into()
    }

    /// Lectura liviana del estado; `None` si la campaña ya no existe.
    pub async fn get_status(&self, id: &str) -> Result<Option<CampaignStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM campaigns WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await
                .context("Fallo al leer estado de campaña")?;
        match status {
            Some(s) => Ok(Some(s.parse()?)),
            None => Ok(None),
        }
    }

    /// Lista campañas con paginación y filtros opcionales
    pub async fn list_campaigns(&self, query: ListCampaignsQuery) -> Result<ListCampaignsResponse> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(10).clamp(1, 100);
        // `page` viene del query string
        let offset = page
            .saturating_sub(1)
            .saturating_mul(page_size)
            .min(i64::MAX as u64) as i64;

        if let Some(status) = &query.status {
            status.parse::<CampaignStatus>()?;
        }

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM campaigns
            WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR status = ?2)
            "#,
        )
        .bind(query.user_id.as_deref())
        .bind(query.status.as_deref())
        .fetch_one(&self.db_pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS} FROM campaigns
            WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            LIMIT ?3 OFFSET ?4
            "#
        );
        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(query.user_id.as_deref())
            .bind(query.status.as_deref())
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&self.db_pool)
            .await?;

        let items = rows
            .into_iter()
            .map(CampaignRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListCampaignsResponse {
            total: total as u64,
            page,
            page_size,
            items,
        })
    }

    /// Edita la campaña. Rechazado mientras está `running`.
    pub async fn update_campaign(
        &self,
        id: &str,
        req: UpdateCampaignRequest,
    ) -> Result<CampaignRecord> {
        let mut campaign = self.get_campaign(id).await?;
        if campaign.status == CampaignStatus::Running {
            return Err(CampaignError::Conflict(
                "no se puede editar una campaña en ejecución".to_string(),
            )
            .into());
        }

        if let Some(name) = req.name {
            require_non_blank("name", &name)?;
            campaign.name = name.trim().to_string();
        }
        if let Some(description) = req.description {
            campaign.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(instance_name) = req.instance_name {
            require_non_blank("instance_name", &instance_name)?;
            campaign.instance_name = instance_name.trim().to_string();
        }
        if let Some(blocks) = req.message_blocks {
            validate_blocks(&blocks)?;
            campaign.message_blocks = blocks;
        }
        if let Some(contacts) = req.contacts {
            campaign.contacts = normalize_contacts(contacts);
        }
        if req.default_delay_secs.is_some() {
            campaign.default_delay_secs = req.default_delay_secs;
        }
        if req.clear_schedule {
            campaign.scheduled_at = None;
        } else if req.scheduled_at.is_some() {
            campaign.scheduled_at = req.scheduled_at;
        }

        // Solo draft/scheduled dependen de la programación
        if matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Scheduled
        ) {
            campaign.status = initial_status(campaign.scheduled_at, Utc::now());
        }
        campaign.total_contacts = campaign.contacts.len() as i64;

        // sent + failed nunca puede superar contactos x bloques
        let attempted = campaign.sent_count + campaign.failed_count;
        let capacity = campaign.total_contacts * campaign.effective_blocks().len() as i64;
        if capacity < attempted {
            return Err(CampaignError::Conflict(format!(
                "la campaña ya registró {} envíos; la nueva audiencia solo admite {}",
                attempted, capacity
            ))
            .into());
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET name = ?2,
                description = ?3,
                instance_name = ?4,
                status = ?5,
                scheduled_at = ?6,
                message_blocks = ?7,
                contacts = ?8,
                total_contacts = ?9,
                default_delay_secs = ?10,
                updated_at = ?11
            WHERE id = ?1 AND status != 'running' AND sent_count + failed_count <= ?9 * ?12
            "#,
        )
        .bind(id)
        .bind(&campaign.name)
        .bind(campaign.description.as_deref())
        .bind(&campaign.instance_name)
        .bind(campaign.status.as_str())
        .bind(campaign.scheduled_at.map(|at| at.to_rfc3339()))
        .bind(serde_json::to_string(&campaign.message_blocks)?)
        .bind(serde_json::to_string(&campaign.contacts)?)
        .bind(campaign.total_contacts)
        .bind(campaign.default_delay_secs.map(|d| d as i64))
        .bind(now)
        .bind(campaign.effective_blocks().len() as i64)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar campaña")?;

        if result.rows_affected() == 0 {
            // Arrancó (o sumó envíos) entre la lectura y la escritura
            return Err(CampaignError::Conflict(
                "la campaña cambió mientras se editaba".to_string(),
            )
            .into());
        }

        self.get_campaign(id).await
    }

    /// Borra la campaña y su historial de ejecución. Rechazado si está `running`.
    pub async fn delete_campaign(&self, id: &str) -> Result<()> {
        let status = self
            .get_status(id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
        if status == CampaignStatus::Running {
            return Err(CampaignError::Conflict(
                "no se puede borrar una campaña en ejecución".to_string(),
            )
            .into());
        }

        let mut tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM campaign_executions WHERE campaign_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Fallo al borrar ejecuciones")?;
        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?1 AND status != 'running'")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Fallo al borrar campaña")?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CampaignError::Conflict(
                "no se puede borrar una campaña en ejecución".to_string(),
            )
            .into());
        }
        tx.commit().await?;

        log::info!("(delete_campaign) Campaña {} borrada", id);
        Ok(())
    }

    /// Transición draft/scheduled/paused -> running.
    ///
    /// Valida audiencia no vacía antes de tocar nada. Los contadores solo se
    /// reinician al arrancar desde `draft`. Devuelve la campaña ya en
    /// `running` junto con el estado previo.
    pub async fn begin_run(&self, id: &str) -> Result<(CampaignRecord, CampaignStatus)> {
        let campaign = self.get_campaign(id).await?;
        let previous = campaign.status;

        if previous == CampaignStatus::Running {
            return Err(CampaignError::Conflict("la campaña ya está en ejecución".to_string()).into());
        }
        if !previous.can_start() {
            return Err(CampaignError::Conflict(format!(
                "no se puede iniciar una campaña en estado '{}'",
                previous
            ))
            .into());
        }
        if campaign.contacts.is_empty() {
            return Err(
                CampaignError::Validation("la campaña no tiene contactos".to_string()).into(),
            );
        }

        let now = Utc::now().to_rfc3339();
        let reset = previous == CampaignStatus::Draft;
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'running',
                started_at = ?2,
                completed_at = NULL,
                updated_at = ?2,
                sent_count = CASE WHEN ?3 THEN 0 ELSE sent_count END,
                delivered_count = CASE WHEN ?3 THEN 0 ELSE delivered_count END,
                failed_count = CASE WHEN ?3 THEN 0 ELSE failed_count END
            WHERE id = ?1 AND status = ?4
            "#,
        )
        .bind(id)
        .bind(&now)
        .bind(reset)
        .bind(previous.as_str())
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar campaña running")?;

        if result.rows_affected() == 0 {
            return Err(CampaignError::Conflict(
                "la campaña cambió de estado mientras se iniciaba".to_string(),
            )
            .into());
        }

        log::info!(
            "(begin_run) Campaña {} pasa de '{}' a 'running' (reset={})",
            id,
            previous,
            reset
        );
        Ok((self.get_campaign(id).await?, previous))
    }

    /// Devuelve la campaña al estado previo si falla el arranque después de `begin_run`
    pub async fn restore_status(&self, id: &str, status: CampaignStatus) -> Result<()> {
        self.set_status_if(id, status, &[CampaignStatus::Running])
            .await
            .map(|_| ())
    }

    /// running -> paused
    pub async fn pause_campaign(&self, id: &str) -> Result<CampaignRecord> {
        let changed = self
            .set_status_if(id, CampaignStatus::Paused, &[CampaignStatus::Running])
            .await?;
        if !changed {
            let status = self
                .get_status(id)
                .await?
                .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
            return Err(CampaignError::Conflict(format!(
                "solo se puede pausar una campaña en ejecución (estado actual '{}')",
                status
            ))
            .into());
        }
        log::info!("(pause_campaign) Campaña {} pausada", id);
        self.get_campaign(id).await
    }

    /// Cancelación pedida por el usuario desde cualquier estado no terminal
    pub async fn cancel_campaign(&self, id: &str) -> Result<CampaignRecord> {
        let changed = self
            .set_status_if(
                id,
                CampaignStatus::Cancelled,
                &[
                    CampaignStatus::Draft,
                    CampaignStatus::Scheduled,
                    CampaignStatus::Running,
                    CampaignStatus::Paused,
                ],
            )
            .await?;
        if !changed {
            let status = self
                .get_status(id)
                .await?
                .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
            return Err(CampaignError::Conflict(format!(
                "la campaña ya terminó (estado '{}')",
                status
            ))
            .into());
        }
        log::info!("(cancel_campaign) Campaña {} cancelada por el usuario", id);
        self.get_campaign(id).await
    }

    /// running -> completed. No pisa una pausa/cancelación que llegó al final.
    pub async fn mark_completed(&self, id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'completed', completed_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar campaña completed")?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancelación por error fatal del motor
    pub async fn mark_cancelled(&self, id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'cancelled', completed_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status NOT IN ('completed', 'cancelled')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar campaña cancelled")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_sent(&self, id: &str) -> Result<()> {
        self.increment_counter(id, "sent_count").await
    }

    pub async fn increment_failed(&self, id: &str) -> Result<()> {
        self.increment_counter(id, "failed_count").await
    }

    /// Campañas `scheduled` cuya fecha ya llegó
    pub async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT id, scheduled_at FROM campaigns WHERE status = 'scheduled' ORDER BY created_at",
        )
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar campañas programadas")?;

        let mut due = Vec::new();
        for (id, scheduled_at) in rows {
            match parse_optional_timestamp(scheduled_at)? {
                Some(at) if at <= now => due.push(id),
                Some(_) => {}
                // scheduled sin fecha: se trata como vencida
                None => due.push(id),
            }
        }
        Ok(due)
    }

    /// Al arrancar el proceso: las campañas que quedaron `running` no tienen
    /// motor vivo, se pasan a `paused` para poder reanudarlas.
    pub async fn pause_orphaned_running(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE campaigns SET status = 'paused', updated_at = ?1 WHERE status = 'running'",
        )
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al reconciliar campañas running")?;
        Ok(result.rows_affected())
    }

    async fn increment_counter(&self, id: &str, column: &str) -> Result<()> {
        // `column` nunca viene del usuario
        let sql = format!(
            "UPDATE campaigns SET {column} = {column} + 1, updated_at = ?2 WHERE id = ?1"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("Fallo al incrementar {}", column))?;
        Ok(())
    }

    async fn set_status_if(
        &self,
        id: &str,
        new_status: CampaignStatus,
        allowed_from: &[CampaignStatus],
    ) -> Result<bool> {
        let allowed = allowed_from
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE campaigns SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status IN ({allowed})"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(new_status.as_str())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db_pool)
            .await
            .context("Fallo al actualizar estado de campaña")?;
        Ok(result.rows_affected() > 0)
    }
}
