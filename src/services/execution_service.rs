use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::campaign_model::CampaignContact;
use crate::models::execution_model::{ExecutionRecord, ExecutionStatus, ExecutionSummary};
use crate::services::{parse_optional_timestamp, parse_timestamp};

const EXECUTION_COLUMNS: &str = r#"
    id, campaign_id, block_index, contact_phone, contact_name, status,
    error_message, remote_message_id, attempted_at, sent_at, created_at
"#;

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    campaign_id: String,
    block_index: i64,
    contact_phone: String,
    contact_name: Option<String>,
    status: String,
    error_message: Option<String>,
    remote_message_id: Option<String>,
    attempted_at: Option<String>,
    sent_at: Option<String>,
    created_at: String,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = anyhow::Error;

    fn try_from(r: ExecutionRow) -> Result<Self> {
        Ok(ExecutionRecord {
            status: r.status.parse()?,
            attempted_at: parse_optional_timestamp(r.attempted_at)?,
            sent_at: parse_optional_timestamp(r.sent_at)?,
            created_at: parse_timestamp(&r.created_at)?,
            id: r.id,
            campaign_id: r.campaign_id,
            block_index: r.block_index,
            contact_phone: r.contact_phone,
            contact_name: r.contact_name,
            error_message: r.error_message,
            remote_message_id: r.remote_message_id,
        })
    }
}

/// Tracker de ejecución: un registro por (campaña, bloque, contacto).
#[derive(Clone, Debug)]
pub struct ExecutionService {
    db_pool: Pool<Sqlite>,
}

impl ExecutionService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ExecutionService { db_pool }
    }

    /// Crea en bloque los registros `pending` de una corrida.
    /// Los pares que ya existen (reanudación) se dejan como están.
    pub async fn create_pending_records(
        &self,
        campaign_id: &str,
        block_count: usize,
        contacts: &[CampaignContact],
    ) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        let mut tx = self.db_pool.begin().await?;
        for block_index in 0..block_count {
            for contact in contacts {
                let result = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO campaign_executions (
                        id, campaign_id, block_index, contact_phone, contact_name,
                        status, created_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(campaign_id)
                .bind(block_index as i64)
                .bind(&contact.phone)
                .bind(contact.name.as_deref())
                .bind(&now)
                .execute(&mut *tx)
                .await
                .context("Error creando registros de ejecución")?;
                inserted += result.rows_affected();
            }
        }
        tx.commit().await?;

        log::info!(
            "(create_pending_records) campaña={} bloques={} contactos={} nuevos={}",
            campaign_id,
            block_count,
            contacts.len(),
            inserted
        );
        Ok(inserted)
    }

    pub async fn get_record(
        &self,
        campaign_id: &str,
        block_index: usize,
        contact_phone: &str,
    ) -> Result<Option<ExecutionRecord>> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS} FROM campaign_executions
            WHERE campaign_id = ?1 AND block_index = ?2 AND contact_phone = ?3
            "#
        );
        let row = sqlx::query_as::<_, ExecutionRow>(&sql)
            .bind(campaign_id)
            .bind(block_index as i64)
            .bind(contact_phone)
            .fetch_optional(&self.db_pool)
            .await
            .context("Error leyendo registro de ejecución")?;
        row.map(ExecutionRecord::try_from).transpose()
    }

    /// Igual que `get_record`, pero crea el registro `pending` si falta.
    pub async fn get_or_create_record(
        &self,
        campaign_id: &str,
        block_index: usize,
        contact: &CampaignContact,
    ) -> Result<ExecutionRecord> {
        if let Some(record) = self.get_record(campaign_id, block_index, &contact.phone).await? {
            return Ok(record);
        }
        self.create_pending_records_for_block(campaign_id, block_index, contact)
            .await?;
        self.get_record(campaign_id, block_index, &contact.phone)
            .await?
            .with_context(|| {
                format!(
                    "Registro de ejecución ausente tras crearlo ({}, {}, {})",
                    campaign_id, block_index, contact.phone
                )
            })
    }

    /// pending -> sending, estampa attempted_at
    pub async fn mark_sending(&self, record_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_executions
            SET status = 'sending', attempted_at = ?2, error_message = NULL
            WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Error marcando ejecución 'sending'")?;
        Ok(())
    }

    pub async fn mark_sent(&self, record_id: &str, remote_message_id: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_executions
            SET status = 'sent', sent_at = ?2, remote_message_id = ?3
            WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .bind(Utc::now().to_rfc3339())
        .bind(remote_message_id)
        .execute(&self.db_pool)
        .await
        .context("Error marcando ejecución 'sent'")?;
        Ok(())
    }

    pub async fn mark_failed(&self, record_id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_executions
            SET status = 'failed', error_message = ?2
            WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .bind(error_message)
        .execute(&self.db_pool)
        .await
        .context("Error marcando ejecución 'failed'")?;
        Ok(())
    }

    /// Log de ejecución en orden de envío (bloque, luego audiencia)
    pub async fn list_for_campaign(
        &self,
        campaign_id: &str,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<ExecutionRecord>> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS} FROM campaign_executions
            WHERE campaign_id = ?1 AND (?2 IS NULL OR status = ?2)
            ORDER BY block_index ASC, rowid ASC
            "#
        );
        let rows = sqlx::query_as::<_, ExecutionRow>(&sql)
            .bind(campaign_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter().map(ExecutionRecord::try_from).collect()
    }

    pub async fn summary(&self, campaign_id: &str) -> Result<ExecutionSummary> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM campaign_executions
            WHERE campaign_id = ?1
            GROUP BY status
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        let mut summary = ExecutionSummary::default();
        for (status, count) in rows {
            match status.parse::<ExecutionStatus>()? {
                ExecutionStatus::Pending => summary.pending = count,
                ExecutionStatus::Sending => summary.sending = count,
                ExecutionStatus::Sent => summary.sent = count,
                ExecutionStatus::Failed => summary.failed = count,
            }
            summary.total += count;
        }
        Ok(summary)
    }

    async fn create_pending_records_for_block(
        &self,
        campaign_id: &str,
        block_index: usize,
        contact: &CampaignContact,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO campaign_executions (
                id, campaign_id, block_index, contact_phone, contact_name,
                status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(campaign_id)
        .bind(block_index as i64)
        .bind(&contact.phone)
        .bind(contact.name.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Error creando registro de ejecución")?;
        Ok(())
    }
}
