//! tests/mod.rs
//! Utilidades compartidas por las pruebas: base SQLite en memoria y un
//! sender falso que reemplaza a la Evolution API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::campaign_model::{CampaignContact, CreateCampaignRequest, MessageBlock};
use crate::models::contact_model::SendReceipt;
use crate::models::task_model::DispatchTask;
use crate::services::campaign_service::CampaignService;
use crate::services::dispatch_service::DispatchService;
use crate::services::evolution_service::MessageSender;
use crate::services::execution_service::ExecutionService;

mod evolution_tests;
mod handler_tests;

/// Una sola conexión: cada conexión a `sqlite::memory:` es una base distinta.
pub async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Fallo en migraciones");
    pool
}

pub struct TestContext {
    pub pool: Pool<Sqlite>,
    pub campaigns: CampaignService,
    pub executions: ExecutionService,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        Self {
            campaigns: CampaignService::new(pool.clone()),
            executions: ExecutionService::new(pool.clone()),
            pool,
        }
    }

    /// Motor sin delay entre envíos
    pub fn dispatch(&self, sender: Arc<dyn MessageSender>) -> DispatchService {
        self.dispatch_with_timeout(sender, Duration::from_secs(5))
    }

    pub fn dispatch_with_timeout(
        &self,
        sender: Arc<dyn MessageSender>,
        send_timeout: Duration,
    ) -> DispatchService {
        DispatchService::new(
            self.campaigns.clone(),
            self.executions.clone(),
            sender,
            Duration::ZERO,
            send_timeout,
        )
    }
}

pub fn contacts(phones: &[&str]) -> Vec<CampaignContact> {
    phones
        .iter()
        .map(|p| CampaignContact {
            phone: p.to_string(),
            name: Some(format!("Contacto {}", p)),
        })
        .collect()
}

pub fn text_blocks(texts: &[&str]) -> Vec<MessageBlock> {
    texts
        .iter()
        .map(|t| {
            let mut block = MessageBlock::text(*t);
            block.delay_secs = Some(0);
            block
        })
        .collect()
}

pub fn campaign_request(phones: &[&str], texts: &[&str]) -> CreateCampaignRequest {
    CreateCampaignRequest {
        user_id: "user-1".to_string(),
        name: "Promo".to_string(),
        description: Some("Campaña de prueba".to_string()),
        instance_name: "ventas".to_string(),
        scheduled_at: None,
        message_blocks: text_blocks(texts),
        contacts: contacts(phones),
        default_delay_secs: Some(0),
    }
}

/// Espera a que la tarea deje de estar viva
pub async fn wait_for_task(dispatch: &DispatchService, task_id: &str) -> DispatchTask {
    for _ in 0..500 {
        let task = dispatch.get_task(task_id).await.expect("tarea inexistente");
        if !task.status.is_live() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("la tarea {} no terminó a tiempo", task_id);
}

/// Sender falso: registra cada envío, falla para ciertos teléfonos y puede
/// pausar la campaña después del envío N (simulando al usuario) o romper el
/// almacenamiento para provocar un error fatal del motor.
#[derive(Default)]
pub struct FakeSender {
    pub calls: Mutex<Vec<(String, String)>>,
    fail_phones: HashSet<String>,
    pause_after: Option<(usize, CampaignService, String)>,
    break_storage_after: Option<(usize, Pool<Sqlite>)>,
    delay: Option<Duration>,
}

impl FakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, phone: &str) -> Self {
        self.fail_phones.insert(phone.to_string());
        self
    }

    pub fn pausing_after(mut self, sends: usize, service: CampaignService, campaign_id: &str) -> Self {
        self.pause_after = Some((sends, service, campaign_id.to_string()));
        self
    }

    /// Borra la tabla de ejecuciones después del envío N
    pub fn breaking_storage_after(mut self, sends: usize, pool: Pool<Sqlite>) -> Self {
        self.break_storage_after = Some((sends, pool));
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_block(
        &self,
        _instance_name: &str,
        contact: &CampaignContact,
        block: &MessageBlock,
    ) -> Result<SendReceipt> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((contact.phone.clone(), block.content.clone()));
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((after, service, campaign_id)) = &self.pause_after {
            if n == *after {
                service.pause_campaign(campaign_id).await?;
            }
        }
        if let Some((after, pool)) = &self.break_storage_after {
            if n == *after {
                sqlx::query("DROP TABLE campaign_executions")
                    .execute(pool)
                    .await?;
            }
        }
        if self.fail_phones.contains(&contact.phone) {
            return Err(anyhow!("remote rejected {}", contact.phone));
        }
        Ok(SendReceipt {
            remote_message_id: Some(format!("msg-{}", n)),
        })
    }
}
