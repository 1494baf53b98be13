//! services/dispatch_service.rs
//! Motor de envío de campañas y registro de tareas en segundo plano.
//!
//! Una corrida recorre los bloques en orden y, dentro de cada bloque, la
//! audiencia en orden. Antes de cada envío se relee el estado de la campaña
//! en la base; si ya no es `running` la corrida termina ahí. El delay entre
//! envíos no se interrumpe.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::campaign_model::{CampaignRecord, CampaignStatus, MessageBlock};
use crate::models::error_model::CampaignError;
use crate::models::task_model::{DispatchTask, TaskStatus};
use crate::services::campaign_service::CampaignService;
use crate::services::evolution_service::MessageSender;
use crate::services::execution_service::ExecutionService;

/// Tareas terminadas que se conservan en el registro
pub const DEFAULT_TASK_RETENTION: usize = 200;

#[derive(Clone)]
pub struct DispatchService {
    campaign_service: CampaignService,
    execution_service: ExecutionService,
    sender: Arc<dyn MessageSender>,
    tasks: Arc<Mutex<HashMap<String, DispatchTask>>>,
    default_delay: Duration,
    send_timeout: Duration,
    task_retention: usize,
}

impl DispatchService {
    pub fn new(
        campaign_service: CampaignService,
        execution_service: ExecutionService,
        sender: Arc<dyn MessageSender>,
        default_delay: Duration,
        send_timeout: Duration,
    ) -> Self {
        Self {
            campaign_service,
            execution_service,
            sender,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            default_delay,
            send_timeout,
            task_retention: DEFAULT_TASK_RETENTION,
        }
    }

    /// Mínimo 1: la última tarea terminada siempre se puede consultar
    pub fn with_task_retention(mut self, task_retention: usize) -> Self {
        self.task_retention = task_retention.max(1);
        self
    }

    /// Arranca (o reanuda) una campaña y encola la corrida del motor.
    /// Devuelve la campaña ya en `running` y el id de la tarea.
    pub async fn start_campaign(&self, campaign_id: &str) -> Result<(CampaignRecord, String)> {
        if let Some(task) = self.active_task_for(campaign_id).await {
            return Err(CampaignError::Conflict(format!(
                "la campaña ya tiene una corrida activa ({})",
                task.task_id
            ))
            .into());
        }

        let campaign = self.prepare_start(campaign_id).await?;
        let task_id = self.submit(campaign_id).await;
        Ok((campaign, task_id))
    }

    /// Transición a `running` y creación de los registros `pending`.
    /// No lanza el motor.
    pub async fn prepare_start(&self, campaign_id: &str) -> Result<CampaignRecord> {
        let (campaign, previous) = self.campaign_service.begin_run(campaign_id).await?;
        let blocks = campaign.effective_blocks();

        if let Err(e) = self
            .execution_service
            .create_pending_records(campaign_id, blocks.len(), &campaign.contacts)
            .await
        {
            log::error!(
                "(prepare_start) No se pudieron crear las ejecuciones de {}: {:?}",
                campaign_id,
                e
            );
            if let Err(restore_err) = self
                .campaign_service
                .restore_status(campaign_id, previous)
                .await
            {
                log::error!(
                    "(prepare_start) Tampoco se pudo restaurar el estado '{}': {:?}",
                    previous,
                    restore_err
                );
            }
            return Err(e);
        }

        Ok(campaign)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<DispatchTask> {
        let tasks = self.tasks.lock().await;
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| CampaignError::TaskNotFound(task_id.to_string()).into())
    }

    /// Tareas más recientes primero
    pub async fn list_tasks(&self) -> Vec<DispatchTask> {
        let tasks = self.tasks.lock().await;
        let mut items: Vec<_> = tasks.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    pub async fn active_task_for(&self, campaign_id: &str) -> Option<DispatchTask> {
        let tasks = self.tasks.lock().await;
        tasks
            .values()
            .find(|t| t.campaign_id == campaign_id && t.status.is_live())
            .cloned()
    }

    async fn submit(&self, campaign_id: &str) -> String {
        let task_id = Uuid::new_v4().to_string();
        {
            let mut tasks = self.tasks.lock().await;
            tasks.insert(
                task_id.clone(),
                DispatchTask {
                    task_id: task_id.clone(),
                    campaign_id: campaign_id.to_string(),
                    status: TaskStatus::Queued,
                    final_campaign_status: None,
                    error: None,
                    created_at: Utc::now(),
                    finished_at: None,
                },
            );
        }

        let service = self.clone();
        let task_id_clone = task_id.clone();
        let campaign_id = campaign_id.to_string();
        tokio::spawn(async move {
            service.run_task(task_id_clone, campaign_id).await;
        });

        task_id
    }

    async fn run_task(&self, task_id: String, campaign_id: String) {
        self.update_task(&task_id, |t| t.status = TaskStatus::Running)
            .await;

        match self.run(&campaign_id).await {
            Ok(final_status) => {
                log::info!(
                    "(run_task) Tarea {} terminó; campaña {} quedó en {:?}",
                    task_id,
                    campaign_id,
                    final_status
                );
                self.update_task(&task_id, |t| {
                    t.status = TaskStatus::Finished;
                    t.final_campaign_status = final_status;
                    t.finished_at = Some(Utc::now());
                })
                .await;
            }
            Err(e) => {
                log::error!(
                    "(run_task) Error fatal en campaña {}: {:?}. Marcando 'cancelled'.",
                    campaign_id,
                    e
                );
                let final_status = match self.campaign_service.mark_cancelled(&campaign_id).await {
                    Ok(_) => Some(CampaignStatus::Cancelled),
                    Err(cancel_err) => {
                        log::error!(
                            "(run_task) No se pudo cancelar la campaña {}: {:?}",
                            campaign_id,
                            cancel_err
                        );
                        None
                    }
                };
                self.update_task(&task_id, |t| {
                    t.status = TaskStatus::Failed;
                    t.final_campaign_status = final_status;
                    t.error = Some(format!("{:#}", e));
                    t.finished_at = Some(Utc::now());
                })
                .await;
            }
        }
    }

    async fn update_task<F>(&self, task_id: &str, f: F)
    where
        F: FnOnce(&mut DispatchTask),
    {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get_mut(task_id) {
            f(task);
            if !task.status.is_live() {
                prune_finished_tasks(&mut tasks, self.task_retention);
            }
        }
    }

    /// Corrida del motor. Devuelve el estado en que quedó la campaña
    /// (`None` si la campaña no existe o se borró).
    ///
    /// Los errores que devuelve son fatales (almacenamiento); los errores de
    /// envío quedan en el registro de ejecución y no cortan la corrida.
    pub async fn run(&self, campaign_id: &str) -> Result<Option<CampaignStatus>> {
        let campaign = match self.campaign_service.get_campaign(campaign_id).await {
            Ok(c) => c,
            Err(e) if matches!(e.downcast_ref::<CampaignError>(), Some(CampaignError::NotFound(_))) => {
                log::warn!("(run) Campaña {} no existe, nada que enviar", campaign_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let blocks = campaign.effective_blocks();
        let total_pairs = blocks.len() * campaign.contacts.len();
        log::info!(
            "(run) Iniciando campaña {} por instancia '{}': {} bloques x {} contactos",
            campaign_id,
            campaign.instance_name,
            blocks.len(),
            campaign.contacts.len()
        );

        let mut processed = 0usize;
        for (block_index, block) in blocks.iter().enumerate() {
            for contact in &campaign.contacts {
                processed += 1;

                // Punto de cancelación: uno por mensaje
                let status = self.campaign_service.get_status(campaign_id).await?;
                if status != Some(CampaignStatus::Running) {
                    log::info!(
                        "(run) Campaña {} ya no está running ({:?}); se detiene en bloque {} contacto '{}'",
                        campaign_id,
                        status,
                        block_index,
                        contact.phone
                    );
                    return Ok(status);
                }

                let record = self
                    .execution_service
                    .get_or_create_record(campaign_id, block_index, contact)
                    .await?;
                if record.status.is_settled() {
                    // Ya tuvo su intento en una corrida anterior
                    continue;
                }

                self.execution_service.mark_sending(&record.id).await?;

                let outcome = tokio::time::timeout(
                    self.send_timeout,
                    self.sender
                        .send_block(&campaign.instance_name, contact, block),
                )
                .await;

                match outcome {
                    Ok(Ok(receipt)) => {
                        self.execution_service
                            .mark_sent(&record.id, receipt.remote_message_id.as_deref())
                            .await?;
                        self.campaign_service.increment_sent(campaign_id).await?;
                    }
                    Ok(Err(e)) => {
                        log::warn!(
                            "(run) Falló envío bloque {} a '{}' en campaña {}: {:#}",
                            block_index,
                            contact.phone,
                            campaign_id,
                            e
                        );
                        self.execution_service
                            .mark_failed(&record.id, &format!("{:#}", e))
                            .await?;
                        self.campaign_service.increment_failed(campaign_id).await?;
                    }
                    Err(_) => {
                        let msg = format!("Timeout tras {}s", self.send_timeout.as_secs());
                        log::warn!(
                            "(run) {} enviando bloque {} a '{}' en campaña {}",
                            msg,
                            block_index,
                            contact.phone,
                            campaign_id
                        );
                        self.execution_service.mark_failed(&record.id, &msg).await?;
                        self.campaign_service.increment_failed(campaign_id).await?;
                    }
                }

                if processed < total_pairs {
                    tokio::time::sleep(self.delay_for(block, &campaign)).await;
                }
            }
        }

        if self.campaign_service.mark_completed(campaign_id).await? {
            log::info!("(run) Campaña {} completada", campaign_id);
        }
        self.campaign_service.get_status(campaign_id).await
    }

    /// Delay del bloque -> delay de la campaña -> default global
    pub(crate) fn delay_for(&self, block: &MessageBlock, campaign: &CampaignRecord) -> Duration {
        block
            .delay_secs
            .or(campaign.default_delay_secs)
            .map(Duration::from_secs)
            .unwrap_or(self.default_delay)
    }
}

/// Deja solo las `retention` tareas terminadas más recientes
fn prune_finished_tasks(tasks: &mut HashMap<String, DispatchTask>, retention: usize) {
    let mut finished: Vec<_> = tasks
        .values()
        .filter(|t| !t.status.is_live())
        .map(|t| (t.finished_at, t.created_at, t.task_id.clone()))
        .collect();
    if finished.len() <= retention {
        return;
    }
    finished.sort();
    let excess = finished.len() - retention;
    for (_, _, task_id) in finished.into_iter().take(excess) {
        tasks.remove(&task_id);
    }
    log::debug!("(prune_finished_tasks) {} tareas viejas eliminadas del registro", excess);
}
