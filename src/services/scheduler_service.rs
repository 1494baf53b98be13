use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

use crate::models::error_model::CampaignError;
use crate::services::campaign_service::CampaignService;
use crate::services::dispatch_service::DispatchService;

/// Arranca las campañas `scheduled` cuando llega su fecha.
#[derive(Clone)]
pub struct SchedulerService {
    campaign_service: CampaignService,
    dispatch_service: DispatchService,
}

impl SchedulerService {
    pub fn new(campaign_service: CampaignService, dispatch_service: DispatchService) -> Self {
        Self {
            campaign_service,
            dispatch_service,
        }
    }

    /// Loop en segundo plano; `interval` cero lo deshabilita.
    pub fn spawn(self, interval: Duration) {
        if interval.is_zero() {
            log::info!("(scheduler) Deshabilitado (SCHEDULER_INTERVAL_SECS=0)");
            return;
        }
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.start_due_campaigns().await {
                    log::error!("(scheduler) Error revisando campañas programadas: {:?}", e);
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Devuelve los ids de las campañas que arrancó en esta pasada.
    pub async fn start_due_campaigns(&self) -> Result<Vec<String>> {
        let due = self.campaign_service.list_due_scheduled(Utc::now()).await?;
        let mut started = Vec::new();

        for campaign_id in due {
            match self.dispatch_service.start_campaign(&campaign_id).await {
                Ok((_, task_id)) => {
                    log::info!(
                        "(scheduler) Campaña programada {} iniciada (tarea {})",
                        campaign_id,
                        task_id
                    );
                    started.push(campaign_id);
                }
                Err(e) => match e.downcast_ref::<CampaignError>() {
                    // No va a poder arrancar sola nunca: se cancela
                    Some(CampaignError::Validation(reason)) => {
                        log::warn!(
                            "(scheduler) Campaña {} no puede iniciar ({}); se cancela",
                            campaign_id,
                            reason
                        );
                        if let Err(cancel_err) =
                            self.campaign_service.mark_cancelled(&campaign_id).await
                        {
                            log::error!(
                                "(scheduler) No se pudo cancelar la campaña {}: {:?}",
                                campaign_id,
                                cancel_err
                            );
                        }
                    }
                    _ => {
                        log::error!(
                            "(scheduler) No se pudo iniciar la campaña {}: {:?}",
                            campaign_id,
                            e
                        );
                    }
                },
            }
        }

        Ok(started)
    }
}
