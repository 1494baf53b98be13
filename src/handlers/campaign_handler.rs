//! handlers/campaign_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::campaign_model::{
    CreateCampaignRequest, ListCampaignsQuery, StartCampaignResponse, UpdateCampaignRequest,
};
use crate::models::error_model::error_response;
use crate::models::execution_model::{ExecutionLogResponse, ExecutionQuery, ExecutionStatus};
use crate::services::campaign_service::CampaignService;
use crate::services::dispatch_service::DispatchService;
use crate::services::execution_service::ExecutionService;

/// POST /api/campaigns
pub async fn create_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    body: web::Json<CreateCampaignRequest>,
) -> HttpResponse {
    match campaign_service.create_campaign(body.into_inner()).await {
        Ok(campaign) => HttpResponse::Created().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns
pub async fn list_campaigns_endpoint(
    campaign_service: web::Data<CampaignService>,
    query: web::Query<ListCampaignsQuery>,
) -> HttpResponse {
    match campaign_service.list_campaigns(query.into_inner()).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    match campaign_service.get_campaign(&path.into_inner()).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/campaigns/{id}
pub async fn update_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
    body: web::Json<UpdateCampaignRequest>,
) -> HttpResponse {
    match campaign_service
        .update_campaign(&path.into_inner(), body.into_inner())
        .await
    {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/campaigns/{id}
pub async fn delete_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match campaign_service.delete_campaign(&id).await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "success": true,
            "id": id,
            "message": "Campaña eliminada"
        })),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/start
///
/// Responde apenas la campaña queda en `running`; el envío corre en una
/// tarea consultable en /api/dispatch/tasks/{task_id}.
pub async fn start_campaign_endpoint(
    dispatch_service: web::Data<DispatchService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match dispatch_service.start_campaign(&id).await {
        Ok((campaign, task_id)) => {
            log::info!("(start_campaign_endpoint) Campaña {} en cola (tarea {})", id, task_id);
            HttpResponse::Accepted().json(StartCampaignResponse {
                success: true,
                task_id,
                campaign,
            })
        }
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/pause
pub async fn pause_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    match campaign_service.pause_campaign(&path.into_inner()).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/cancel
pub async fn cancel_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    match campaign_service.cancel_campaign(&path.into_inner()).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns/{id}/executions?status=failed
pub async fn list_executions_endpoint(
    campaign_service: web::Data<CampaignService>,
    execution_service: web::Data<ExecutionService>,
    path: web::Path<String>,
    query: web::Query<ExecutionQuery>,
) -> HttpResponse {
    let campaign_id = path.into_inner();

    let status = match query.status.as_deref().map(str::parse::<ExecutionStatus>) {
        Some(Ok(s)) => Some(s),
        Some(Err(e)) => return error_response(&anyhow::Error::from(e)),
        None => None,
    };

    // 404 si la campaña no existe
    if let Err(e) = campaign_service.get_campaign(&campaign_id).await {
        return error_response(&e);
    }

    let result = futures::try_join!(
        execution_service.summary(&campaign_id),
        execution_service.list_for_campaign(&campaign_id, status),
    );

    match result {
        Ok((summary, items)) => HttpResponse::Ok().json(ExecutionLogResponse {
            campaign_id,
            summary,
            items,
        }),
        Err(e) => error_response(&e),
    }
}
