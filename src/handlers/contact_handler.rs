//! handlers/contact_handler.rs
//! Consultas de solo lectura contra la Evolution API.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::error_model::error_response;
use crate::services::evolution_service::EvolutionService;

/// GET /api/instances
pub async fn list_instances_endpoint(evolution: web::Data<EvolutionService>) -> HttpResponse {
    match evolution.list_instances().await {
        Ok(items) => HttpResponse::Ok().json(json!({ "total": items.len(), "items": items })),
        Err(e) => error_response(&e),
    }
}

/// GET /api/instances/{instance}/contacts
pub async fn list_contacts_endpoint(
    evolution: web::Data<EvolutionService>,
    path: web::Path<String>,
) -> HttpResponse {
    match evolution.list_contacts(&path.into_inner()).await {
        Ok(items) => HttpResponse::Ok().json(json!({ "total": items.len(), "items": items })),
        Err(e) => error_response(&e),
    }
}

/// GET /api/instances/{instance}/groups
pub async fn list_groups_endpoint(
    evolution: web::Data<EvolutionService>,
    path: web::Path<String>,
) -> HttpResponse {
    match evolution.list_groups(&path.into_inner()).await {
        Ok(items) => HttpResponse::Ok().json(json!({ "total": items.len(), "items": items })),
        Err(e) => error_response(&e),
    }
}
