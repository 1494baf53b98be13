//! handlers/dispatch_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::error_model::error_response;
use crate::services::dispatch_service::DispatchService;

/// GET /api/dispatch/tasks
pub async fn list_tasks_endpoint(dispatch_service: web::Data<DispatchService>) -> HttpResponse {
    let items = dispatch_service.list_tasks().await;
    HttpResponse::Ok().json(json!({
        "total": items.len(),
        "items": items
    }))
}

/// GET /api/dispatch/tasks/{task_id}
pub async fn get_task_endpoint(
    dispatch_service: web::Data<DispatchService>,
    path: web::Path<String>,
) -> HttpResponse {
    match dispatch_service.get_task(&path.into_inner()).await {
        Ok(task) => HttpResponse::Ok().json(task),
        Err(e) => error_response(&e),
    }
}
