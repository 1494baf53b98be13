//! app.rs
use crate::handlers::{campaign_handler, contact_handler, dispatch_handler};
use actix_web::{web, HttpResponse};
use serde_json::json;

async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_endpoint))
            .service(
                web::scope("/campaigns")
                    .route(
                        "",
                        web::post().to(campaign_handler::create_campaign_endpoint),
                    )
                    .route("", web::get().to(campaign_handler::list_campaigns_endpoint))
                    .route(
                        "/{id}",
                        web::get().to(campaign_handler::get_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::put().to(campaign_handler::update_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::delete().to(campaign_handler::delete_campaign_endpoint),
                    )
                    .route(
                        "/{id}/start",
                        web::post().to(campaign_handler::start_campaign_endpoint),
                    )
                    .route(
                        "/{id}/pause",
                        web::post().to(campaign_handler::pause_campaign_endpoint),
                    )
                    .route(
                        "/{id}/cancel",
                        web::post().to(campaign_handler::cancel_campaign_endpoint),
                    )
                    .route(
                        "/{id}/executions",
                        web::get().to(campaign_handler::list_executions_endpoint),
                    ),
            )
            .service(
                web::scope("/dispatch")
                    .route("/tasks", web::get().to(dispatch_handler::list_tasks_endpoint))
                    .route(
                        "/tasks/{task_id}",
                        web::get().to(dispatch_handler::get_task_endpoint),
                    ),
            )
            .service(
                web::scope("/instances")
                    .route("", web::get().to(contact_handler::list_instances_endpoint))
                    .route(
                        "/{instance}/contacts",
                        web::get().to(contact_handler::list_contacts_endpoint),
                    )
                    .route(
                        "/{instance}/groups",
                        web::get().to(contact_handler::list_groups_endpoint),
                    ),
            ),
    );
}
