//! models/error_model.rs
//! Rechazos de dominio. Viajan dentro de `anyhow::Error` y los handlers los
//! recuperan con `downcast_ref` para elegir el status HTTP.

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaña no encontrada: {0}")]
    NotFound(String),

    #[error("Tarea no encontrada: {0}")]
    TaskNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Transición inválida: {0}")]
    Conflict(String),

    #[error("Evolution API: {0}")]
    Upstream(String),
}

impl CampaignError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CampaignError::NotFound(_) | CampaignError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            CampaignError::Validation(_) => StatusCode::BAD_REQUEST,
            CampaignError::Conflict(_) => StatusCode::CONFLICT,
            CampaignError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convierte cualquier error de servicio en la respuesta JSON estándar.
pub fn error_response(err: &anyhow::Error) -> HttpResponse {
    match err.downcast_ref::<CampaignError>() {
        Some(domain) => HttpResponse::build(domain.status_code()).json(json!({
            "success": false,
            "error": domain.to_string()
        })),
        None => {
            log::error!("(error_response) Error interno: {:?}", err);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal server error",
                "details": format!("{:#}", err)
            }))
        }
    }
}
