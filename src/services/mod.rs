//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub mod campaign_service;
pub mod dispatch_service;
pub mod evolution_service;
pub mod execution_service;
pub mod scheduler_service;

/// Los timestamps se guardan como RFC3339 en columnas TEXT
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Timestamp inválido: {}", raw))
}

pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}
