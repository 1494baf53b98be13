//! config/app_config.rs
//! Configuración global del servicio (leída del entorno / .env, con valores por defecto).

use std::env;
use std::str::FromStr;

use crate::services::dispatch_service::DEFAULT_TASK_RETENTION;

/// Delay por defecto entre mensajes cuando ni el bloque ni la campaña definen uno.
pub const DEFAULT_MESSAGE_DELAY_SECS: u64 = 5;
/// Tiempo máximo para un envío a la Evolution API
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
/// Cada cuánto revisa el scheduler las campañas programadas
pub const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub http_workers: usize,
    pub evolution_api_url: String,
    pub evolution_api_key: String,
    pub default_delay_secs: u64,
    pub send_timeout_secs: u64,
    /// 0 = scheduler deshabilitado
    pub scheduler_interval_secs: u64,
    /// Tareas terminadas que conserva el registro en memoria
    pub task_retention: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite:data/campaigns.db".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
            http_workers: 1,
            evolution_api_url: "http://127.0.0.1:8080".to_string(),
            evolution_api_key: String::new(),
            default_delay_secs: DEFAULT_MESSAGE_DELAY_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            scheduler_interval_secs: DEFAULT_SCHEDULER_INTERVAL_SECS,
            task_retention: DEFAULT_TASK_RETENTION,
        }
    }
}

impl AppConfig {
    /// Construye la config a partir de variables de entorno.
    /// Cualquier variable ausente (o mal formada) cae al valor por defecto.
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_var("PORT", defaults.port),
            http_workers: parse_var("HTTP_WORKERS", defaults.http_workers),
            evolution_api_url: env::var("EVOLUTION_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.evolution_api_url),
            evolution_api_key: env::var("EVOLUTION_API_KEY").unwrap_or(defaults.evolution_api_key),
            default_delay_secs: parse_var("DEFAULT_MESSAGE_DELAY_SECS", defaults.default_delay_secs),
            send_timeout_secs: parse_var("SEND_TIMEOUT_SECS", defaults.send_timeout_secs),
            scheduler_interval_secs: parse_var(
                "SCHEDULER_INTERVAL_SECS",
                defaults.scheduler_interval_secs,
            ),
            task_retention: parse_var("TASK_RETENTION", defaults.task_retention),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("Valor inválido para {}='{}', usando el default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
