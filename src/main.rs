use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::campaign_service::CampaignService;
use crate::services::dispatch_service::DispatchService;
use crate::services::evolution_service::EvolutionService;
use crate::services::execution_service::ExecutionService;
use crate::services::scheduler_service::SchedulerService;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_url: &str) -> Result<Pool<Sqlite>> {
    // Crear la carpeta del archivo (p.e. ./data) si hace falta
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    {
        let path = path.split('?').next().unwrap_or_default();
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && path != ":memory:" {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("No se pudo crear directorio {:?}", parent))?;
            }
        }
    }

    log::info!("Conectando a SQLite en {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)
        .context("DATABASE_URL inválida")?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")?;

    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env();

    // Conectarnos a la DB
    let db_pool = setup_database(&config.database_url)
        .await
        .expect("No se pudo inicializar la base de datos");

    let campaign_service = CampaignService::new(db_pool.clone());
    if let Err(e) = campaign_service.run_migrations().await {
        panic!("Fallo en migraciones de 'campaigns': {:?}", e);
    }

    // Campañas que quedaron 'running' de un proceso anterior no tienen motor
    match campaign_service.pause_orphaned_running().await {
        Ok(0) => {}
        Ok(n) => log::warn!("{} campañas 'running' huérfanas pasaron a 'paused'", n),
        Err(e) => log::error!("No se pudieron reconciliar campañas running: {:?}", e),
    }

    let execution_service = ExecutionService::new(db_pool.clone());

    if config.evolution_api_key.is_empty() {
        log::warn!("EVOLUTION_API_KEY no está definida; la Evolution API rechazará los envíos");
    }
    let evolution_service =
        EvolutionService::new(&config.evolution_api_url, &config.evolution_api_key);

    let dispatch_service = DispatchService::new(
        campaign_service.clone(),
        execution_service.clone(),
        Arc::new(evolution_service.clone()),
        Duration::from_secs(config.default_delay_secs),
        Duration::from_secs(config.send_timeout_secs),
    )
    .with_task_retention(config.task_retention);

    SchedulerService::new(campaign_service.clone(), dispatch_service.clone())
        .spawn(Duration::from_secs(config.scheduler_interval_secs));

    // Levantar servidor
    log::info!("Levantando servidor en {}:{}", config.bind_addr, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(execution_service.clone()))
            .app_data(web::Data::new(evolution_service.clone()))
            .app_data(web::Data::new(dispatch_service.clone()))
            .configure(app::init_app)
    })
    .workers(config.http_workers.max(1))
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
