pub mod config;
pub mod handlers;
pub mod models;
pub mod processor;
pub mod workers;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::api::config::ApiConfig;
use crate::api::handlers::{anonymize_handler, health_check, source_attributes};
use crate::api::models::PipelineJob;
use crate::api::workers::start_workers;
use crate::services::Services;

/// Starts the API server
///
/// Sets up the job queue and worker tasks, then serves until shutdown.
/// Pending jobs are drained by the workers before services are released.
///
/// # Arguments
/// * `host` - Host address to bind to (e.g., "127.0.0.1")
/// * `port` - Port to listen on
/// * `config` - Queue, worker and timeout settings
/// * `services` - Pipeline services shared by all workers
#[instrument(skip(config, services))]
pub async fn start_server(
    host: &str,
    port: u16,
    config: ApiConfig,
    services: Arc<Services>,
) -> Result<()> {
    info!("Starting anonymization gateway on {}:{}", host, port);

    debug!("Creating job queue with capacity: {}", config.queue_size);
    let (job_tx, job_rx) = mpsc::channel::<PipelineJob>(config.queue_size);
    let workers = start_workers(job_rx, services.clone(), config.workers);

    let job_tx_data = web::Data::new(job_tx);
    let config_data = web::Data::new(config);
    let services_data = web::Data::new(services.clone());

    info!("Starting HTTP server at {}:{}", host, port);
    let server_result = HttpServer::new({
        let job_tx_data = job_tx_data.clone();
        move || {
            App::new()
                .app_data(config_data.clone())
                .app_data(job_tx_data.clone())
                .app_data(services_data.clone())
                .service(web::resource("/anonymize").route(web::post().to(anonymize_handler)))
                .service(web::resource("/health").route(web::get().to(health_check)))
                .service(
                    web::resource("/sources/{source}/attributes")
                        .route(web::get().to(source_attributes)),
                )
        }
    })
    .bind((host, port))
    .map_err(|e| {
        error!("Failed to bind to {}:{}: {}", host, port, e);
        e
    })?
    .run()
    .await;

    // Cleanup: closing the queue lets workers drain and exit
    info!("Server shutting down, draining workers");
    drop(job_tx_data);
    for worker in workers {
        if let Err(e) = worker.await {
            error!("Worker task failed: {}", e);
        }
    }
    services.close();

    if let Err(e) = server_result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
