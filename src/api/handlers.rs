use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::api::config::ApiConfig;
use crate::api::models::{
    ErrorResponse, HealthStatus, PipelineJob, RequestContext, SourceAttributes,
};
use crate::error::PipelineError;
use crate::services::Services;

/// Maps an unrecoverable pipeline error to an HTTP response
fn error_response(e: &PipelineError) -> HttpResponse {
    let body = ErrorResponse::new(e.to_string());
    match e {
        PipelineError::SourceUnavailable(_) => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// HTTP handler for anonymization requests
///
/// Validates the request, submits it to the worker queue, and awaits the
/// report with a timeout. The report carries per-value labels and
/// sensitivities, the trust score, the engine outcome and any warnings.
#[instrument(skip(request, config, job_tx), fields(source = %request.source_identifier))]
pub async fn anonymize_handler(
    request: web::Json<RequestContext>,
    config: web::Data<ApiConfig>,
    job_tx: web::Data<mpsc::Sender<PipelineJob>>,
) -> impl Responder {
    info!("Received request from {}", request.requester_email);

    if let Err(e) = request.validate() {
        warn!("Rejected invalid request: {}", e);
        return HttpResponse::BadRequest().json(ErrorResponse::new(e));
    }

    // Try sending a few times with a short delay between attempts
    let max_attempts = 3;
    let retry_delay = Duration::from_millis(100);
    let request = request.into_inner();
    let mut attempts = 0;

    loop {
        let (response_tx, response_rx) = oneshot::channel();
        let job = PipelineJob {
            request: request.clone(),
            response_tx,
        };

        match job_tx.try_send(job) {
            Ok(_) => {
                debug!("Job enqueued after {} attempt(s)", attempts + 1);
                return match timeout(config.request_timeout, response_rx).await {
                    Ok(Ok(Ok(report))) => {
                        info!("Request completed, engine status {:?}", report.engine.status);
                        HttpResponse::Ok().json(report)
                    }
                    Ok(Ok(Err(e))) => {
                        error!("Request failed: {}", e);
                        error_response(&e)
                    }
                    Ok(Err(_)) => {
                        error!("Worker channel closed unexpectedly");
                        HttpResponse::InternalServerError().json(ErrorResponse::new("Worker dropped."))
                    }
                    Err(_) => {
                        error!("Request timed out after {:?}", config.request_timeout);
                        HttpResponse::RequestTimeout().json(ErrorResponse::new("Request timed out."))
                    }
                };
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                attempts += 1;
                if attempts >= max_attempts {
                    warn!("Queue full after {} attempts, rejecting request", max_attempts);
                    return HttpResponse::TooManyRequests().json(ErrorResponse::new(format!(
                        "Server is busy, try again later. Queue has been full for {:?}",
                        retry_delay * attempts
                    )));
                }
                warn!("Queue full, retrying (attempt {}/{})", attempts, max_attempts);
                sleep(retry_delay).await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Worker queue has been closed!");
                return HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
                    "Service is shutting down or unavailable.",
                ));
            }
        }
    }
}

/// Health check endpoint
///
/// Healthy while the queue accepts work, degraded when it is full,
/// unhealthy once it is closed.
#[instrument(skip(config, job_tx))]
pub async fn health_check(
    config: web::Data<ApiConfig>,
    job_tx: web::Data<mpsc::Sender<PipelineJob>>,
) -> impl Responder {
    let available = job_tx.capacity();
    let status = if job_tx.is_closed() {
        warn!("Health check: job queue closed");
        "unhealthy"
    } else if available == 0 {
        "degraded"
    } else {
        "healthy"
    };

    debug!("Health check: status={}, queue {}/{}", status, available, config.queue_size);
    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        workers: config.workers,
        queue_capacity: config.queue_size,
        queue_available: available,
        uptime_secs: config.started_at.elapsed().as_secs(),
    })
}

/// Lists the attributes (column names) a data source offers
#[instrument(skip(services))]
pub async fn source_attributes(
    source: web::Path<String>,
    services: web::Data<Arc<Services>>,
) -> impl Responder {
    let source = source.into_inner();
    let data_source = services.data_source.clone();
    let name = source.clone();

    match tokio::task::spawn_blocking(move || data_source.load_rows(&name)).await {
        Ok(Ok(rows)) => HttpResponse::Ok().json(SourceAttributes {
            source,
            attributes: rows.headers,
        }),
        Ok(Err(e)) => {
            warn!("Cannot list attributes of {}: {}", source, e);
            error_response(&e)
        }
        Err(e) => {
            error!("Source reader task failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Source reader failed."))
        }
    }
}
