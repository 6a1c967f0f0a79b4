#![cfg(unix)]

mod common;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use common::{Fixture, ECHO_ENGINE};
use sensitivity_gateway::api::config::ApiConfig;
use sensitivity_gateway::api::handlers::{anonymize_handler, health_check, source_attributes};
use sensitivity_gateway::api::models::PipelineJob;
use sensitivity_gateway::api::workers::start_workers;

macro_rules! gateway_app {
    ($fixture:expr) => {{
        let services = Arc::new($fixture.services());
        let config = ApiConfig::default();
        let (job_tx, job_rx) = mpsc::channel::<PipelineJob>(config.queue_size);
        start_workers(job_rx, services.clone(), config.workers);
        test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(job_tx))
                .app_data(web::Data::new(services))
                .service(web::resource("/anonymize").route(web::post().to(anonymize_handler)))
                .service(web::resource("/health").route(web::get().to(health_check)))
                .service(
                    web::resource("/sources/{source}/attributes")
                        .route(web::get().to(source_attributes)),
                ),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_anonymize_round_trip() {
    let fixture = Fixture::new(ECHO_ENGINE);
    let app = gateway_app!(fixture);

    let req = test::TestRequest::post()
        .uri("/anonymize")
        .set_json(json!({
            "requester_email": "lead@clinic.org",
            "requested_domain": "Healthcare",
            "purpose": "Research",
            "source": "people.csv",
            "attributes": ["salary"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["trust_score"], "High");
    assert_eq!(body["overall_sensitivity"], "Moderate");
    assert_eq!(body["engine"]["status"], "success");
    assert_eq!(body["engine"]["protocol_version"], 1);
    assert_eq!(body["engine"]["score"], 0.75);
    assert_eq!(body["values"][0]["anonymized"]["status"], "value");
    assert_eq!(body["values"][0]["anonymized"]["value"], "High|Moderate|50000");
    assert_eq!(body["compliance"]["explainability"], "N/A");
    assert_eq!(body["compliance"]["sharing_entity"], "N/A");
}

#[actix_web::test]
async fn test_invalid_request_rejected() {
    let fixture = Fixture::new(ECHO_ENGINE);
    let app = gateway_app!(fixture);

    let req = test::TestRequest::post()
        .uri("/anonymize")
        .set_json(json!({
            "requester_email": "",
            "requested_domain": "Finance",
            "purpose": "Audit",
            "source": "people.csv",
            "attributes": ["salary"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
}

#[actix_web::test]
async fn test_unknown_source_is_not_found() {
    let fixture = Fixture::new(ECHO_ENGINE);
    let app = gateway_app!(fixture);

    let req = test::TestRequest::post()
        .uri("/anonymize")
        .set_json(json!({
            "requester_email": "lead@clinic.org",
            "requested_domain": "Finance",
            "purpose": "Audit",
            "source": "nowhere.csv",
            "attributes": ["salary"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_health_and_source_attributes() {
    let fixture = Fixture::new(ECHO_ENGINE);
    let app = gateway_app!(fixture);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["workers"], 4);
    assert_eq!(body["queue_capacity"], 100);

    let req = test::TestRequest::get()
        .uri("/sources/people.csv/attributes")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["attributes"], json!(["name", "city", "salary", "notes"]));
}
