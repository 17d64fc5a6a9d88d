//! Integration tests for the job and batch endpoints.
//!
//! These run against in-memory fakes and need no database.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post_json, unreachable_pool};
use serde_json::json;

fn colorize(subject_key: &str) -> serde_json::Value {
    json!({
        "subject_key": subject_key,
        "job_type": "colorization",
        "params": { "image_url": "https://cdn.test/line.png" }
    })
}

#[tokio::test]
async fn start_get_and_cancel_a_job() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(&app.router, "/api/v1/jobs", colorize("item-1")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = body_json(response).await;
    assert_eq!(started["data"]["key"]["subject_key"], "item-1");
    assert_eq!(started["data"]["view"]["busy"], true);
    let job_id = started["data"]["id"].clone();

    // Wait for the first poll so progress is visible.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let json = body_json(get(&app.router, "/api/v1/jobs/item-1/colorization").await).await;
    assert_eq!(json["data"]["id"], job_id);
    assert_eq!(json["data"]["state"], "polling");
    assert_eq!(json["data"]["progress"], 25);

    let busy = body_json(get(&app.router, "/api/v1/jobs/item-1/colorization/busy").await).await;
    assert_eq!(busy["data"]["busy"], true);

    let active = body_json(get(&app.router, "/api/v1/jobs").await).await;
    assert_eq!(active["data"].as_array().unwrap().len(), 1);

    let response = delete(&app.router, "/api/v1/jobs/item-1/colorization").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = body_json(response).await;
    assert_eq!(cancelled["data"]["state"], "cancelled");
    assert_eq!(cancelled["data"]["view"]["busy"], false);

    assert!(!app.jobs.is_busy("item-1", colorbook_core::job::JobType::Colorization).await);
}

#[tokio::test]
async fn invalid_params_create_no_job() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/jobs",
        json!({
            "subject_key": "item-1",
            "job_type": "colorization",
            "params": { "image_url": "not a url" }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let response = get(&app.router, "/api/v1/jobs/item-1/colorization").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_job_type_in_path_is_a_validation_error() {
    let app = build_test_app(unreachable_pool());
    let response = get(&app.router, "/api/v1/jobs/item-1/sketching").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn restart_supersedes_the_running_job() {
    let app = build_test_app(unreachable_pool());

    let first = body_json(post_json(&app.router, "/api/v1/jobs", colorize("item-1")).await).await;
    let second = body_json(post_json(&app.router, "/api/v1/jobs", colorize("item-1")).await).await;
    assert_ne!(first["data"]["id"], second["data"]["id"]);

    let jobs = body_json(get(&app.router, "/api/v1/jobs/item-1").await).await;
    let jobs = jobs["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], second["data"]["id"]);
}

#[tokio::test]
async fn text_job_completes_inline() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/jobs",
        json!({
            "subject_key": "draft",
            "job_type": "theme-generation",
            "params": { "prompt": "ocean animals", "count": 3 }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let json = body_json(get(&app.router, "/api/v1/jobs/draft/theme-generation").await).await;
    assert_eq!(json["data"]["state"], "completed");
    assert_eq!(json["data"]["result"]["text"], "{\"themes\":[]}");
    assert_eq!(json["data"]["view"]["progress"], 100);
}

#[tokio::test]
async fn batch_lifecycle_over_http() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/batches",
        json!({
            "job_type": "colorization",
            "shared": { "image_url": "https://cdn.test/line.png" },
            "items": [
                { "subject_key": "a" },
                { "subject_key": "b", "params": { "aspect_ratio": "9:7" } }
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = body_json(response).await;
    assert_eq!(started["data"]["total_count"], 2);
    let batch_id = started["data"]["batch_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = body_json(get(&app.router, &format!("/api/v1/batches/{batch_id}")).await).await;
    assert_eq!(status["data"]["per_subject"]["b"]["status"], "failed");
    assert_eq!(status["data"]["per_subject"]["a"]["status"], "polling");
    assert_eq!(status["data"]["done"], false);

    let listed = body_json(get(&app.router, "/api/v1/batches").await).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let cancelled =
        body_json(delete(&app.router, &format!("/api/v1/batches/{batch_id}")).await).await;
    assert_eq!(cancelled["data"]["cancelled"], true);
    assert_eq!(cancelled["data"]["done"], true);
    assert_eq!(cancelled["data"]["failed_count"], 2);
}

#[tokio::test]
async fn empty_batch_is_rejected_and_unknown_batch_is_404() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/batches",
        json!({ "job_type": "colorization", "items": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        &app.router,
        "/api/v1/batches/00000000-0000-4000-8000-000000000000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
