//! Integration tests for bulk translation and asset uploads.

mod common;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, post_json, send, unreachable_pool};
use serde_json::json;

const BOUNDARY: &str = "colorbook-test-boundary";

fn multipart_body(folder: Option<&str>, file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(folder) = folder {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"folder\"\r\n\r\n{folder}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(app: &axum::Router, body: Vec<u8>) -> axum::http::Response<Body> {
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    send(
        app,
        Method::POST,
        "/api/v1/assets",
        Body::from(body),
        Some(content_type.as_str()),
    )
    .await
}

#[tokio::test]
async fn translate_returns_item_language_field_map() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/translate",
        json!({
            "items": [
                { "id": "7", "fields": { "name": "Kitten", "title": "A kitten" } }
            ],
            "languages": ["zh", "ja"]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["7"]["zh"]["name"], "[zh] Kitten");
    assert_eq!(json["data"]["7"]["ja"]["title"], "[ja] A kitten");
}

#[tokio::test]
async fn translate_validates_languages() {
    let app = build_test_app(unreachable_pool());

    for languages in [json!([]), json!(["EN"]), json!(["zh", "zh"])] {
        let response = post_json(
            &app.router,
            "/api/v1/translate",
            json!({
                "items": [{ "id": "1", "fields": { "name": "Cat" } }],
                "languages": languages
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{languages}");
    }
}

#[tokio::test]
async fn upload_stores_file_under_folder() {
    let app = build_test_app(unreachable_pool());
    let png = [0x89u8, b'P', b'N', b'G', 0, 1, 2, 3];

    let response = upload(
        &app.router,
        multipart_body(Some("line-art"), Some(("cat.png", "image/png", &png[..]))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let key = json["data"]["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("line-art/"));
    assert!(key.ends_with(".png"));
    assert_eq!(json["data"]["url"], format!("https://cdn.test/{key}"));
    assert_eq!(json["data"]["size"], png.len());

    let objects = app.assets.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].2, "image/png");
}

#[tokio::test]
async fn upload_rejects_bad_input_without_storing() {
    let app = build_test_app(unreachable_pool());

    let no_file = upload(&app.router, multipart_body(Some("line-art"), None)).await;
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    let bad_folder = upload(
        &app.router,
        multipart_body(Some("../etc"), Some(("cat.png", "image/png", &b"x"[..]))),
    )
    .await;
    assert_eq!(bad_folder.status(), StatusCode::BAD_REQUEST);

    let gif = upload(
        &app.router,
        multipart_body(None, Some(("cat.gif", "image/gif", &b"GIF89a"[..]))),
    )
    .await;
    assert_eq!(gif.status(), StatusCode::BAD_REQUEST);

    assert!(app.assets.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn import_rejects_non_http_urls() {
    let app = build_test_app(unreachable_pool());

    let response = post_json(
        &app.router,
        "/api/v1/assets/import",
        json!({ "url": "file:///etc/passwd" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.assets.objects.lock().unwrap().is_empty());
}
