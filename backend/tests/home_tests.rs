mod common;

use common::*;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::StatusCode;
use image_bucket::{bucket::mock::InMemoryBucket, middleware::AccessControl, types::Environment};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_home_page_renders_upload_form() {
    let setup = TestSetup::unauthenticated("img/");

    let response = setup.send_get_request("/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response_text(response).await;

    assert!(html.contains(r#"action="http://localhost:4566/mock-bucket""#));
    let key = form_field(&html, "key").unwrap();
    assert!(key.starts_with("img/"));
    assert_eq!(key, "img/${filename}");

    for field in [
        "policy",
        "x-amz-algorithm",
        "x-amz-credential",
        "x-amz-date",
        "x-amz-signature",
    ] {
        let value = form_field(&html, field).unwrap_or_default();
        assert!(!value.is_empty(), "field {field} should be set");
    }
    assert_eq!(form_field(&html, "Content-Type"), None);
}

#[tokio::test]
async fn test_home_page_is_scoped_to_token_owner() {
    let setup = TestSetup::new();

    let response = setup.send_get_request("/", Some(BOB_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response_text(response).await;
    assert_eq!(form_field(&html, "key").as_deref(), Some("bob/${filename}"));
}

#[tokio::test]
async fn test_home_page_with_content_type() {
    let setup = TestSetup::unauthenticated("img/");

    let response = setup
        .send_get_request("/?content_type=image/png", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response_text(response).await;
    assert_eq!(form_field(&html, "Content-Type").as_deref(), Some("image/png"));

    // Handlebars escapes '=' in attribute values
    let policy = form_field(&html, "policy").unwrap().replace("&#x3D;", "=");
    let document: serde_json::Value =
        serde_json::from_slice(&STANDARD.decode(policy).unwrap()).unwrap();
    assert_eq!(
        document["conditions"][0],
        serde_json::json!(["starts-with", "$Content-Type", ""])
    );
    assert_eq!(
        document["conditions"][2],
        serde_json::json!(["starts-with", "$key", "img/"])
    );
}

#[tokio::test]
async fn test_home_page_upstream_failure() {
    let setup = TestSetup::unauthenticated("img/");
    setup.bucket.set_unavailable(true);

    let response = setup.send_get_request("/", None).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_is_public() {
    let setup = TestSetup::new();

    let response = setup.send_get_request("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn test_openapi_lists_routes_in_development() {
    let setup = TestSetup::new();

    let response = setup.send_get_request("/openapi.json", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["paths"]["/get-images"].is_object());
    assert!(body["paths"]["/delete-image"].is_object());
}

#[tokio::test]
async fn test_docs_hidden_in_production() {
    let setup = TestSetup::build(
        Environment::Production,
        AccessControl::disabled("img/"),
        InMemoryBucket::default(),
    );

    for route in ["/openapi.json", "/docs"] {
        let response = setup.send_get_request(route, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "route: {route}");
    }

    // The upload page itself is unaffected
    let response = setup.send_get_request("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_home_page_overflowing_expiry_is_an_error_response() {
    let environment = Environment::Development {
        presign_expiry_override: Some(10_000_000_000_000),
        disable_auth: true,
    };
    let setup = TestSetup::build(
        environment,
        AccessControl::disabled("img/"),
        InMemoryBucket::default(),
    );

    let response = setup.send_get_request("/", None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
