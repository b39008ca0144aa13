// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error routing: not-found and failure pages, logging and notification.

mod common;

use axum::http::StatusCode;
use common::{body_text, create_test_app, get};
use tower::ServiceExt; // for oneshot
use trellis::app::UNEXPECTED_ERROR_MESSAGE;

#[tokio::test]
async fn test_unknown_controller_is_404() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/nothing/here", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(body.contains("<h1>Missing</h1>"), "{body}");
    assert!(
        body.contains("Cannot access controller &#039;NothingController&#039;"),
        "{body}"
    );
}

#[tokio::test]
async fn test_unknown_action_is_404() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/index/nope", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(
        body.contains("The action &#039;IndexController::nope()&#039; does not exist"),
        "{body}"
    );
}

#[tokio::test]
async fn test_dash_prefixed_controller_is_404() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/-index", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response)
        .await
        .contains("The requested controller does not exist"));
}

#[tokio::test]
async fn test_explicit_not_found_from_action() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/index/gone", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("No such thing"));
}

#[tokio::test]
async fn test_action_failure_is_500_with_details_in_development() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/index/fail", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.starts_with("<html><title></title>"), "{body}");
    assert!(body.contains("<h1>Broken</h1>"), "{body}");
    assert!(body.contains("The dispatch could not be completed"), "{body}");

    // Development never notifies.
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_xhr_error_page_is_view_only_with_200() {
    let app = create_test_app();
    let response = app
        .router
        .oneshot(get("/index/fail", &[("X-Requested-With", "XMLHttpRequest")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with("<h1>Broken</h1>"), "{body}");
    assert!(!body.contains("<html>"));
}

#[tokio::test]
async fn test_production_failure_is_logged_and_notified() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(get("/mobi/index/fail", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, "<h1>Application Error</h1>");

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Exception Caught!");
    assert_eq!(sent[0].to, "Mobile Support");
    assert!(sent[0].body.contains("disk full"));

    let log = std::fs::read_to_string(app.root().join("application/mobi/logs/exception.log"))
        .unwrap();
    assert!(log.contains("Caused by: Cache error: disk full"), "{log}");

    // A second failure within the delay is logged but not notified.
    let response = app
        .router
        .oneshot(get("/mobi/index/fail", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_production_not_found_is_not_reported() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/mobi/missing", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "<h1>Page Not Found</h1>");
    assert!(app.notifier.sent().is_empty());
    assert!(!app
        .root()
        .join("application/mobi/logs/exception.log")
        .exists());
}

#[tokio::test]
async fn test_missing_module_config_shows_unexpected_error_page() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/broken", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("Unexpected Application Error"), "{body}");
    assert!(body.contains(UNEXPECTED_ERROR_MESSAGE), "{body}");
}

#[tokio::test]
async fn test_report_error_writes_error_log() {
    let app = create_test_app();
    let response = app.router.clone().oneshot(get("/index/report", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "reported");
    let log = std::fs::read_to_string(app.root().join("application/pc/logs/error.log")).unwrap();
    assert!(log.contains("disk almost full"));
}
