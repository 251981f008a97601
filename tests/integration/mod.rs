//! Integration tests for the contract router bootstrap.
//!
//! Contracts are read from `tests/fixtures` through the same source chain the
//! binary uses, with an empty bundle so the file fallback is exercised.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::Json;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use contract_router::api::handlers::{get_healthz, GET_HEALTHZ};
use contract_router::api::{handler_set, AppState, HandlerSet};
use contract_router::bootstrap::{bootstrap, build, Bootstrapped};
use contract_router::config::Config;
use contract_router::contract::{BundledSource, FileSource, SourceChain, BUNDLED_CONTRACT};
use contract_router::error::{BindingError, StartupError};
use contract_router::probe::{StaticProbe, TcpProbe};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Empty bundle, so resolution always falls through to the file.
fn file_only(name: &str) -> SourceChain {
    SourceChain::new()
        .with(BundledSource::new(b""))
        .with(FileSource::new(fixture(name)))
}

fn state(probe: StaticProbe) -> AppState {
    AppState::new(Arc::new(probe))
}

fn boot(name: &str, probe: StaticProbe) -> Result<Bootstrapped, StartupError> {
    build(&file_only(name), "/api", handler_set(), state(probe))
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_version(State(_state): State<AppState>) -> Json<Value> {
    Json(json!({ "version": "2.0.0" }))
}

#[tokio::test]
async fn health_only_contract_serves_success_payload() {
    let booted = boot("healthz.yml", StaticProbe::healthy("db")).unwrap();
    assert_eq!(booted.routes.len(), 1);
    assert_eq!(booted.routes[0].path, "/api/healthz");
    assert_eq!(booted.routes[0].operation, GET_HEALTHZ);

    let (status, body) = get_json(booted.router, "/api/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn unhealthy_dependency_is_a_normal_response() {
    let probe = StaticProbe::unhealthy("db", "connection refused");
    let booted = boot("healthz.yml", probe.clone()).unwrap();

    let (status, body) = get_json(booted.router.clone(), "/api/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({ "status": "unhealthy", "detail": "connection refused" })
    );

    // The router keeps serving and re-probes once the dependency recovers.
    probe.set_result(contract_router::probe::ProbeResult::healthy());
    let (status, _) = get_json(booted.router, "/api/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(probe.calls(), 2);
}

#[tokio::test]
async fn json_contract_binds_every_operation_once() {
    let handlers = HandlerSet::<AppState>::new()
        .register(GET_HEALTHZ, get_healthz)
        .register("getVersion", get_version);

    let booted = build(
        &file_only("two_operations.json"),
        "/api",
        handlers,
        state(StaticProbe::healthy("db")),
    )
    .unwrap();

    let mut operations: Vec<_> = booted.routes.iter().map(|r| r.operation.clone()).collect();
    operations.sort();
    assert_eq!(operations, vec!["getHealthz", "getVersion"]);

    let (status, body) = get_json(booted.router, "/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "2.0.0");
}

#[test]
fn missing_handler_fails_bootstrap() {
    let err = boot("two_operations.json", StaticProbe::healthy("db"))
        .err()
        .expect("binding must fail");

    assert_eq!(err.stage(), "binding-incomplete");
    assert!(matches!(
        err,
        StartupError::BindingIncomplete(BindingError::MissingHandlers(ref keys))
            if keys == &vec!["getVersion".to_string()]
    ));
}

#[test]
fn operation_without_responses_is_invalid() {
    let err = boot("missing_responses.yml", StaticProbe::healthy("db"))
        .err()
        .expect("validation must fail");

    assert_eq!(err.stage(), "spec-invalid");
    assert!(err.to_string().contains("operation declares no responses"));
}

#[test]
fn dangling_reference_is_invalid() {
    let err = boot("dangling_ref.yml", StaticProbe::healthy("db"))
        .err()
        .expect("validation must fail");

    assert_eq!(err.stage(), "spec-invalid");
    assert!(err.to_string().contains("#/components/schemas/Nowhere"));
}

#[test]
fn unparseable_contract_is_malformed() {
    let err = boot("malformed.yml", StaticProbe::healthy("db"))
        .err()
        .expect("parse must fail");

    assert_eq!(err.stage(), "spec-malformed");
}

#[test]
fn missing_fallback_file_is_unavailable() {
    let err = boot("does_not_exist.yml", StaticProbe::healthy("db"))
        .err()
        .expect("resolution must fail");

    assert_eq!(err.stage(), "spec-unavailable");
    assert!(err.to_string().contains("does_not_exist.yml"));
}

#[test]
fn bundled_contract_takes_precedence_over_file() {
    if BUNDLED_CONTRACT.is_empty() {
        return;
    }
    let config = Config {
        openapi_spec_path: fixture("does_not_exist.yml"),
        ..Config::default()
    };

    let booted = bootstrap(&config, Arc::new(StaticProbe::healthy("db"))).unwrap();
    assert_eq!(booted.routes.len(), 1);
}

#[test]
fn fallback_file_used_without_bundle() {
    if !BUNDLED_CONTRACT.is_empty() {
        return;
    }
    let config = Config {
        openapi_spec_path: fixture("healthz.yml"),
        ..Config::default()
    };

    let booted = bootstrap(&config, Arc::new(StaticProbe::healthy("db"))).unwrap();
    assert_eq!(booted.routes[0].path, "/api/healthz");
}

#[tokio::test]
async fn live_server_reports_refused_dependency() {
    // Grab a port nobody listens on.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let probe = TcpProbe::new(closed_addr.to_string(), Duration::from_secs(1));
    let booted = build(
        &file_only("healthz.yml"),
        "/api",
        handler_set(),
        AppState::new(Arc::new(probe)),
    )
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, booted.router).await.unwrap();
    });

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/api/healthz"))
        .header("Origin", "https://example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "unhealthy", "detail": "connection refused" })
    );
}
