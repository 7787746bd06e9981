//! End-to-end rollback flow.
//!
//! Runs the orchestrator with the real HTTP probe and directory client
//! against an in-process server that plays both the deployed service and
//! the Deployment Directory API.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::json;

use rollwatch_directory::DirectoryClient;
use rollwatch_health::{HealthWindowSampler, HttpProbe, Thresholds};
use rollwatch_rollout::*;

#[derive(Clone)]
struct Platform {
    base: String,
    /// Deployment slugs whose /health answers 503.
    broken: Arc<Mutex<HashSet<String>>>,
    promoted: Arc<Mutex<Vec<String>>>,
    promote_status: Option<StatusCode>,
    deployments: serde_json::Value,
}

async fn health(State(platform): State<Platform>, Path(slug): Path<String>) -> impl IntoResponse {
    if platform.broken.lock().unwrap().contains(&slug) {
        let body = axum::Json(json!({ "status": "unhealthy" }));
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    } else {
        axum::Json(json!({ "status": "healthy" })).into_response()
    }
}

async fn list(State(platform): State<Platform>) -> impl IntoResponse {
    axum::Json(json!({ "deployments": platform.deployments }))
}

async fn promote(State(platform): State<Platform>, Path(id): Path<String>) -> impl IntoResponse {
    platform.promoted.lock().unwrap().push(id.clone());
    if let Some(status) = platform.promote_status {
        return (status, "promotion rejected").into_response();
    }
    axum::Json(json!({
        "deployment": {
            "id": id,
            "createdAt": 200,
            "state": "READY",
            "readyState": "READY",
            "target": "production",
            "url": format!("{}/{}", platform.base, id),
        }
    }))
    .into_response()
}

fn record(base: &str, id: &str, created_at: u64, state: &str) -> serde_json::Value {
    json!({
        "uid": id,
        "createdAt": created_at,
        "state": state,
        "readyState": state,
        "target": "production",
        "url": format!("{base}/{id}"),
    })
}

/// Start the fake platform. Returns its base URL and shared state.
async fn start(
    broken: &[&str],
    promote_status: Option<StatusCode>,
    history: impl FnOnce(&str) -> serde_json::Value,
) -> Platform {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let platform = Platform {
        deployments: history(&base),
        base,
        broken: Arc::new(Mutex::new(broken.iter().map(|s| s.to_string()).collect())),
        promoted: Arc::default(),
        promote_status,
    };
    let router = Router::new()
        .route("/{slug}/health", get(health))
        .route("/api/deployments", get(list))
        .route("/api/deployments/{id}/promote", post(promote))
        .with_state(platform.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    platform
}

fn standard_history(base: &str) -> serde_json::Value {
    json!([
        record(base, "dpl_new", 400, "READY"),
        record(base, "dpl_good", 300, "READY"),
        record(base, "dpl_old", 200, "READY"),
        record(base, "dpl_bad", 100, "ERROR"),
    ])
}

#[derive(Default)]
struct Collected(Mutex<Vec<bool>>);

impl NotificationSink for Collected {
    async fn send(&self, report: Report<'_>) {
        let ok = match report {
            Report::Health(summary) => summary.healthy(),
            Report::Rollback(result) => result.executed(),
        };
        self.0.lock().unwrap().push(ok);
    }
}

fn policy() -> RollbackPolicy {
    RollbackPolicy {
        monitor_window: Duration::from_millis(300),
        interval: Duration::from_millis(50),
        settle_delay: Duration::from_millis(10),
        verify_window: Duration::from_millis(200),
        history_limit: 10,
        auto_rollback: true,
    }
}

fn orchestrator(
    platform: &Platform,
) -> RollbackOrchestrator<HttpProbe, DirectoryClient, Collected> {
    let probe = HttpProbe::new("/health", Duration::from_secs(5), 5_000).unwrap();
    let directory = DirectoryClient::new(
        &format!("{}/api", platform.base),
        "prj_shop",
        "token",
        Duration::from_secs(5),
        1,
    )
    .unwrap();
    RollbackOrchestrator::new(
        HealthWindowSampler::new(probe, Thresholds::default()),
        directory,
        Collected::default(),
        policy(),
    )
}

#[tokio::test]
async fn healthy_production_is_left_alone() {
    let platform = start(&[], None, standard_history).await;
    let orch = orchestrator(&platform);

    let outcome = orch
        .monitor_and_rollback(&format!("{}/prod", platform.base))
        .await;

    assert!(outcome.success());
    assert!(outcome.rollback().is_none());
    assert!(outcome.summary().metrics().total_checks >= 1);
    assert!(platform.promoted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn broken_production_is_rolled_back_and_verified() {
    let platform = start(&["prod"], None, standard_history).await;
    let orch = orchestrator(&platform);

    let outcome = orch
        .monitor_and_rollback(&format!("{}/prod", platform.base))
        .await;

    let rollback = outcome.rollback().expect("rollback attempted");
    assert!(rollback.success(), "steps: {:?}", rollback.steps());
    assert_eq!(*platform.promoted.lock().unwrap(), vec!["dpl_good"]);
    assert_eq!(
        rollback.verification().unwrap().url(),
        format!("{}/dpl_good", platform.base)
    );
    assert!(
        outcome
            .summary()
            .issues()
            .iter()
            .any(|i| i.message == "Server error: HTTP 503")
    );
    assert_eq!(*orch.notifier().0.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn rollback_target_also_broken_reports_failure() {
    let platform = start(&["prod", "dpl_good"], None, standard_history).await;
    let orch = orchestrator(&platform);

    let outcome = orch
        .monitor_and_rollback(&format!("{}/prod", platform.base))
        .await;

    let rollback = outcome.rollback().unwrap();
    assert!(!outcome.success());
    assert!(rollback.executed());
    assert_eq!(rollback.steps().len(), 5);
    assert_eq!(rollback.phase(), RollbackPhase::Failed);
    assert_eq!(rollback.failed_at(), Some(RollbackPhase::VerifyingHealth));
}

#[tokio::test]
async fn rejected_promotion_is_not_retried() {
    let platform = start(&["prod"], Some(StatusCode::FORBIDDEN), standard_history).await;
    let orch = orchestrator(&platform);

    let result = orch
        .perform_rollback(
            RollbackReason::Manual,
            Vec::new(),
            &format!("{}/prod", platform.base),
        )
        .await;

    assert!(!result.success());
    assert!(!result.executed());
    assert_eq!(platform.promoted.lock().unwrap().len(), 1);
    assert!(matches!(
        result.failure(),
        Some(RollbackFailure::PromotionFailed { status: Some(403), .. })
    ));
    assert!(result.steps()[2].outcome.to_string().starts_with("Failed: "));
}

#[tokio::test]
async fn unreachable_directory_looks_like_empty_history() {
    // Fetch failures and an empty project both surface as "no history".
    let platform = start(&["prod"], None, |_| json!([])).await;
    let orch = orchestrator(&platform);
    let empty = orch
        .perform_rollback(RollbackReason::Manual, Vec::new(), &platform.base)
        .await;

    let probe = HttpProbe::new("/health", Duration::from_secs(1), 5_000).unwrap();
    let unreachable = DirectoryClient::new(
        "http://127.0.0.1:9/api",
        "prj_shop",
        "token",
        Duration::from_secs(1),
        1,
    )
    .unwrap();
    let orch = RollbackOrchestrator::new(
        HealthWindowSampler::new(probe, Thresholds::default()),
        unreachable,
        Collected::default(),
        policy(),
    );
    let failed = orch
        .perform_rollback(RollbackReason::Manual, Vec::new(), &platform.base)
        .await;

    assert_eq!(empty.failure(), Some(&RollbackFailure::NoHistoryAvailable));
    assert_eq!(empty.failure(), failed.failure());
    assert_eq!(empty.steps(), failed.steps());
}
