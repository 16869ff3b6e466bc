//! Router tests against an in-process model

use api::{create_router, AppState, MeteredSink};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use feature_engine::NumericTable;
use inference_engine::{ForestConfig, InferenceEngine, PredictionSink};
use model_trainer::{train, TrainConfig};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use storage::{read_entries, MemoryLog, PredictionLog};
use tower::ServiceExt;

/// Three engines where sensor_1 rises towards end of life
fn training_table() -> NumericTable {
    let columns = ["engine_id", "cycle", "sensor_1", "sensor_2", "max_cycle", "RUL", "fail_soon"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = Vec::new();
    for engine in 1..=3 {
        for cycle in 1..=50 {
            let rul = 50.0 - cycle as f64;
            rows.push(vec![
                engine as f64,
                cycle as f64,
                20.0 - 0.2 * rul,
                ((engine + cycle) % 5) as f64,
                50.0,
                rul,
                if rul <= 30.0 { 1.0 } else { 0.0 },
            ]);
        }
    }
    NumericTable::new(columns, rows).unwrap()
}

fn engine(sink: Arc<dyn PredictionSink>) -> InferenceEngine {
    let config = TrainConfig {
        forest: ForestConfig {
            n_trees: 15,
            max_depth: 6,
            ..Default::default()
        },
        ..Default::default()
    };
    let outcome = train(&training_table(), &config).unwrap();
    InferenceEngine::new(outcome.bundle, sink)
}

fn app_with_memory_log() -> (Router, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::new());
    let state = AppState::new(engine(log.clone()));
    (create_router(Arc::new(state)), log)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_get_and_post() {
    let (app, log) = app_with_memory_log();

    for request in [get("/health"), post_json("/health", "")] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "ok", "model_loaded": true})
        );
    }
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_landing_page() {
    let (app, _) = app_with_memory_log();
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Walbrydge IoT Predictive Maintenance"));
    assert!(html.contains("POST /predict"));
    assert!(html.contains("href=\"/api/docs\""));
}

#[tokio::test]
async fn test_openapi_document() {
    let (app, _) = app_with_memory_log();
    let response = app.oneshot(get("/api/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = json_body(response).await;
    assert_eq!(doc["info"]["title"], "Walbrydge IoT Predictive Maintenance");
    for path in ["/health", "/predict", "/explain"] {
        assert!(doc["paths"][path].is_object(), "{path} missing");
    }
    let schemas = &doc["components"]["schemas"];
    for schema in ["FeatureRequest", "PredictionResult", "ExplanationResult", "HealthResponse"] {
        assert!(schemas[schema].is_object(), "{schema} missing");
    }
    assert_eq!(
        schemas["PredictionResult"]["required"],
        json!(["fail_probability", "fail_soon"])
    );
}

#[tokio::test]
async fn test_swagger_ui_points_at_document() {
    let (app, _) = app_with_memory_log();
    let response = app.oneshot(get("/api/docs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/openapi.json"));
}

#[tokio::test]
async fn test_predict_scores_and_logs() {
    let (app, log) = app_with_memory_log();
    let body = json!({"features": {"sensor_1": 19.5, "cycle": 48, "unknown": 3.0}}).to_string();

    let response = app.oneshot(post_json("/predict", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    let p = result["fail_probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(result["fail_soon"].as_u64().unwrap(), u64::from(p >= 0.5));
    assert_eq!(result.as_object().unwrap().len(), 2);

    let entries = log.recent(1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].feature("sensor_1"), Some(19.5));
    assert_eq!(entries[0].feature("sensor_2"), Some(0.0));
    assert_eq!(entries[0].feature("unknown"), None);
    assert_eq!(entries[0].input.len(), 4);
}

#[tokio::test]
async fn test_explain_shape() {
    let (app, log) = app_with_memory_log();
    let body = json!({"features": {"sensor_1": 12.0}}).to_string();

    let response = app.oneshot(post_json("/explain", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    assert_eq!(
        result["feature_names"],
        json!(["engine_id", "cycle", "sensor_1", "sensor_2"])
    );
    assert_eq!(result["shap_values"].as_array().unwrap().len(), 4);
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_are_client_errors() {
    let (app, log) = app_with_memory_log();

    let cases = [
        ("/predict", "{not json"),
        ("/predict", r#"{"features": {"sensor_1": "high"}}"#),
        ("/predict", r#"{"readings": {}}"#),
        ("/explain", r#"{"features": [1, 2]}"#),
    ];
    for (uri, body) in cases {
        let response = app.clone().oneshot(post_json(uri, body)).await.unwrap();
        assert!(response.status().is_client_error(), "{uri} {body}");
        let error = json_body(response).await;
        assert!(error["error"].is_string());
    }
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_metrics_disabled() {
    let (app, _) = app_with_memory_log();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_are_logged_once_each() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("predictions.jsonl");
    let sink = Arc::new(MeteredSink::new(PredictionLog::open(&path).unwrap()));
    let app = create_router(Arc::new(AppState::new(engine(sink))));

    let requests = 40;
    let handles: Vec<_> = (0..requests)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let body = json!({"features": {"sensor_1": i as f64}}).to_string();
                app.oneshot(post_json("/predict", &body)).await.unwrap().status()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), requests);

    let timestamps: HashSet<_> = entries.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps.len(), requests);

    let values: HashSet<i64> = entries
        .iter()
        .filter_map(|e| e.feature("sensor_1"))
        .map(|v| v as i64)
        .collect();
    assert_eq!(values.len(), requests);
}
