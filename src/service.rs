//! HTTP façade over the job machine.
//!
//! - `POST /input/:circuit`  JSON witness document → `200` (empty body) once
//!   the job is running; `409` busy, `404` unknown circuit, `400` wrong shape
//! - `GET  /status`          `{"status": "idle"|"busy"|"ready"|"failed", ...}`
//! - `GET  /health`          loaded circuits and their key digests
//!
//! Handlers never wait on a computation; they only take the job lock for a
//! state transition or a snapshot. A submission while busy is answered `409`
//! before the body is decoded.

#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api::{public_to_json, ProofJson};
use crate::groth16::ProofEngine;
use crate::job::{JobManager, SubmitError};
use crate::wtns::WitnessDocument;

/// Body of `GET /status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// `idle`, `busy`, `ready` or `failed`.
    pub status: String,
    /// Circuit of the current or last job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit: Option<String>,
    /// Id of the current or last job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<u64>,
    /// Acceptance time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// snarkjs-style proof when ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofJson>,
    /// Public signals as decimal strings when ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_data: Option<Vec<String>>,
    /// Failure message when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Whether this terminal status reports the submission a client made for
    /// `circuit` at `submitted_at`. `seen_job` is the id the client observed
    /// while its job was busy; when known it must match exactly, otherwise
    /// the circuit must match and the job must not predate the submission.
    pub fn is_result_of(
        &self,
        circuit: &str,
        submitted_at: DateTime<Utc>,
        seen_job: Option<u64>,
    ) -> bool {
        if self.circuit.as_deref() != Some(circuit) {
            return false;
        }
        match seen_job {
            Some(id) => self.job_id == Some(id),
            None => self.started_at.is_some_and(|t| t >= submitted_at),
        }
    }
}

/// One loaded circuit as listed by `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircuitSummary {
    /// Circuit identifier (zkey file stem).
    pub id: String,
    /// Number of wires, including the constant wire.
    pub n_vars: usize,
    /// Number of public signals.
    pub n_public: usize,
    /// Evaluation domain size.
    pub domain_size: usize,
    /// BLAKE3 digest of the key file, hex.
    pub digest: String,
}

/// Body of `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Loaded circuits, sorted by id.
    pub circuits: Vec<CircuitSummary>,
}

/// Build the router. `body_limit` caps submitted witness documents in bytes.
pub fn router<E: ProofEngine>(jobs: Arc<JobManager<E>>, body_limit: usize) -> Router {
    Router::new()
        .route("/input/:circuit", post(submit::<E>))
        .route("/status", get(status::<E>))
        .route("/health", get(health::<E>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(jobs)
        .layer(TraceLayer::new_for_http())
}

fn refuse(circuit: &str, e: SubmitError) -> (StatusCode, String) {
    let code = match &e {
        SubmitError::Busy { .. } => StatusCode::CONFLICT,
        SubmitError::UnknownCircuit(_) => StatusCode::NOT_FOUND,
        SubmitError::Rejected(_) => StatusCode::BAD_REQUEST,
        SubmitError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(circuit = %circuit, status = code.as_u16(), error = %e, "submission refused");
    (code, e.to_string())
}

async fn submit<E: ProofEngine>(
    State(jobs): State<Arc<JobManager<E>>>,
    Path(circuit): Path<String>,
    body: Result<Json<WitnessDocument>, JsonRejection>,
) -> Result<StatusCode, (StatusCode, String)> {
    // `submit` checks again under the lock; this only keeps a bad body from
    // masking the conflict.
    if let Some(job_id) = jobs.running_job() {
        return Err(refuse(&circuit, SubmitError::Busy { job_id }));
    }
    let Json(doc) = body.map_err(|rejection| {
        warn!(circuit = %circuit, status = rejection.status().as_u16(), "unreadable witness body");
        (rejection.status(), rejection.body_text())
    })?;
    jobs.submit(&circuit, doc)
        .map(|_| StatusCode::OK)
        .map_err(|e| refuse(&circuit, e))
}

async fn status<E: ProofEngine>(State(jobs): State<Arc<JobManager<E>>>) -> Json<StatusResponse> {
    let snap = jobs.snapshot();
    let job = snap.job.as_ref();
    Json(StatusResponse {
        status: snap.status.wire_name().to_string(),
        circuit: job.map(|j| j.circuit.clone()),
        job_id: job.map(|j| j.id),
        started_at: job.map(|j| j.started_at),
        finished_at: job.and_then(|j| j.finished_at),
        proof: snap.result.as_ref().map(|r| ProofJson::from(&r.proof)),
        pub_data: snap.result.as_ref().map(|r| public_to_json(&r.public_inputs)),
        error: snap.error.as_ref().map(|e| e.to_string()),
    })
}

async fn health<E: ProofEngine>(State(jobs): State<Arc<JobManager<E>>>) -> Json<HealthResponse> {
    let circuits = jobs
        .registry()
        .iter()
        .map(|k| CircuitSummary {
            id: k.circuit_id.clone(),
            n_vars: k.n_vars,
            n_public: k.n_public,
            domain_size: k.domain_size(),
            digest: k.digest_hex(),
        })
        .collect();
    Json(HealthResponse {
        status: "ok".into(),
        circuits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_zkey::{example_circuit, example_witness, generate_dev_zkey};
    use crate::groth16::{ComputationError, Groth16Prover, ProofOutput};
    use crate::registry::CircuitRegistry;
    use crate::verifier::verify_proof;
    use crate::wtns::Witness;
    use crate::zkey::{parse_proving_key, LoadOptions, ProvingKey};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    fn registry() -> CircuitRegistry {
        let bytes = generate_dev_zkey(&example_circuit(), 17).unwrap();
        let mut reg = CircuitRegistry::new();
        reg.insert(parse_proving_key(&bytes, "example", LoadOptions::default()).unwrap())
            .unwrap();
        reg
    }

    fn app() -> (Router, Arc<JobManager>) {
        let jobs = Arc::new(JobManager::new(registry(), Groth16Prover::default()));
        (router(Arc::clone(&jobs), 1 << 20), jobs)
    }

    struct GatedEngine(Mutex<Receiver<()>>);

    impl ProofEngine for GatedEngine {
        fn prove(&self, key: &ProvingKey, witness: &Witness) -> Result<ProofOutput, ComputationError> {
            self.0.lock().unwrap().recv().unwrap();
            Groth16Prover::default().prove(key, witness)
        }
    }

    fn post_input(circuit: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/input/{circuit}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn get_json(app: &Router, uri: &str) -> Value {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_terminal(app: &Router) -> Value {
        for _ in 0..500 {
            let v = get_json(app, "/status").await;
            if v["status"] == "ready" || v["status"] == "failed" {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job did not finish");
    }

    fn witness_json() -> Value {
        json!({"witness": ["1", "2", "3", "4"]})
    }

    #[tokio::test]
    async fn idle_status() {
        let (app, _) = app();
        let v = get_json(&app, "/status").await;
        assert_eq!(v, json!({"status": "idle"}));
    }

    #[tokio::test]
    async fn submit_then_poll_until_ready() {
        let (app, jobs) = app();
        let resp = app.clone().oneshot(post_input("example", witness_json())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());

        let v = wait_terminal(&app).await;
        assert_eq!(v["status"], "ready");
        assert_eq!(v["circuit"], "example");
        assert_eq!(v["pubData"], json!(["2"]));
        assert_eq!(v["proof"]["protocol"], "groth16");

        let doc: ProofJson = serde_json::from_value(v["proof"].clone()).unwrap();
        let key = jobs.registry().get("example").unwrap();
        verify_proof(key.verifying_key(), &doc.to_proof().unwrap(), &example_witness()[1..2]).unwrap();

        // status polls are idempotent once terminal
        assert_eq!(get_json(&app, "/status").await, v);
    }

    #[tokio::test]
    async fn conflict_while_busy() {
        let (tx, rx): (Sender<()>, Receiver<()>) = channel();
        let jobs = Arc::new(JobManager::new(registry(), GatedEngine(Mutex::new(rx))));
        let app = router(Arc::clone(&jobs), 1 << 20);

        let first = app.clone().oneshot(post_input("example", witness_json())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(get_json(&app, "/status").await["status"], "busy");

        let second = app.clone().oneshot(post_input("example", json!(["junk"]))).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        tx.send(()).unwrap();
        assert_eq!(wait_terminal(&app).await["status"], "ready");
    }

    #[tokio::test]
    async fn conflict_while_busy_even_for_unreadable_bodies() {
        let (tx, rx): (Sender<()>, Receiver<()>) = channel();
        let jobs = Arc::new(JobManager::new(registry(), GatedEngine(Mutex::new(rx))));
        let app = router(Arc::clone(&jobs), 1 << 20);

        let first = app.clone().oneshot(post_input("example", witness_json())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let malformed = Request::builder()
            .method("POST")
            .uri("/input/example")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.clone().oneshot(malformed).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let untyped = Request::builder()
            .method("POST")
            .uri("/input/example")
            .body(Body::from(witness_json().to_string()))
            .unwrap();
        let resp = app.clone().oneshot(untyped).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        tx.send(()).unwrap();
        assert_eq!(wait_terminal(&app).await["status"], "ready");

        // once idle, the same bodies are rejected on their own merits
        let untyped = Request::builder()
            .method("POST")
            .uri("/input/example")
            .body(Body::from(witness_json().to_string()))
            .unwrap();
        let resp = app.clone().oneshot(untyped).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn rejections_map_to_status_codes() {
        let (app, _) = app();
        let unknown = app.clone().oneshot(post_input("nope", witness_json())).await.unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let short = app.clone().oneshot(post_input("example", json!(["1", "2"]))).await.unwrap();
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);

        let not_json = Request::builder()
            .method("POST")
            .uri("/input/example")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.clone().oneshot(not_json).await.unwrap();
        assert!(resp.status().is_client_error());

        assert_eq!(get_json(&app, "/status").await["status"], "idle");
    }

    #[tokio::test]
    async fn failed_job_reports_error() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post_input("example", json!(["1", "2", "3", "5"])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = wait_terminal(&app).await;
        assert_eq!(v["status"], "failed");
        assert!(v["error"].as_str().unwrap().contains("constraint 0"));
        assert!(v.get("proof").is_none());
    }

    #[test]
    fn terminal_status_is_matched_to_its_submission() {
        let t0: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let later = t0 + chrono::Duration::seconds(5);
        let status = StatusResponse {
            status: "ready".into(),
            circuit: Some("example".into()),
            job_id: Some(7),
            started_at: Some(later),
            finished_at: Some(later),
            proof: None,
            pub_data: None,
            error: None,
        };
        assert!(status.is_result_of("example", t0, None));
        assert!(status.is_result_of("example", t0, Some(7)));
        // another client's job slipped in between polls
        assert!(!status.is_result_of("example", t0, Some(6)));
        assert!(!status.is_result_of("square", t0, None));
        assert!(!status.is_result_of("example", later + chrono::Duration::seconds(1), None));

        let idle = StatusResponse {
            status: "idle".into(),
            circuit: None,
            job_id: None,
            started_at: None,
            finished_at: None,
            proof: None,
            pub_data: None,
            error: None,
        };
        assert!(!idle.is_result_of("example", t0, None));
    }

    #[tokio::test]
    async fn health_lists_circuits() {
        let (app, _) = app();
        let v = get_json(&app, "/health").await;
        assert_eq!(v["status"], "ok");
        assert_eq!(v["circuits"][0]["id"], "example");
        assert_eq!(v["circuits"][0]["n_vars"], 4);
        assert_eq!(v["circuits"][0]["digest"].as_str().unwrap().len(), 64);
    }
}
