//! Single-Slot Job State Machine
//!
//! ```text
//!   Idle ──submit──▶ Running ──ok──▶ Ready
//!                       │                │
//!                       └──err/panic──▶ Failed
//!   Ready | Failed ──submit──▶ Running   (previous result discarded)
//! ```
//!
//! One `std::sync::Mutex` guards the job record and is held only for state
//! transitions, never while proving. The proof itself runs on a dedicated,
//! named `std::thread`; `submit` returns as soon as the state is `Running`.
//! A poisoned lock is recovered rather than propagated, since every write
//! leaves the record in a valid state.

#![forbid(unsafe_code)]

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::binfile::ArtifactError;
use crate::groth16::{ComputationError, Groth16Prover, ProofEngine, ProofOutput};
use crate::registry::CircuitRegistry;
use crate::wtns::{check_witness_shape, WitnessDocument};
use crate::zkey::ProvingKey;

/// Lifecycle state of the job slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Nothing submitted yet.
    Idle,
    /// A proof is being computed.
    Running,
    /// The last job produced a proof.
    Ready,
    /// The last job ended with an error.
    Failed,
}

impl JobStatus {
    /// Name used on the wire (`Running` is reported as `busy`).
    pub fn wire_name(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "busy",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        }
    }
}

/// Why an accepted job ended in `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Witness values could not be converted to field elements.
    #[error("invalid witness: {0}")]
    Artifact(#[from] ArtifactError),
    /// The proving pipeline rejected the witness.
    #[error(transparent)]
    Computation(#[from] ComputationError),
    /// The worker thread could not be started.
    #[error("could not start proving thread: {0}")]
    Spawn(String),
    /// The engine panicked; carries the panic message.
    #[error("proving thread panicked: {0}")]
    Panicked(String),
}

/// Why a submission was refused. Only `Spawn` changes the state.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Another job holds the slot.
    #[error("a proof is already being computed (job {job_id})")]
    Busy {
        /// Id of the running job.
        job_id: u64,
    },
    /// No proving key is loaded under this identifier.
    #[error("unknown circuit `{0}`")]
    UnknownCircuit(String),
    /// The document does not have the key's wire count.
    #[error("rejected witness: {0}")]
    Rejected(ArtifactError),
    /// The OS refused the worker thread; the slot is left `Failed`.
    #[error("could not start proving thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Identity and timing of the current (or last) job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobInfo {
    /// Monotonic job id, starting at 1.
    pub id: u64,
    /// Circuit identifier the witness was submitted for.
    pub circuit: String,
    /// When the job was accepted.
    pub started_at: DateTime<Utc>,
    /// When the job reached `Ready` or `Failed`.
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum JobState {
    Idle,
    Running(JobInfo),
    Ready(JobInfo, Arc<ProofOutput>),
    Failed(JobInfo, Arc<JobError>),
}

/// Point-in-time copy of the job record.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Slot state.
    pub status: JobStatus,
    /// Present once anything has been accepted.
    pub job: Option<JobInfo>,
    /// Proof and public inputs when `Ready`.
    pub result: Option<Arc<ProofOutput>>,
    /// Failure cause when `Failed`.
    pub error: Option<Arc<JobError>>,
}

/// Owns the loaded keys, the proving engine and the single job slot.
pub struct JobManager<E: ProofEngine = Groth16Prover> {
    registry: Arc<CircuitRegistry>,
    engine: Arc<E>,
    state: Arc<Mutex<JobState>>,
    next_id: AtomicU64,
}

impl<E: ProofEngine> JobManager<E> {
    /// Start `Idle` with `registry` as the set of provable circuits.
    pub fn new(registry: CircuitRegistry, engine: E) -> Self {
        Self {
            registry: Arc::new(registry),
            engine: Arc::new(engine),
            state: Arc::new(Mutex::new(JobState::Idle)),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loaded proving keys.
    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    /// Loaded circuit identifiers, sorted.
    pub fn circuits(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Id of the job currently computing, if any.
    pub fn running_job(&self) -> Option<u64> {
        match &*self.lock() {
            JobState::Running(info) => Some(info.id),
            _ => None,
        }
    }

    /// Accept a witness for `circuit` and start proving in the background.
    ///
    /// Checks, in order: busy, known circuit, element count. Element values
    /// are validated inside the job, so a bad value ends in `Failed`.
    pub fn submit(&self, circuit: &str, doc: WitnessDocument) -> Result<u64, SubmitError> {
        let mut state = self.lock();
        if let JobState::Running(info) = &*state {
            return Err(SubmitError::Busy { job_id: info.id });
        }
        let key = self
            .registry
            .get(circuit)
            .ok_or_else(|| SubmitError::UnknownCircuit(circuit.to_string()))?;
        check_witness_shape(&doc, key.n_vars).map_err(SubmitError::Rejected)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = JobInfo {
            id,
            circuit: circuit.to_string(),
            started_at: Utc::now(),
            finished_at: None,
        };
        *state = JobState::Running(info.clone());
        drop(state);
        info!(job = id, circuit, "job accepted");

        let engine = Arc::clone(&self.engine);
        let slot = Arc::clone(&self.state);
        let job = info.clone();
        let spawned = thread::Builder::new()
            .name(format!("proof-job-{id}"))
            .spawn(move || run_job(engine.as_ref(), &key, doc, job, &slot));

        if let Err(e) = spawned {
            error!(job = id, error = %e, "failed to spawn proving thread");
            let mut info = info;
            info.finished_at = Some(Utc::now());
            *self.lock() = JobState::Failed(info, Arc::new(JobError::Spawn(e.to_string())));
            return Err(SubmitError::Spawn(e));
        }
        Ok(id)
    }

    /// Current state; never waits on the computation.
    pub fn snapshot(&self) -> Snapshot {
        match &*self.lock() {
            JobState::Idle => Snapshot {
                status: JobStatus::Idle,
                job: None,
                result: None,
                error: None,
            },
            JobState::Running(info) => Snapshot {
                status: JobStatus::Running,
                job: Some(info.clone()),
                result: None,
                error: None,
            },
            JobState::Ready(info, out) => Snapshot {
                status: JobStatus::Ready,
                job: Some(info.clone()),
                result: Some(Arc::clone(out)),
                error: None,
            },
            JobState::Failed(info, err) => Snapshot {
                status: JobStatus::Failed,
                job: Some(info.clone()),
                result: None,
                error: Some(Arc::clone(err)),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_job<E: ProofEngine>(
    engine: &E,
    key: &ProvingKey,
    doc: WitnessDocument,
    mut info: JobInfo,
    slot: &Mutex<JobState>,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<ProofOutput, JobError> {
        let witness = doc.to_witness(key.n_vars)?;
        Ok(engine.prove(key, &witness)?)
    }))
    .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))));

    let finished = Utc::now();
    info.finished_at = Some(finished);
    let elapsed_ms = (finished - info.started_at).num_milliseconds();
    let next = match outcome {
        Ok(out) => {
            info!(job = info.id, circuit = %info.circuit, elapsed_ms, "proof ready");
            JobState::Ready(info, Arc::new(out))
        }
        Err(e) => {
            warn!(job = info.id, circuit = %info.circuit, elapsed_ms, error = %e, "job failed");
            JobState::Failed(info, Arc::new(e))
        }
    };
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = next;
}
