//! Crate root: public surface, core aliases, and system-wide invariants
//!
//! `zkproofd` computes Groth16 proofs over BN254 for circuits whose proving
//! keys are loaded at startup, and exposes a single-slot job server that
//! accepts witnesses and lets clients poll for the result.
//!
//! ## Layers (leaves first)
//!
//! - **Artifacts** (`binfile`, `zkey`, `wtns`, `encoding`): bounded parsing of
//!   the `zkey`/`wtns` section-stream containers and the JSON witness
//!   document. Every length is checked before it is used; every field element
//!   is canonical and range-checked, never reduced.
//! - **Pipeline** (`domain`, `groth16`, `verifier`): pure computation from a
//!   key and a witness to a proof, plus the pairing check.
//! - **Jobs** (`registry`, `job`): at most one computation in flight, run on
//!   its own thread; status snapshots never block on it.
//! - **Surface** (`service`, `api`, `config`): axum router, proof JSON and file
//!   helpers, and environment/flag configuration for the binaries.
//!
//! ## Invariants
//!
//! - **Field & curve.** Scalars are `ark_bn254::Fr` (`F`); points are BN254
//!   `G1Affine`/`G2Affine`. All arithmetic comes from arkworks; the crate forbids
//!   `unsafe`.
//! - **Domain.** `Z_H(X) = X^N − 1` with `N` a power of two; the quotient is
//!   evaluated on the coset `g·H` where `Z_H` is a non-zero constant.
//! - **Keys are immutable.** A `ProvingKey` is validated once and shared as
//!   `Arc<ProvingKey>`; the job record is the only mutable shared state.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Integer and field-element encodings (decimal/hex text, LE bytes).
pub mod encoding;
/// Section-stream container reader/writer shared by `zkey` and `wtns`.
pub mod binfile;
/// Evaluation domain & radix-2 transforms (vanishing polynomial X^N − 1).
pub mod domain;
/// Proving-key loading and validation.
pub mod zkey;
/// Binary witnesses and the JSON witness document.
pub mod wtns;
/// Groth16 proving pipeline and the `ProofEngine` seam.
pub mod groth16;
/// Groth16 pairing check.
pub mod verifier;
/// Loaded proving keys by circuit identifier.
pub mod registry;
/// Single-slot job state machine.
pub mod job;
/// axum router for submission and status polling.
pub mod service;
/// Proof JSON, public signals, and one-shot file helpers.
pub mod api;
/// Server configuration and tracing setup.
pub mod config;
/// Deterministic development keys (publicly known toxic waste).
#[cfg(any(test, feature = "dev-zkey"))]
pub mod dev_zkey;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Scalar field used across the crate.
pub type F = ark_bn254::Fr;

pub use crate::binfile::ArtifactError;
pub use crate::groth16::{ComputationError, Groth16Prover, Proof, ProofEngine, ProofOutput};
pub use crate::job::{JobManager, JobStatus, SubmitError};
pub use crate::registry::CircuitRegistry;
pub use crate::wtns::{Witness, WitnessDocument};
pub use crate::zkey::{LoadOptions, ProvingKey, VerifyingKey};
