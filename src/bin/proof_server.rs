//! proof_server: HTTP job server for Groth16 proofs.
//!
//! Endpoints:
//! - POST /input/:circuit   JSON witness (`{"witness": [...]}` or bare array)
//!   -> 200 (empty) | 409 busy | 404 unknown circuit | 400 bad shape
//! - GET  /status           {"status": "idle"|"busy"|"ready"|"failed", ...}
//! - GET  /health           loaded circuits and key digests
//!
//! Configuration: see `zkproofd::config` (`PROOFD_*` variables and flags).
//! Keys are loaded once at startup; any unloadable key aborts the process.

#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use zkproofd::{
    config::{init_tracing, ServerConfig},
    service, CircuitRegistry, Groth16Prover, JobManager, LoadOptions,
};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ServerConfig::from_process()?;
    init_tracing("zkproofd=info,proof_server=info,tower_http=info", cfg.log_format);

    info!(keys = cfg.zkeys.len(), strict = cfg.strict_keys, "loading proving keys");
    let registry = CircuitRegistry::load_paths(
        &cfg.zkeys,
        LoadOptions {
            subgroup_check_tables: cfg.strict_keys,
        },
    )?;
    anyhow::ensure!(!registry.is_empty(), "no proving keys loaded");
    info!(circuits = registry.len(), "proving keys ready");
    if !cfg.blinding {
        warn!("blinding disabled: proofs are deterministic and not zero-knowledge");
    }

    let jobs = Arc::new(JobManager::new(
        registry,
        Groth16Prover {
            blinding: cfg.blinding,
        },
    ));
    let app = service::router(Arc::clone(&jobs), cfg.body_limit);

    let listener = TcpListener::bind(cfg.addr).await?;
    info!(addr = %cfg.addr, circuits = ?jobs.circuits(), "proof server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
