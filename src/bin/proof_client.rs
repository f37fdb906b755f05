//! proof_client: submit a witness to a proof server and poll for the result.
//!
//! ```text
//! proof_client <server-url> <circuit> <witness.json>
//!              [--proof <proof.json>] [--public <public.json>]
//!              [--interval-ms 500] [--retries 20]
//! ```
//!
//! A `409` on submission means another job holds the slot: the client waits
//! for it to finish and resubmits, up to `--retries` times. A `failed` job is
//! reported and the client exits non-zero; it is never resubmitted. A result
//! that belongs to someone else's later submission is reported as superseded.

#![forbid(unsafe_code)]

use std::{env, path::Path, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{info, warn};

use zkproofd::{
    api::io,
    config::{init_tracing, LogFormat},
    service::StatusResponse,
    WitnessDocument,
};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

async fn fetch_status(http: &reqwest::Client, base: &str) -> anyhow::Result<StatusResponse> {
    let resp = http.get(format!("{base}/status")).send().await?.error_for_status()?;
    Ok(resp.json().await?)
}

async fn wait_until_not_busy(
    http: &reqwest::Client,
    base: &str,
    interval: Duration,
) -> anyhow::Result<StatusResponse> {
    loop {
        let s = fetch_status(http, base).await?;
        if s.status != "busy" {
            return Ok(s);
        }
        tokio::time::sleep(interval).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("proof_client=info", LogFormat::Compact);

    let args: Vec<String> = env::args().skip(1).collect();
    let positional: Vec<&String> = {
        let mut out = Vec::new();
        let mut it = args.iter();
        while let Some(a) = it.next() {
            if a.starts_with("--") {
                it.next();
            } else {
                out.push(a);
            }
        }
        out
    };
    let [base, circuit, witness_path] = positional[..] else {
        anyhow::bail!(
            "usage: proof_client <server-url> <circuit> <witness.json> [--proof p.json] [--public s.json] [--interval-ms N] [--retries N]"
        );
    };
    let base = base.trim_end_matches('/');
    let interval = Duration::from_millis(
        parse_flag(&args, "--interval-ms")
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("--interval-ms")?
            .unwrap_or(500),
    );
    let retries: u32 = parse_flag(&args, "--retries")
        .map(|s| s.parse::<u32>())
        .transpose()
        .context("--retries")?
        .unwrap_or(20);

    let text = std::fs::read_to_string(witness_path)
        .with_context(|| format!("read {witness_path}"))?;
    let doc: WitnessDocument =
        serde_json::from_str(&text).with_context(|| format!("parse {witness_path}"))?;

    let http = reqwest::Client::new();
    let url = format!("{base}/input/{circuit}");
    let mut attempt = 0;
    let submitted_at: DateTime<Utc> = loop {
        let sent_at = Utc::now();
        let resp = http.post(&url).json(&doc).send().await?;
        match resp.status() {
            StatusCode::OK => break sent_at,
            StatusCode::CONFLICT if attempt < retries => {
                attempt += 1;
                warn!(attempt, "server busy; waiting for the running job");
                wait_until_not_busy(&http, base, interval).await?;
            }
            code => {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("submission refused ({code}): {body}");
            }
        }
    };
    info!(circuit = %circuit, "witness accepted; polling");

    let mut seen_job = None;
    let status = loop {
        let s = fetch_status(&http, base).await?;
        if s.status != "busy" {
            break s;
        }
        seen_job = seen_job.or(s.job_id);
        tokio::time::sleep(interval).await;
    };
    if !status.is_result_of(circuit, submitted_at, seen_job) {
        anyhow::bail!(
            "result superseded: server now reports job {:?} for circuit {:?}",
            status.job_id,
            status.circuit
        );
    }
    match status.status.as_str() {
        "ready" => {
            let proof = status
                .proof
                .context("ready status without a proof")?
                .to_proof()?;
            let public = zkproofd::api::public_from_json(&status.pub_data.unwrap_or_default())?;
            match parse_flag(&args, "--proof") {
                Some(p) => io::write_proof_json(Path::new(&p), &proof)?,
                None => println!("{}", serde_json::to_string_pretty(&zkproofd::api::ProofJson::from(&proof))?),
            }
            match parse_flag(&args, "--public") {
                Some(p) => io::write_public_json(Path::new(&p), &public)?,
                None => println!("{}", serde_json::to_string(&zkproofd::api::public_to_json(&public))?),
            }
            info!("proof ready");
            Ok(())
        }
        "failed" => anyhow::bail!(
            "job failed: {}",
            status.error.unwrap_or_else(|| "unknown error".into())
        ),
        other => anyhow::bail!("unexpected status {other:?} after submission"),
    }
}
