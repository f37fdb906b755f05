//! Standalone CLI prover
//!
//! ```text
//! prover <circuit.zkey> <witness.wtns> <proof.json> <public.json> [--no-blinding] [--bin <proof.bin>]
//! ```
//!
//! Writes the snarkjs-style proof document and the public signals array.
//! `--bin` additionally writes the compact arkworks proof file.

#![forbid(unsafe_code)]

use std::{env, path::Path, time::Instant};

use zkproofd::api::{self, io};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let blinding = !args.iter().any(|a| a == "--no-blinding");
    let bin_out = parse_flag(&args, "--bin");

    let mut positional = Vec::new();
    let mut it = args.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--no-blinding" => {}
            "--bin" => {
                it.next();
            }
            _ => positional.push(a.as_str()),
        }
    }
    let [zkey, wtns, proof_out, public_out] = positional[..] else {
        anyhow::bail!(
            "usage: prover <circuit.zkey> <witness.wtns> <proof.json> <public.json> [--no-blinding] [--bin <proof.bin>]"
        );
    };

    let t0 = Instant::now();
    let (key, out) = api::prove_files(Path::new(zkey), Path::new(wtns), blinding)?;
    let elapsed = t0.elapsed();

    io::write_proof_json(Path::new(proof_out), &out.proof)?;
    io::write_public_json(Path::new(public_out), &out.public_inputs)?;
    if let Some(p) = bin_out.as_deref() {
        io::write_proof_bin(Path::new(p), &out.proof)?;
    }

    eprintln!(
        "✓ proof for `{}`: n_vars={}, n_public={}, domain={}, key={}",
        key.circuit_id,
        key.n_vars,
        key.n_public,
        key.domain_size(),
        &key.digest_hex()[..16],
    );
    if !blinding {
        eprintln!("  note: blinding disabled (r = s = 0); proof is deterministic");
    }
    eprintln!("  wrote {proof_out} and {public_out} in {:.2?}", elapsed);
    Ok(())
}
