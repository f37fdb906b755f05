//! Standalone CLI verifier
//!
//! ```text
//! verifier <circuit.zkey> <proof.json> <public.json>
//! ```
//!
//! Exits non-zero if the pairing check fails.

#![forbid(unsafe_code)]

use std::{env, path::Path};

use zkproofd::api;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [zkey, proof, public] = args.as_slice() else {
        anyhow::bail!("usage: verifier <circuit.zkey> <proof.json> <public.json>");
    };
    api::verify_files(Path::new(zkey), Path::new(proof), Path::new(public))?;
    println!("OK");
    Ok(())
}
