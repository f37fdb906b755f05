//! Generate a development proving key and witness (NOT FOR PRODUCTION)
//!
//! ```text
//! generate_dev_zkey [--out-dir .] [--seed 42] [--circuit example|power] [--steps 8]
//! ```
//!
//! Writes `<name>.zkey`, `<name>.wtns` and `<name>.input.json` (the JSON
//! witness document accepted by `POST /input/<name>`).

use anyhow::Result;
use std::path::PathBuf;
use zkproofd::{
    dev_zkey::{example_circuit, example_witness, generate_dev_zkey, power_circuit, power_witness},
    wtns::{encode_witness, WitnessDocument},
};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let flag = |name: &str| {
        args.iter()
            .position(|s| s == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let out_dir = flag("--out-dir").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let seed: u64 = flag("--seed").and_then(|s| s.parse().ok()).unwrap_or(42);
    let steps: usize = flag("--steps").and_then(|s| s.parse().ok()).unwrap_or(8);
    let circuit = flag("--circuit").unwrap_or_else(|| "example".into());

    let (name, r1cs, witness) = match circuit.as_str() {
        "example" => ("example", example_circuit(), example_witness()),
        "power" => ("power", power_circuit(steps), power_witness(3, steps)),
        other => anyhow::bail!("unknown circuit {other:?} (expected example|power)"),
    };

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("⚠️  WARNING: Generating DEVELOPMENT proving key (seed={seed}, toxic waste is PUBLIC)");
    println!("⚠️  Anyone can forge proofs for this key. NEVER deploy it.");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let zkey = generate_dev_zkey(&r1cs, seed)?;
    std::fs::create_dir_all(&out_dir)?;
    let zkey_path = out_dir.join(format!("{name}.zkey"));
    let wtns_path = out_dir.join(format!("{name}.wtns"));
    let json_path = out_dir.join(format!("{name}.input.json"));

    std::fs::write(&zkey_path, &zkey)?;
    std::fs::write(&wtns_path, encode_witness(&witness))?;
    let doc = WitnessDocument::from_field_elements(&witness);
    std::fs::write(&json_path, serde_json::to_string_pretty(&doc)?)?;

    println!("✓ circuit `{name}`: n_vars={}, n_public={}, constraints={}", r1cs.n_vars, r1cs.n_public, r1cs.constraints.len());
    println!("✓ Saved:");
    println!("  {} ({} bytes, blake3 {})", zkey_path.display(), zkey.len(), blake3::hash(&zkey).to_hex());
    println!("  {}", wtns_path.display());
    println!("  {}", json_path.display());
    Ok(())
}
