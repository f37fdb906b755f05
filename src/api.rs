// src/api.rs
//! Proof I/O and one-shot helpers
//!
//! A small surface over the loader, prover and verifier:
//! - `ProofJson`: the snarkjs-compatible proof document (`pi_a`, `pi_b`, `pi_c`,
//!   decimal coordinates, projective `z` fixed to one)
//! - public-signal arrays as decimal strings
//! - one-shot `prove_files` / `verify_files` used by the CLIs
//! - file helpers in `io`, including a compact arkworks-compressed proof file

#![forbid(unsafe_code)]

use std::path::Path;

use ark_bn254::{Fq, Fq2, G1Affine, G2Affine};
use ark_ff::{BigInt, PrimeField};
use serde::{Deserialize, Serialize};

use crate::{
    encoding::{field_from_text, field_to_decimal},
    groth16::{Groth16Prover, Proof, ProofOutput},
    verifier::verify_proof,
    wtns::load_witness,
    zkey::{load_proving_key, LoadOptions, ProvingKey},
    F,
};

// ===============================================================================================
// JSON encodings
// ===============================================================================================

/// snarkjs-style Groth16 proof document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJson {
    /// `A` as `[x, y, z]`.
    pub pi_a: [String; 3],
    /// `B` as `[[x0, x1], [y0, y1], [z0, z1]]`.
    pub pi_b: [[String; 2]; 3],
    /// `C` as `[x, y, z]`.
    pub pi_c: [String; 3],
    /// Always `groth16`.
    pub protocol: String,
    /// Always `bn128`.
    pub curve: String,
}

fn dec<Fp: PrimeField<BigInt = BigInt<4>>>(x: &Fp) -> String {
    field_to_decimal(x)
}

fn g1_json(p: &G1Affine) -> [String; 3] {
    if p.infinity {
        return ["0".into(), "1".into(), "0".into()];
    }
    [dec(&p.x), dec(&p.y), "1".into()]
}

fn g2_json(p: &G2Affine) -> [[String; 2]; 3] {
    if p.infinity {
        return [
            ["0".into(), "0".into()],
            ["1".into(), "0".into()],
            ["0".into(), "0".into()],
        ];
    }
    [
        [dec(&p.x.c0), dec(&p.x.c1)],
        [dec(&p.y.c0), dec(&p.y.c1)],
        ["1".into(), "0".into()],
    ]
}

fn parse_fq(s: &str) -> anyhow::Result<Fq> {
    field_from_text::<Fq>(s)
        .map_err(|e| anyhow::anyhow!("coordinate {s:?}: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("coordinate {s:?} is not below the base field modulus"))
}

fn g1_from_json(what: &str, v: &[String; 3]) -> anyhow::Result<G1Affine> {
    if v[2] == "0" {
        return Ok(G1Affine::identity());
    }
    anyhow::ensure!(v[2] == "1", "{what}: expected affine z = 1");
    let p = G1Affine::new_unchecked(parse_fq(&v[0])?, parse_fq(&v[1])?);
    anyhow::ensure!(
        p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve(),
        "{what}: not a valid G1 point"
    );
    Ok(p)
}

fn g2_from_json(what: &str, v: &[[String; 2]; 3]) -> anyhow::Result<G2Affine> {
    if v[2][0] == "0" && v[2][1] == "0" {
        return Ok(G2Affine::identity());
    }
    anyhow::ensure!(v[2][0] == "1" && v[2][1] == "0", "{what}: expected affine z = 1");
    let x = Fq2::new(parse_fq(&v[0][0])?, parse_fq(&v[0][1])?);
    let y = Fq2::new(parse_fq(&v[1][0])?, parse_fq(&v[1][1])?);
    let p = G2Affine::new_unchecked(x, y);
    anyhow::ensure!(
        p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve(),
        "{what}: not a valid G2 point"
    );
    Ok(p)
}

impl From<&Proof> for ProofJson {
    fn from(p: &Proof) -> Self {
        Self {
            pi_a: g1_json(&p.a),
            pi_b: g2_json(&p.b),
            pi_c: g1_json(&p.c),
            protocol: "groth16".into(),
            curve: "bn128".into(),
        }
    }
}

impl ProofJson {
    /// Decode and validate every point.
    pub fn to_proof(&self) -> anyhow::Result<Proof> {
        anyhow::ensure!(self.protocol == "groth16", "unsupported protocol {:?}", self.protocol);
        anyhow::ensure!(self.curve == "bn128", "unsupported curve {:?}", self.curve);
        Ok(Proof {
            a: g1_from_json("pi_a", &self.pi_a)?,
            b: g2_from_json("pi_b", &self.pi_b)?,
            c: g1_from_json("pi_c", &self.pi_c)?,
        })
    }
}

/// Public signals as decimal strings.
pub fn public_to_json(values: &[F]) -> Vec<String> {
    values.iter().map(field_to_decimal).collect()
}

/// Parse public signals, rejecting values not below the modulus.
pub fn public_from_json(values: &[String]) -> anyhow::Result<Vec<F>> {
    values
        .iter()
        .enumerate()
        .map(|(i, s)| {
            field_from_text::<F>(s)
                .map_err(|e| anyhow::anyhow!("public signal {i}: {e}"))?
                .ok_or_else(|| anyhow::anyhow!("public signal {i} is not below the field modulus"))
        })
        .collect()
}

// ===============================================================================================
/* One-shot helpers */
// ===============================================================================================

/// Load a key and a binary witness, then prove.
pub fn prove_files(
    zkey: &Path,
    wtns: &Path,
    blinding: bool,
) -> anyhow::Result<(ProvingKey, ProofOutput)> {
    let key = load_proving_key(zkey, LoadOptions::default())
        .map_err(|e| anyhow::anyhow!("load {}: {e}", zkey.display()))?;
    let witness = load_witness(wtns, key.n_vars)
        .map_err(|e| anyhow::anyhow!("load {}: {e}", wtns.display()))?;
    let out = Groth16Prover { blinding }
        .prove_with_rng(&key, &witness, &mut rand::thread_rng())
        .map_err(|e| anyhow::anyhow!("prover failed: {e}"))?;
    Ok((key, out))
}

/// Check a JSON proof and its public signals against a proving key's
/// verifying key.
pub fn verify_files(zkey: &Path, proof: &Path, public: &Path) -> anyhow::Result<()> {
    let key = load_proving_key(zkey, LoadOptions::default())
        .map_err(|e| anyhow::anyhow!("load {}: {e}", zkey.display()))?;
    let proof = io::read_proof_json(proof)?;
    let public = io::read_public_json(public)?;
    verify_proof(key.verifying_key(), &proof, &public)
        .map_err(|e| anyhow::anyhow!("verification failed: {e}"))
}

// ===============================================================================================
/* File I/O */
// ===============================================================================================

/// Proof and public-signal files.
pub mod io {
    use super::*;
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use std::fs;

    /// 8-byte magic of the compact binary proof file.
    pub const FILE_MAGIC: &[u8; 8] = b"G16BN254";
    /// Version written after the magic.
    pub const FILE_VERSION: u16 = 1;

    /// Write `proof` as snarkjs JSON.
    pub fn write_proof_json(path: &Path, proof: &Proof) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&ProofJson::from(proof))?;
        fs::write(path, text).map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))
    }

    /// Read and validate a snarkjs JSON proof.
    pub fn read_proof_json(path: &Path) -> anyhow::Result<Proof> {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("open {}: {e}", path.display()))?;
        let doc: ProofJson = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
        doc.to_proof()
    }

    /// Write public signals as a JSON array of decimal strings.
    pub fn write_public_json(path: &Path, public: &[F]) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&public_to_json(public))?;
        fs::write(path, text).map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))
    }

    /// Read a JSON array of public signals.
    pub fn read_public_json(path: &Path) -> anyhow::Result<Vec<F>> {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("open {}: {e}", path.display()))?;
        let values: Vec<String> = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
        public_from_json(&values)
    }

    /// Magic, big-endian version, then the arkworks-compressed proof.
    pub fn write_proof_bin(path: &Path, proof: &Proof) -> anyhow::Result<()> {
        let mut bytes = Vec::with_capacity(10 + 128);
        bytes.extend_from_slice(FILE_MAGIC);
        bytes.extend_from_slice(&FILE_VERSION.to_be_bytes());
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| anyhow::anyhow!("serialize proof: {e}"))?;
        fs::write(path, bytes).map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))
    }

    /// Inverse of [`write_proof_bin`].
    pub fn read_proof_bin(path: &Path) -> anyhow::Result<Proof> {
        let bytes = fs::read(path).map_err(|e| anyhow::anyhow!("open {}: {e}", path.display()))?;
        anyhow::ensure!(
            bytes.len() >= 10 && &bytes[..8] == FILE_MAGIC,
            "bad proof file magic"
        );
        let file_ver = u16::from_be_bytes([bytes[8], bytes[9]]);
        anyhow::ensure!(file_ver == FILE_VERSION, "unsupported proof version: {file_ver}");
        let mut slice = &bytes[10..];
        Proof::deserialize_compressed(&mut slice).map_err(|e| anyhow::anyhow!("deserialize proof: {e}"))
    }
}
