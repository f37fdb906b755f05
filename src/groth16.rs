//! Groth16 Proving Pipeline
//!
//! Pure computation from `(ProvingKey, Witness)` to a proof. Stages run in a
//! fixed order and each is logged at `debug` with its wall-clock time:
//!
//! 1. **evaluate**: `a[j] = Σ A[j][s]·w[s]` over the domain rows (likewise B, C).
//! 2. **check**: wire 0 must be one; the first row with `a·b ≠ c` is reported
//!    as a constraint violation.
//! 3. **quotient**: interpolate `a, b, c`, re-evaluate them on the coset `g·H`,
//!    divide `a·b − c` by the (constant) value of `Z_H` there and interpolate
//!    back to the coefficients of `h`.
//! 4. **msm**: the five multi-scalar multiplications with blinding `r, s`.
//! 5. **assemble**: affine proof plus the public inputs `w[1..=n_public]`.
//!
//! ```text
//! πA = α₁ + Σ wᵢ·Aᵢ + r·δ₁
//! πB = β₂ + Σ wᵢ·B2ᵢ + s·δ₂
//! B1 = β₁ + Σ wᵢ·B1ᵢ + s·δ₁
//! πC = Σ_{i>n_public} wᵢ·Cᵢ + Σ hⱼ·Hⱼ + s·πA + r·B1 − r·s·δ₁
//! ```

#![forbid(unsafe_code)]

use std::time::Instant;

use ark_bn254::{G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{CurveGroup, VariableBaseMSM};
use ark_ff::{One, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::Rng;
use tracing::debug;

use crate::domain::DomainError;
use crate::wtns::Witness;
use crate::zkey::{Matrix, ProvingKey};
use crate::F;

/// A Groth16 proof `(A, B, C)`.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Proof {
    /// `πA`.
    pub a: G1Affine,
    /// `πB`.
    pub b: G2Affine,
    /// `πC`.
    pub c: G1Affine,
}

/// Proof plus the public inputs it attests to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOutput {
    /// The proof.
    pub proof: Proof,
    /// `w[1..=n_public]`.
    pub public_inputs: Vec<F>,
}

/// Which relation the witness breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Row index in the evaluation domain.
    Constraint(usize),
    /// Wire 0 is not one.
    ConstantWire,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Constraint(i) => write!(f, "constraint {i} is not satisfied"),
            Violation::ConstantWire => f.write_str("wire 0 must equal 1"),
        }
    }
}

/// Why the pipeline produced no proof.
#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    /// The witness does not satisfy the circuit.
    #[error("constraint violation: {0}")]
    ConstraintViolation(Violation),
    /// A stage hit a non-invertible value or inconsistent lengths.
    #[error("arithmetic failure in {stage}: {detail}")]
    ArithmeticOverflow {
        /// Pipeline stage name.
        stage: &'static str,
        /// What went wrong.
        detail: String,
    },
}

impl ComputationError {
    fn arith(stage: &'static str, detail: impl ToString) -> Self {
        ComputationError::ArithmeticOverflow {
            stage,
            detail: detail.to_string(),
        }
    }
}

/// Anything that turns a key and a witness into a proof.
///
/// The job machine is generic over this so tests can substitute an engine
/// they control.
pub trait ProofEngine: Send + Sync + 'static {
    /// Prove that `witness` satisfies the circuit of `key`.
    fn prove(&self, key: &ProvingKey, witness: &Witness) -> Result<ProofOutput, ComputationError>;
}

/// The Groth16 prover. `blinding = false` fixes `r = s = 0`, which makes
/// proofs deterministic (useful for tests, never for privacy).
#[derive(Clone, Copy, Debug)]
pub struct Groth16Prover {
    /// Draw fresh `r`, `s` per proof.
    pub blinding: bool,
}

impl Default for Groth16Prover {
    fn default() -> Self {
        Self { blinding: true }
    }
}

impl ProofEngine for Groth16Prover {
    fn prove(&self, key: &ProvingKey, witness: &Witness) -> Result<ProofOutput, ComputationError> {
        self.prove_with_rng(key, witness, &mut rand::thread_rng())
    }
}

struct Stage {
    name: &'static str,
    start: Instant,
}

impl Stage {
    fn begin(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    fn end(self) {
        debug!(stage = self.name, elapsed_ms = self.start.elapsed().as_millis() as u64, "stage done");
    }
}

impl Groth16Prover {
    /// Like [`ProofEngine::prove`] with blinding drawn from `rng`.
    pub fn prove_with_rng<R: Rng + ?Sized>(
        &self,
        key: &ProvingKey,
        witness: &Witness,
        rng: &mut R,
    ) -> Result<ProofOutput, ComputationError> {
        let w = witness.values();
        if w.len() != key.n_vars {
            return Err(ComputationError::arith(
                "evaluate",
                format!("witness has {} wires, key expects {}", w.len(), key.n_vars),
            ));
        }

        let stage = Stage::begin("evaluate");
        let (mut a, mut b, mut c) = evaluate_rows(key, w);
        stage.end();

        let stage = Stage::begin("check");
        check_rows(w, &a, &b, &c)?;
        stage.end();

        let stage = Stage::begin("quotient");
        let h = quotient_coefficients(key, &mut a, &mut b, &mut c)
            .map_err(|e| ComputationError::arith("quotient", e))?;
        stage.end();

        let stage = Stage::begin("msm");
        let (r, s) = if self.blinding {
            (F::rand(rng), F::rand(rng))
        } else {
            (F::zero(), F::zero())
        };
        let proof = multi_exponentiations(key, w, &h, r, s)?;
        stage.end();

        let stage = Stage::begin("assemble");
        let out = ProofOutput {
            proof,
            public_inputs: witness.public_inputs(key.n_public).to_vec(),
        };
        stage.end();
        Ok(out)
    }
}

/// Row evaluations of the three matrices against the witness.
fn evaluate_rows(key: &ProvingKey, w: &[F]) -> (Vec<F>, Vec<F>, Vec<F>) {
    let n = key.domain_size();
    let (mut a, mut b, mut c) = (vec![F::zero(); n], vec![F::zero(); n], vec![F::zero(); n]);
    for coef in &key.coefficients {
        let target = match coef.matrix {
            Matrix::A => &mut a,
            Matrix::B => &mut b,
            Matrix::C => &mut c,
        };
        // indices were bounds-checked when the key was loaded
        target[coef.constraint as usize] += coef.value * w[coef.signal as usize];
    }
    (a, b, c)
}

fn check_rows(w: &[F], a: &[F], b: &[F], c: &[F]) -> Result<(), ComputationError> {
    if !w.first().is_some_and(|w0| w0.is_one()) {
        return Err(ComputationError::ConstraintViolation(Violation::ConstantWire));
    }
    match (0..a.len()).find(|&i| a[i] * b[i] != c[i]) {
        Some(i) => Err(ComputationError::ConstraintViolation(Violation::Constraint(i))),
        None => Ok(()),
    }
}

/// Coefficients of `h = (a·b − c) / Z_H`. Consumes the evaluation buffers.
fn quotient_coefficients(
    key: &ProvingKey,
    a: &mut [F],
    b: &mut [F],
    c: &mut [F],
) -> Result<Vec<F>, DomainError> {
    let d = &key.domain;
    for v in [&mut *a, &mut *b, &mut *c] {
        d.ifft_in_place(v)?;
        d.coset_fft_in_place(v)?;
    }
    let z_inv = d.vanishing_on_coset_inverse()?;
    let mut h: Vec<F> = a
        .iter()
        .zip(b.iter())
        .zip(c.iter())
        .map(|((ai, bi), ci)| (*ai * bi - ci) * z_inv)
        .collect();
    d.coset_ifft_in_place(&mut h)?;
    Ok(h)
}

fn msm_g1(stage: &'static str, bases: &[G1Affine], scalars: &[F]) -> Result<G1Projective, ComputationError> {
    G1Projective::msm(bases, scalars).map_err(|len| {
        ComputationError::arith(stage, format!("{} bases, {} scalars (got {len})", bases.len(), scalars.len()))
    })
}

fn msm_g2(stage: &'static str, bases: &[G2Affine], scalars: &[F]) -> Result<G2Projective, ComputationError> {
    G2Projective::msm(bases, scalars).map_err(|len| {
        ComputationError::arith(stage, format!("{} bases, {} scalars (got {len})", bases.len(), scalars.len()))
    })
}

fn multi_exponentiations(
    key: &ProvingKey,
    w: &[F],
    h: &[F],
    r: F,
    s: F,
) -> Result<Proof, ComputationError> {
    let vk = &key.vk;
    let private = w.get(key.n_public + 1..).unwrap_or(&[]);

    let pi_a = msm_g1("msm A", &key.a_query, w)? + vk.alpha_g1 + vk.delta_g1 * r;
    let pi_b = msm_g2("msm B2", &key.b_g2_query, w)? + vk.beta_g2 + vk.delta_g2 * s;
    let b1 = msm_g1("msm B1", &key.b_g1_query, w)? + vk.beta_g1 + vk.delta_g1 * s;
    let pi_c = msm_g1("msm C", &key.c_query, private)?
        + msm_g1("msm H", &key.h_query, h)?
        + pi_a * s
        + b1 * r
        - vk.delta_g1 * (r * s);

    Ok(Proof {
        a: pi_a.into_affine(),
        b: pi_b.into_affine(),
        c: pi_c.into_affine(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_zkey::{self, example_circuit, example_witness};
    use crate::verifier::verify_proof;
    use crate::zkey::{parse_proving_key, LoadOptions};
    use rand::{rngs::StdRng, SeedableRng};

    fn key_for(r1cs: &dev_zkey::R1cs, seed: u64) -> ProvingKey {
        let bytes = dev_zkey::generate_dev_zkey(r1cs, seed).unwrap();
        parse_proving_key(&bytes, "test", LoadOptions::default()).unwrap()
    }

    #[test]
    fn example_witness_proves_and_verifies() {
        let key = key_for(&example_circuit(), 11);
        let out = Groth16Prover::default()
            .prove(&key, &Witness::new(example_witness()))
            .unwrap();
        assert_eq!(out.public_inputs, vec![F::from(2u64)]);
        verify_proof(key.verifying_key(), &out.proof, &out.public_inputs).unwrap();
    }

    #[test]
    fn unblinded_proofs_are_deterministic() {
        let key = key_for(&example_circuit(), 3);
        let w = Witness::new(example_witness());
        let p = Groth16Prover { blinding: false };
        let first = p.prove(&key, &w).unwrap();
        let second = p.prove(&key, &w).unwrap();
        assert_eq!(first, second);
        verify_proof(key.verifying_key(), &first.proof, &first.public_inputs).unwrap();
    }

    #[test]
    fn blinding_randomizes_proofs() {
        let key = key_for(&example_circuit(), 3);
        let w = Witness::new(example_witness());
        let p = Groth16Prover::default();
        let one = p.prove_with_rng(&key, &w, &mut StdRng::seed_from_u64(1)).unwrap();
        let two = p.prove_with_rng(&key, &w, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_ne!(one.proof, two.proof);
        verify_proof(key.verifying_key(), &two.proof, &two.public_inputs).unwrap();
    }

    #[test]
    fn larger_padded_domain() {
        let circuit = dev_zkey::power_circuit(5);
        let key = key_for(&circuit, 5);
        assert_eq!(key.domain_size(), 8);
        let out = Groth16Prover::default()
            .prove(&key, &Witness::new(dev_zkey::power_witness(3, 5)))
            .unwrap();
        assert_eq!(out.public_inputs, vec![F::from(729u64)]);
        verify_proof(key.verifying_key(), &out.proof, &out.public_inputs).unwrap();
    }

    #[test]
    fn violated_constraint_is_reported() {
        let key = key_for(&example_circuit(), 11);
        let mut w = example_witness();
        w[3] = F::from(5u64);
        let err = Groth16Prover::default().prove(&key, &Witness::new(w)).unwrap_err();
        assert!(matches!(
            err,
            ComputationError::ConstraintViolation(Violation::Constraint(0))
        ));
    }

    #[test]
    fn constant_wire_must_be_one() {
        let key = key_for(&example_circuit(), 11);
        let mut w = example_witness();
        w[0] = F::from(2u64);
        let err = Groth16Prover::default().prove(&key, &Witness::new(w)).unwrap_err();
        assert!(matches!(
            err,
            ComputationError::ConstraintViolation(Violation::ConstantWire)
        ));
    }

    #[test]
    fn witness_size_mismatch_is_arithmetic_error() {
        let key = key_for(&example_circuit(), 11);
        let err = Groth16Prover::default()
            .prove(&key, &Witness::new(vec![F::one(); 3]))
            .unwrap_err();
        assert!(matches!(err, ComputationError::ArithmeticOverflow { stage: "evaluate", .. }));
    }

    #[test]
    fn quotient_times_vanishing_matches_remainder() {
        let key = key_for(&example_circuit(), 11);
        let w = example_witness();
        let (mut a, mut b, mut c) = evaluate_rows(&key, &w);
        let (a0, b0, c0) = (a.clone(), b.clone(), c.clone());
        let h = quotient_coefficients(&key, &mut a, &mut b, &mut c).unwrap();

        // check a(z)·b(z) − c(z) = h(z)·Z_H(z) at an arbitrary point
        let d = &key.domain;
        let interp = |mut v: Vec<F>| {
            d.ifft_in_place(&mut v).unwrap();
            v
        };
        let eval = |coeffs: &[F], z: F| coeffs.iter().rev().fold(F::zero(), |acc, x| acc * z + x);
        let z = F::from(987654321u64);
        let (pa, pb, pc) = (interp(a0), interp(b0), interp(c0));
        assert_eq!(
            eval(&pa, z) * eval(&pb, z) - eval(&pc, z),
            eval(&h, z) * d.vanishing_at(z)
        );
    }

    #[test]
    fn proof_serializes_with_arkworks() {
        let key = key_for(&example_circuit(), 11);
        let out = Groth16Prover { blinding: false }
            .prove(&key, &Witness::new(example_witness()))
            .unwrap();
        let mut bytes = Vec::new();
        out.proof.serialize_compressed(&mut bytes).unwrap();
        let back = Proof::deserialize_compressed(&bytes[..]).unwrap();
        assert_eq!(back, out.proof);
    }
}
