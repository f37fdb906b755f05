//! Groth16 verification against the key's embedded verifying key:
//! `e(A, B) = e(α₁, β₂) · e(vk_x, γ₂) · e(C, δ₂)` with
//! `vk_x = IC₀ + Σ xᵢ·ICᵢ`.

#![forbid(unsafe_code)]

use ark_bn254::{Bn254, G1Projective};
use ark_ec::{pairing::Pairing, CurveGroup, VariableBaseMSM};
use ark_ff::One;

use crate::groth16::Proof;
use crate::zkey::VerifyingKey;
use crate::F;

/// Why a proof was not accepted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Public input count does not match the key's IC table.
    #[error("expected {expected} public inputs, got {got}")]
    PublicInputCount {
        /// `n_public` of the key.
        expected: usize,
        /// Inputs supplied.
        got: usize,
    },
    /// The pairing equation does not hold.
    #[error("pairing check failed")]
    PairingCheck,
}

/// Check `proof` against `vk` for the given public inputs.
pub fn verify_proof(vk: &VerifyingKey, proof: &Proof, public_inputs: &[F]) -> Result<(), VerifyError> {
    let (ic0, ic_rest) = vk.ic.split_first().ok_or(VerifyError::PairingCheck)?;
    if public_inputs.len() != ic_rest.len() {
        return Err(VerifyError::PublicInputCount {
            expected: ic_rest.len(),
            got: public_inputs.len(),
        });
    }
    let vk_x = G1Projective::msm(ic_rest, public_inputs).map_err(|_| VerifyError::PairingCheck)? + ic0;

    // e(-A, B)·e(α, β)·e(vk_x, γ)·e(C, δ) == 1
    let lhs = Bn254::multi_pairing(
        [(-proof.a), vk.alpha_g1, vk_x.into_affine(), proof.c],
        [proof.b, vk.beta_g2, vk.gamma_g2, vk.delta_g2],
    );
    if lhs.0.is_one() {
        Ok(())
    } else {
        Err(VerifyError::PairingCheck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_zkey::{example_circuit, example_witness, generate_dev_zkey};
    use crate::groth16::{Groth16Prover, ProofEngine};
    use crate::wtns::Witness;
    use crate::zkey::{parse_proving_key, LoadOptions, ProvingKey};

    fn setup() -> (ProvingKey, Proof) {
        let bytes = generate_dev_zkey(&example_circuit(), 21).unwrap();
        let key = parse_proving_key(&bytes, "example", LoadOptions::default()).unwrap();
        let out = Groth16Prover::default()
            .prove(&key, &Witness::new(example_witness()))
            .unwrap();
        (key, out.proof)
    }

    #[test]
    fn rejects_wrong_public_input() {
        let (key, proof) = setup();
        assert!(verify_proof(&key.vk, &proof, &[F::from(2u64)]).is_ok());
        assert_eq!(
            verify_proof(&key.vk, &proof, &[F::from(3u64)]),
            Err(VerifyError::PairingCheck)
        );
    }

    #[test]
    fn rejects_wrong_input_count() {
        let (key, proof) = setup();
        assert_eq!(
            verify_proof(&key.vk, &proof, &[]),
            Err(VerifyError::PublicInputCount { expected: 1, got: 0 })
        );
    }

    #[test]
    fn rejects_tampered_proof() {
        let (key, mut proof) = setup();
        proof.c = proof.a;
        assert!(verify_proof(&key.vk, &proof, &[F::from(2u64)]).is_err());
    }

    #[test]
    fn proof_does_not_verify_under_another_key() {
        let (_, proof) = setup();
        let other = generate_dev_zkey(&example_circuit(), 22).unwrap();
        let other = parse_proving_key(&other, "other", LoadOptions::default()).unwrap();
        assert!(verify_proof(&other.vk, &proof, &[F::from(2u64)]).is_err());
    }
}
