//! Development Proving Keys (NOT FOR PRODUCTION)
//!
//! Builds a Groth16 `.zkey` for a small R1CS from toxic waste drawn out of a
//! seeded `StdRng`. Anyone who knows the seed can forge proofs, so this module
//! only exists under `cfg(test)` and the `dev-zkey` feature.
//!
//! The QAP is formed over the smallest power-of-two domain holding the
//! constraints plus one row `A[m + i][i] = 1` per public wire (including the
//! constant wire), which binds public inputs to `πA`. With `L_j` the Lagrange
//! basis of `H`:
//!
//! ```text
//! u_i(τ) = Σ_j A[j][i]·L_j(τ)      v_i, w_i likewise for B, C
//! IC_i   = (β·u_i + α·v_i + w_i)/γ · G1       i ≤ n_public
//! C_i    = (β·u_i + α·v_i + w_i)/δ · G1       i > n_public
//! H_k    = τ^k · Z_H(τ)/δ · G1                 k < domain_size
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_bn254::{Fq, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{CurveGroup, Group};
use ark_ff::{Field, One, PrimeField, UniformRand, Zero};
use rand::{rngs::StdRng, SeedableRng};

use crate::binfile::BinWriter;
use crate::domain::{Domain, DomainError};
use crate::encoding::{field_to_le_bytes, limbs_to_le_bytes};
use crate::zkey::{section, Matrix, PROTOCOL_GROTH16, ZKEY_MAGIC, ZKEY_VERSION};
use crate::F;

/// Sparse linear combination `Σ coeff·w[wire]`.
pub type LinearCombination = Vec<(usize, F)>;

/// One rank-1 constraint `⟨a,w⟩·⟨b,w⟩ = ⟨c,w⟩`.
#[derive(Clone, Debug, Default)]
pub struct Constraint {
    pub a: LinearCombination,
    pub b: LinearCombination,
    pub c: LinearCombination,
}

/// Rank-1 constraint system. Wire 0 is the constant one; wires
/// `1..=n_public` are public.
#[derive(Clone, Debug)]
pub struct R1cs {
    pub n_vars: usize,
    pub n_public: usize,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, thiserror::Error)]
pub enum DevSetupError {
    #[error("constraint {constraint} references wire {wire} of {n_vars}")]
    WireOutOfRange {
        constraint: usize,
        wire: usize,
        n_vars: usize,
    },
    #[error("n_public + 1 must not exceed n_vars")]
    TooManyPublic,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("degenerate toxic waste for seed {0}")]
    Degenerate(u64),
}

fn eval_lc(lc: &LinearCombination, w: &[F]) -> F {
    lc.iter().map(|(i, c)| *c * w[*i]).sum()
}

impl R1cs {
    /// Rows of the QAP: constraints plus one binding row per public wire.
    pub fn qap_rows(&self) -> usize {
        self.constraints.len() + self.n_public + 1
    }

    /// Index of the first unsatisfied constraint, if any.
    pub fn first_unsatisfied(&self, w: &[F]) -> Option<usize> {
        self.constraints
            .iter()
            .position(|c| eval_lc(&c.a, w) * eval_lc(&c.b, w) != eval_lc(&c.c, w))
    }

    fn validate(&self) -> Result<(), DevSetupError> {
        if self.n_public + 1 > self.n_vars {
            return Err(DevSetupError::TooManyPublic);
        }
        for (j, c) in self.constraints.iter().enumerate() {
            for (wire, _) in c.a.iter().chain(&c.b).chain(&c.c) {
                if *wire >= self.n_vars {
                    return Err(DevSetupError::WireOutOfRange {
                        constraint: j,
                        wire: *wire,
                        n_vars: self.n_vars,
                    });
                }
            }
        }
        Ok(())
    }

    /// All coefficient entries, public binding rows included.
    fn entries(&self) -> Vec<(Matrix, usize, usize, F)> {
        let mut out = Vec::new();
        for (j, c) in self.constraints.iter().enumerate() {
            for (m, lc) in [(Matrix::A, &c.a), (Matrix::B, &c.b), (Matrix::C, &c.c)] {
                out.extend(lc.iter().map(|(s, v)| (m, j, *s, *v)));
            }
        }
        let m = self.constraints.len();
        out.extend((0..=self.n_public).map(|i| (Matrix::A, m + i, i, F::one())));
        out
    }
}

// ============================================================================
// Point encoding
// ============================================================================

fn push_fq(out: &mut Vec<u8>, x: &Fq) {
    out.extend_from_slice(&field_to_le_bytes(x));
}

/// Append the 64-byte `x ‖ y` encoding (all zeros for the identity).
pub fn encode_g1(out: &mut Vec<u8>, p: &G1Affine) {
    if p.infinity {
        out.extend_from_slice(&[0u8; 64]);
        return;
    }
    push_fq(out, &p.x);
    push_fq(out, &p.y);
}

/// Append the 128-byte `x.c0 ‖ x.c1 ‖ y.c0 ‖ y.c1` encoding.
pub fn encode_g2(out: &mut Vec<u8>, p: &G2Affine) {
    if p.infinity {
        out.extend_from_slice(&[0u8; 128]);
        return;
    }
    push_fq(out, &p.x.c0);
    push_fq(out, &p.x.c1);
    push_fq(out, &p.y.c0);
    push_fq(out, &p.y.c1);
}

fn g1_table(scalars: &[F]) -> Vec<G1Affine> {
    let g = G1Projective::generator();
    let proj: Vec<G1Projective> = scalars.iter().map(|s| g * s).collect();
    G1Projective::normalize_batch(&proj)
}

fn g2_table(scalars: &[F]) -> Vec<G2Affine> {
    let g = G2Projective::generator();
    let proj: Vec<G2Projective> = scalars.iter().map(|s| g * s).collect();
    G2Projective::normalize_batch(&proj)
}

fn g1_bytes(points: &[G1Affine]) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.len() * 64);
    points.iter().for_each(|p| encode_g1(&mut out, p));
    out
}

fn g2_bytes(points: &[G2Affine]) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.len() * 128);
    points.iter().for_each(|p| encode_g2(&mut out, p));
    out
}

/// `L_j(τ)` for every `j`, using `L_j(τ) = ω^j·Z_H(τ) / (N·(τ − ω^j))`.
fn lagrange_at(domain: &Domain, tau: F) -> Option<Vec<F>> {
    let z = domain.vanishing_at(tau);
    let n_inv = F::from(domain.n as u64).inverse()?;
    let mut out = Vec::with_capacity(domain.n);
    let mut w = F::one();
    for _ in 0..domain.n {
        out.push(w * z * n_inv * (tau - w).inverse()?);
        w *= domain.omega;
    }
    Some(out)
}

// ============================================================================
// Key generation
// ============================================================================

/// Build `.zkey` bytes for `r1cs` with toxic waste derived from `seed`.
pub fn generate_dev_zkey(r1cs: &R1cs, seed: u64) -> Result<Vec<u8>, DevSetupError> {
    r1cs.validate()?;
    let domain = Domain::new(r1cs.qap_rows().next_power_of_two().max(2))?;
    let (n_vars, n_public) = (r1cs.n_vars, r1cs.n_public);

    let mut rng = StdRng::seed_from_u64(seed);
    let [tau, alpha, beta, gamma, delta] = [(); 5].map(|_| F::rand(&mut rng));
    let degenerate = || DevSetupError::Degenerate(seed);
    let gamma_inv = gamma.inverse().ok_or_else(degenerate)?;
    let delta_inv = delta.inverse().ok_or_else(degenerate)?;
    let lagrange = lagrange_at(&domain, tau).ok_or_else(degenerate)?;

    let entries = r1cs.entries();
    let (mut u, mut v, mut w) = (vec![F::zero(); n_vars], vec![F::zero(); n_vars], vec![F::zero(); n_vars]);
    for (m, row, signal, value) in &entries {
        let target = match m {
            Matrix::A => &mut u,
            Matrix::B => &mut v,
            Matrix::C => &mut w,
        };
        target[*signal] += *value * lagrange[*row];
    }

    let k: Vec<F> = (0..n_vars).map(|i| beta * u[i] + alpha * v[i] + w[i]).collect();
    let ic: Vec<F> = k[..=n_public].iter().map(|x| *x * gamma_inv).collect();
    let c: Vec<F> = k[n_public + 1..].iter().map(|x| *x * delta_inv).collect();
    let z_over_delta = domain.vanishing_at(tau) * delta_inv;
    let mut h = Vec::with_capacity(domain.n);
    let mut tau_k = F::one();
    for _ in 0..domain.n {
        h.push(tau_k * z_over_delta);
        tau_k *= tau;
    }

    let vk_g1 = g1_table(&[alpha, beta, delta]);
    let vk_g2 = g2_table(&[beta, gamma, delta]);

    let mut header = Vec::with_capacity(660);
    header.extend_from_slice(&32u32.to_le_bytes());
    header.extend_from_slice(&limbs_to_le_bytes(&Fq::MODULUS.0));
    header.extend_from_slice(&32u32.to_le_bytes());
    header.extend_from_slice(&limbs_to_le_bytes(&F::MODULUS.0));
    header.extend_from_slice(&(n_vars as u32).to_le_bytes());
    header.extend_from_slice(&(n_public as u32).to_le_bytes());
    header.extend_from_slice(&(domain.n as u32).to_le_bytes());
    encode_g1(&mut header, &vk_g1[0]);
    encode_g1(&mut header, &vk_g1[1]);
    encode_g2(&mut header, &vk_g2[0]);
    encode_g2(&mut header, &vk_g2[1]);
    encode_g1(&mut header, &vk_g1[2]);
    encode_g2(&mut header, &vk_g2[2]);

    let mut coefs = Vec::with_capacity(4 + entries.len() * 44);
    coefs.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (m, row, signal, value) in &entries {
        coefs.extend_from_slice(&m.tag().to_le_bytes());
        coefs.extend_from_slice(&(*row as u32).to_le_bytes());
        coefs.extend_from_slice(&(*signal as u32).to_le_bytes());
        coefs.extend_from_slice(&field_to_le_bytes(value));
    }

    let mut out = BinWriter::new(ZKEY_MAGIC, ZKEY_VERSION);
    out.section(section::HEADER, &PROTOCOL_GROTH16.to_le_bytes())
        .section(section::GROTH16_HEADER, &header)
        .section(section::IC, &g1_bytes(&g1_table(&ic)))
        .section(section::COEFFS, &coefs)
        .section(section::POINTS_A, &g1_bytes(&g1_table(&u)))
        .section(section::POINTS_B1, &g1_bytes(&g1_table(&v)))
        .section(section::POINTS_B2, &g2_bytes(&g2_table(&v)))
        .section(section::POINTS_C, &g1_bytes(&g1_table(&c)))
        .section(section::POINTS_H, &g1_bytes(&g1_table(&h)))
        .section(section::CONTRIBUTIONS, &[]);
    Ok(out.finish())
}

// ============================================================================
// Sample circuits
// ============================================================================

fn lc(terms: &[(usize, u64)]) -> LinearCombination {
    terms.iter().map(|(i, c)| (*i, F::from(*c))).collect()
}

/// Four wires, one public input, two constraints:
/// `w1·w1 = w3` and `(w1 + w0)·w0 = w2`. Domain size 4.
pub fn example_circuit() -> R1cs {
    R1cs {
        n_vars: 4,
        n_public: 1,
        constraints: vec![
            Constraint {
                a: lc(&[(1, 1)]),
                b: lc(&[(1, 1)]),
                c: lc(&[(3, 1)]),
            },
            Constraint {
                a: lc(&[(1, 1), (0, 1)]),
                b: lc(&[(0, 1)]),
                c: lc(&[(2, 1)]),
            },
        ],
    }
}

/// Satisfying assignment `[1, 2, 3, 4]` for [`example_circuit`].
pub fn example_witness() -> Vec<F> {
    [1u64, 2, 3, 4].into_iter().map(F::from).collect()
}

/// `out = x^(steps + 1)` with `out` public: wires `[1, out, x, t_1..t_steps]`.
pub fn power_circuit(steps: usize) -> R1cs {
    let mut constraints = Vec::with_capacity(steps + 1);
    let mut prev = 2;
    for k in 0..steps {
        let t = 3 + k;
        constraints.push(Constraint {
            a: lc(&[(prev, 1)]),
            b: lc(&[(2, 1)]),
            c: lc(&[(t, 1)]),
        });
        prev = t;
    }
    constraints.push(Constraint {
        a: lc(&[(prev, 1)]),
        b: lc(&[(0, 1)]),
        c: lc(&[(1, 1)]),
    });
    R1cs {
        n_vars: 3 + steps,
        n_public: 1,
        constraints,
    }
}

/// Satisfying assignment for [`power_circuit`].
pub fn power_witness(x: u64, steps: usize) -> Vec<F> {
    let x = F::from(x);
    let mut w = vec![F::one(), F::zero(), x];
    let mut acc = x;
    for _ in 0..steps {
        acc *= x;
        w.push(acc);
    }
    w[1] = acc;
    w
}
