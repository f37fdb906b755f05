//! Evaluation Domain & Radix-2 Transforms
//!
//! Multiplicative subgroup `H = {1, ω, …, ω^{N-1}}` of the scalar field with
//! vanishing polynomial `Z_H(X) = X^N − 1`, plus the coset `g·H` (with `g` the
//! field's multiplicative generator) on which the quotient `(A·B − C) / Z_H`
//! is computed pointwise without ever dividing by zero.
//!
//! ## Validation
//! - `N` is a power of two, `N ≥ 2`, and `log2 N ≤` the field's two-adicity.
//! - `ω^N = 1` and `ω^{N/2} ≠ 1` (2 is the only prime factor of `N`).
//! - `g^N ≠ 1`, i.e. the coset does not intersect `H`.
//!
//! The transforms operate in place on full-length vectors; the proving key's
//! `domain_size` is validated against these rules at load time, so the
//! pipeline never sees a bad length.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_ff::{FftField, Field, One, Zero};

use crate::F;

/// Evaluation domain of size `N` over the scalar field.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Domain size `N` (power of two).
    pub n: usize,
    /// `log2 N`.
    pub log_n: u32,
    /// Generator `ω` of `H`.
    pub omega: F,
    /// Coset shift `g` used for quotient evaluation.
    pub coset_shift: F,
}

/// Errors produced by domain checks / transforms.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("domain size must be a power of two >= 2 (got {0})")]
    NotPowerOfTwo(usize),
    #[error("domain size 2^{log_n} exceeds the field's two-adicity 2^{max}")]
    TooLarge { log_n: u32, max: u32 },
    #[error("omega^N != 1")]
    OmegaNPowNotOne,
    #[error("omega is not primitive: omega^(N/2) == 1")]
    OmegaNotPrimitive,
    #[error("vector length must equal N (len={len}, N={n})")]
    BadLen { len: usize, n: usize },
    #[error("coset shift lies in H; Z_H is not invertible on the coset")]
    CosetInDomain,
}

#[inline]
pub(crate) fn pow_u64(mut base: F, mut exp: u64) -> F {
    let mut acc = F::one();
    while exp > 0 {
        if (exp & 1) == 1 {
            acc *= base;
        }
        base.square_in_place();
        exp >>= 1;
    }
    acc
}

fn validate_domain_r(d: &Domain) -> Result<(), DomainError> {
    if !pow_u64(d.omega, d.n as u64).is_one() {
        return Err(DomainError::OmegaNPowNotOne);
    }
    if pow_u64(d.omega, (d.n / 2) as u64).is_one() {
        return Err(DomainError::OmegaNotPrimitive);
    }
    if pow_u64(d.coset_shift, d.n as u64).is_one() {
        return Err(DomainError::CosetInDomain);
    }
    Ok(())
}

impl Domain {
    /// Build and validate the size-`n` domain.
    pub fn new(n: usize) -> Result<Self, DomainError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(DomainError::NotPowerOfTwo(n));
        }
        let log_n = n.trailing_zeros();
        let too_large = DomainError::TooLarge {
            log_n,
            max: F::TWO_ADICITY,
        };
        if log_n > F::TWO_ADICITY {
            return Err(too_large);
        }
        let omega = F::get_root_of_unity(n as u64).ok_or(too_large)?;
        let d = Self {
            n,
            log_n,
            omega,
            coset_shift: F::GENERATOR,
        };
        validate_domain_r(&d)?;
        Ok(d)
    }

    /// `ω^i`.
    #[cfg(test)]
    fn element(&self, i: usize) -> F {
        pow_u64(self.omega, i as u64)
    }

    /// `Z_H(z) = z^N − 1`.
    #[inline]
    pub fn vanishing_at(&self, z: F) -> F {
        pow_u64(z, self.n as u64) - F::one()
    }

    /// `Z_H` is constant on the coset `g·H`: returns `(g^N − 1)^{-1}`.
    pub fn vanishing_on_coset_inverse(&self) -> Result<F, DomainError> {
        self.vanishing_at(self.coset_shift)
            .inverse()
            .ok_or(DomainError::CosetInDomain)
    }

    #[inline]
    fn check_len(&self, len: usize) -> Result<(), DomainError> {
        if len != self.n {
            return Err(DomainError::BadLen { len, n: self.n });
        }
        Ok(())
    }

    /// Coefficients → evaluations on `H`.
    #[cfg(test)]
    fn fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        ntt_in_place(a, self.omega);
        Ok(())
    }

    /// Evaluations on `H` → coefficients.
    pub fn ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        intt_in_place(a, self.omega);
        Ok(())
    }

    /// Coefficients → evaluations on the coset `g·H`.
    pub fn coset_fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        distribute_powers(a, self.coset_shift);
        ntt_in_place(a, self.omega);
        Ok(())
    }

    /// Evaluations on the coset `g·H` → coefficients.
    pub fn coset_ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        intt_in_place(a, self.omega);
        let g_inv = self
            .coset_shift
            .inverse()
            .ok_or(DomainError::CosetInDomain)?;
        distribute_powers(a, g_inv);
        Ok(())
    }
}

/// `a[k] *= g^k`.
fn distribute_powers(a: &mut [F], g: F) {
    let mut pow = F::one();
    for x in a.iter_mut() {
        *x *= pow;
        pow *= g;
    }
}

fn ntt_in_place(a: &mut [F], root: F) {
    let n = a.len();
    debug_assert!(n.is_power_of_two());

    // bit-reversal
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            a.swap(i, j);
        }
    }

    // Cooley–Tukey
    let mut len = 2;
    while len <= n {
        let w_len = pow_u64(root, (n / len) as u64);
        for start in (0..n).step_by(len) {
            let mut w = F::one();
            let half = len / 2;
            for i in 0..half {
                let u = a[start + i];
                let v = a[start + i + half] * w;
                a[start + i] = u + v;
                a[start + i + half] = u - v;
                w *= w_len;
            }
        }
        len <<= 1;
    }
}

fn intt_in_place(a: &mut [F], root: F) {
    let n = a.len();
    debug_assert!(n.is_power_of_two());
    // root and n are non-zero for any validated domain
    let inv_root = root.inverse().unwrap_or_else(F::zero);
    ntt_in_place(a, inv_root);
    let inv_n = F::from(n as u64).inverse().unwrap_or_else(F::zero);
    for x in a.iter_mut() {
        *x *= inv_n;
    }
}
