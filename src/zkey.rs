//! Proving-Key Loading and Validation
//!
//! A proving key (`.zkey`) is a section-stream container (see `binfile`)
//! holding the Groth16 verification points, the R1CS coefficient table and
//! the per-wire curve-point tables consumed by the multi-scalar
//! multiplications.
//!
//! # File Format
//!
//! ```text
//! magic "zkey", version 1
//! 1  protocol u32 (1 = Groth16)
//! 2  n8q u32, q, n8r u32, r, n_vars u32, n_public u32, domain_size u32,
//!    α₁ (G1), β₁ (G1), β₂ (G2), γ₂ (G2), δ₁ (G1), δ₂ (G2)
//! 3  IC:        (n_public + 1) × G1
//! 4  n_coefs u32, n_coefs × { matrix u32, constraint u32, signal u32, value Fr }
//! 5  A query:   n_vars × G1
//! 6  B query:   n_vars × G1
//! 7  B query:   n_vars × G2
//! 8  C query:   (n_vars − n_public − 1) × G1
//! 9  H query:   domain_size × G1
//! 10 contributions (ignored)
//! ```
//!
//! Field elements and coordinates are canonical 32-byte little-endian
//! integers; a G2 coordinate is `c0 ‖ c1`; the identity is all zeros.
//!
//! # Validation Layers
//!
//! 1. **Container**: magic, version, every section length bounded by the file.
//! 2. **Shape**: each section's byte length equals its header-declared count.
//! 3. **Curve**: moduli equal BN254's; coordinates are canonical and on-curve;
//!    verification points are subgroup-checked (tables only on request, since
//!    a G2 subgroup check costs a full scalar multiplication per point).
//! 4. **Indices**: every coefficient addresses an existing wire and a
//!    constraint row inside the evaluation domain, which is itself a valid
//!    power-of-two domain.

#![forbid(unsafe_code)]

use std::path::Path;

use ark_bn254::{Fq, Fq2, G1Affine, G2Affine};
use ark_ff::{BigInt, PrimeField, Zero};
use tracing::{debug, info};

use crate::binfile::{expect_section_len, ArtifactError, BinFile, ByteReader};
use crate::domain::Domain;
use crate::encoding::limbs_to_le_bytes;
use crate::F;

/// Container magic.
pub const ZKEY_MAGIC: &[u8; 4] = b"zkey";
/// Supported container version.
pub const ZKEY_VERSION: u32 = 1;
/// Protocol id of Groth16 in the header section.
pub const PROTOCOL_GROTH16: u32 = 1;

/// Section type tags.
#[allow(missing_docs)]
pub mod section {
    pub const HEADER: u32 = 1;
    pub const GROTH16_HEADER: u32 = 2;
    pub const IC: u32 = 3;
    pub const COEFFS: u32 = 4;
    pub const POINTS_A: u32 = 5;
    pub const POINTS_B1: u32 = 6;
    pub const POINTS_B2: u32 = 7;
    pub const POINTS_C: u32 = 8;
    pub const POINTS_H: u32 = 9;
    pub const CONTRIBUTIONS: u32 = 10;
}

/// Encoded G1 point: `x ‖ y`.
pub const G1_BYTES: u64 = 64;
/// Encoded G2 point: `x.c0 ‖ x.c1 ‖ y.c0 ‖ y.c1`.
pub const G2_BYTES: u64 = 128;
/// Coefficient entry: matrix, constraint, signal, value.
pub const COEF_BYTES: u64 = 12 + 32;
/// Exact size of the Groth16 header section.
pub const GROTH16_HEADER_BYTES: u64 = 4 + 32 + 4 + 32 + 12 + 3 * G1_BYTES + 3 * G2_BYTES;

/// R1CS matrix a coefficient belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Matrix {
    A,
    B,
    C,
}

impl Matrix {
    /// `0 → A`, `1 → B`, `2 → C`.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Matrix::A),
            1 => Some(Matrix::B),
            2 => Some(Matrix::C),
            _ => None,
        }
    }

    /// Inverse of [`Matrix::from_tag`].
    pub fn tag(self) -> u32 {
        match self {
            Matrix::A => 0,
            Matrix::B => 1,
            Matrix::C => 2,
        }
    }
}

/// One non-zero entry of an R1CS matrix: `matrix[constraint][signal] = value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coefficient {
    /// Which matrix.
    pub matrix: Matrix,
    /// Row (domain index).
    pub constraint: u32,
    /// Wire index.
    pub signal: u32,
    /// Entry value.
    pub value: F,
}

/// Verification half of the key; enough to check a proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    /// `α₁`.
    pub alpha_g1: G1Affine,
    /// `β₁`, used only by the prover.
    pub beta_g1: G1Affine,
    /// `β₂`.
    pub beta_g2: G2Affine,
    /// `γ₂`.
    pub gamma_g2: G2Affine,
    /// `δ₁`, used only by the prover.
    pub delta_g1: G1Affine,
    /// `δ₂`.
    pub delta_g2: G2Affine,
    /// `(n_public + 1)` points weighting the constant wire and public inputs.
    pub ic: Vec<G1Affine>,
}

/// Immutable, fully validated Groth16 proving key.
#[derive(Debug)]
pub struct ProvingKey {
    /// Identifier clients use to address this circuit (file stem).
    pub circuit_id: String,
    /// Total wire count, including the constant wire 0.
    pub n_vars: usize,
    /// Number of public inputs (wires `1..=n_public`).
    pub n_public: usize,
    /// Evaluation domain; its size bounds the constraint rows.
    pub domain: Domain,
    /// Header points and IC.
    pub vk: VerifyingKey,
    /// Sparse A, B and C entries.
    pub coefficients: Vec<Coefficient>,
    /// `n_vars` G1 points.
    pub a_query: Vec<G1Affine>,
    /// `n_vars` G1 points.
    pub b_g1_query: Vec<G1Affine>,
    /// `n_vars` G2 points.
    pub b_g2_query: Vec<G2Affine>,
    /// Private wires only: `n_vars − n_public − 1` points.
    pub c_query: Vec<G1Affine>,
    /// `domain_size` points, indexed by `h` coefficient.
    pub h_query: Vec<G1Affine>,
    /// BLAKE3 digest of the file bytes.
    pub digest: [u8; 32],
}

impl ProvingKey {
    /// Evaluation domain size `N`.
    #[inline]
    pub fn domain_size(&self) -> usize {
        self.domain.n
    }

    /// Verification half.
    #[inline]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.vk
    }

    /// Lowercase hex of [`ProvingKey::digest`].
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Knobs for key loading.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    /// Also subgroup-check every point of the query tables.
    pub subgroup_check_tables: bool,
}

// ============================================================================
// Point decoding
// ============================================================================

fn read_coord(r: &mut ByteReader<'_>, what: &'static str, index: usize) -> Result<Fq, ArtifactError> {
    r.read_field::<Fq>(what, index).map_err(|e| match e {
        ArtifactError::OutOfRange { what, index } => ArtifactError::InvalidPoint { what, index },
        other => other,
    })
}

fn read_g1(
    r: &mut ByteReader<'_>,
    what: &'static str,
    index: usize,
    subgroup: bool,
) -> Result<G1Affine, ArtifactError> {
    let x = read_coord(r, what, index)?;
    let y = read_coord(r, what, index)?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::identity());
    }
    let p = G1Affine::new_unchecked(x, y);
    if !p.is_on_curve() || (subgroup && !p.is_in_correct_subgroup_assuming_on_curve()) {
        return Err(ArtifactError::InvalidPoint { what, index });
    }
    Ok(p)
}

fn read_g2(
    r: &mut ByteReader<'_>,
    what: &'static str,
    index: usize,
    subgroup: bool,
) -> Result<G2Affine, ArtifactError> {
    let x0 = read_coord(r, what, index)?;
    let x1 = read_coord(r, what, index)?;
    let y0 = read_coord(r, what, index)?;
    let y1 = read_coord(r, what, index)?;
    let (x, y) = (Fq2::new(x0, x1), Fq2::new(y0, y1));
    if x.is_zero() && y.is_zero() {
        return Ok(G2Affine::identity());
    }
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || (subgroup && !p.is_in_correct_subgroup_assuming_on_curve()) {
        return Err(ArtifactError::InvalidPoint { what, index });
    }
    Ok(p)
}

fn read_g1_table(
    data: &[u8],
    what: &'static str,
    count: usize,
    subgroup: bool,
) -> Result<Vec<G1Affine>, ArtifactError> {
    expect_section_len(what, data, count as u64, G1_BYTES)?;
    let mut r = ByteReader::new(data, what);
    (0..count).map(|i| read_g1(&mut r, what, i, subgroup)).collect()
}

fn read_g2_table(
    data: &[u8],
    what: &'static str,
    count: usize,
    subgroup: bool,
) -> Result<Vec<G2Affine>, ArtifactError> {
    expect_section_len(what, data, count as u64, G2_BYTES)?;
    let mut r = ByteReader::new(data, what);
    (0..count).map(|i| read_g2(&mut r, what, i, subgroup)).collect()
}

fn expect_modulus(
    r: &mut ByteReader<'_>,
    which: &'static str,
    modulus: &BigInt<4>,
) -> Result<(), ArtifactError> {
    let width = r.read_u32()?;
    if width != 32 {
        return Err(ArtifactError::SizeMismatch {
            section: which,
            declared: width as u64,
            expected: 32,
        });
    }
    if r.take(32)? != limbs_to_le_bytes(&modulus.0) {
        return Err(ArtifactError::CurveMismatch(which));
    }
    Ok(())
}

// ============================================================================
// Loader
// ============================================================================

/// Read and validate a proving key from disk. The circuit identifier is the
/// file stem (`circuits/multiplier.zkey` → `multiplier`).
pub fn load_proving_key(
    path: impl AsRef<Path>,
    opts: LoadOptions,
) -> Result<ProvingKey, ArtifactError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let circuit_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let key = parse_proving_key(&bytes, circuit_id, opts)?;
    info!(
        circuit = %key.circuit_id,
        path = %path.display(),
        n_vars = key.n_vars,
        n_public = key.n_public,
        domain_size = key.domain_size(),
        coefficients = key.coefficients.len(),
        digest = %key.digest_hex(),
        "proving key loaded"
    );
    Ok(key)
}

/// Parse and validate a proving key held in memory.
pub fn parse_proving_key(
    bytes: &[u8],
    circuit_id: impl Into<String>,
    opts: LoadOptions,
) -> Result<ProvingKey, ArtifactError> {
    let file = BinFile::parse(bytes, ZKEY_MAGIC, "zkey", ZKEY_VERSION)?;
    let tables_subgroup = opts.subgroup_check_tables;

    // 1: protocol
    let hdr = file.section(section::HEADER)?;
    expect_section_len("protocol header", hdr, 1, 4)?;
    let protocol = ByteReader::new(hdr, "protocol header").read_u32()?;
    if protocol != PROTOCOL_GROTH16 {
        return Err(ArtifactError::UnsupportedProtocol(protocol));
    }

    // 2: Groth16 header
    let g16 = file.section(section::GROTH16_HEADER)?;
    expect_section_len("groth16 header", g16, 1, GROTH16_HEADER_BYTES)?;
    let mut r = ByteReader::new(g16, "groth16 header");
    expect_modulus(&mut r, "base field", &Fq::MODULUS)?;
    expect_modulus(&mut r, "scalar field", &F::MODULUS)?;
    let n_vars = r.read_u32()? as usize;
    let n_public = r.read_u32()? as usize;
    let domain_size = r.read_u32()? as usize;
    let alpha_g1 = read_g1(&mut r, "alpha_1", 0, true)?;
    let beta_g1 = read_g1(&mut r, "beta_1", 0, true)?;
    let beta_g2 = read_g2(&mut r, "beta_2", 0, true)?;
    let gamma_g2 = read_g2(&mut r, "gamma_2", 0, true)?;
    let delta_g1 = read_g1(&mut r, "delta_1", 0, true)?;
    let delta_g2 = read_g2(&mut r, "delta_2", 0, true)?;

    if n_public + 1 > n_vars {
        return Err(ArtifactError::SizeMismatch {
            section: "public inputs",
            declared: n_public as u64 + 1,
            expected: n_vars as u64,
        });
    }
    let domain = Domain::new(domain_size).map_err(|e| ArtifactError::BadDomain(e.to_string()))?;
    debug!(n_vars, n_public, domain_size, "groth16 header parsed");

    // 3: IC
    let ic = read_g1_table(file.section(section::IC)?, "IC", n_public + 1, true)?;

    // 4: coefficients
    let coefs = file.section(section::COEFFS)?;
    let mut r = ByteReader::new(coefs, "coefficients");
    let n_coefs = r.read_u32()? as usize;
    expect_section_len("coefficients", &coefs[4..], n_coefs as u64, COEF_BYTES)?;
    let mut coefficients = Vec::with_capacity(n_coefs);
    for i in 0..n_coefs {
        let matrix = Matrix::from_tag(r.read_u32()?).ok_or(ArtifactError::OutOfRange {
            what: "coefficient matrix tag",
            index: i,
        })?;
        let constraint = r.read_u32()?;
        let signal = r.read_u32()?;
        let value = r.read_field::<F>("coefficient value", i)?;
        if constraint as usize >= domain_size {
            return Err(ArtifactError::OutOfRange {
                what: "coefficient constraint index",
                index: i,
            });
        }
        if signal as usize >= n_vars {
            return Err(ArtifactError::OutOfRange {
                what: "coefficient signal index",
                index: i,
            });
        }
        coefficients.push(Coefficient {
            matrix,
            constraint,
            signal,
            value,
        });
    }

    // 5..9: query tables
    let a_query = read_g1_table(file.section(section::POINTS_A)?, "A query", n_vars, tables_subgroup)?;
    let b_g1_query =
        read_g1_table(file.section(section::POINTS_B1)?, "B1 query", n_vars, tables_subgroup)?;
    let b_g2_query =
        read_g2_table(file.section(section::POINTS_B2)?, "B2 query", n_vars, tables_subgroup)?;
    let c_query = read_g1_table(
        file.section(section::POINTS_C)?,
        "C query",
        n_vars - n_public - 1,
        tables_subgroup,
    )?;
    let h_query = read_g1_table(file.section(section::POINTS_H)?, "H query", domain_size, tables_subgroup)?;

    Ok(ProvingKey {
        circuit_id: circuit_id.into(),
        n_vars,
        n_public,
        domain,
        vk: VerifyingKey {
            alpha_g1,
            beta_g1,
            beta_g2,
            gamma_g2,
            delta_g1,
            delta_g2,
            ic,
        },
        coefficients,
        a_query,
        b_g1_query,
        b_g2_query,
        c_query,
        h_query,
        digest: *blake3::hash(bytes).as_bytes(),
    })
}
