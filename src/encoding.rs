//! Integer & Field-Element Encodings
//!
//! Conversions shared by the artifact loaders, the JSON witness document and
//! the proof JSON encoders:
//! - decimal / `0x`-hex text → 256-bit little-endian limbs (never reduced),
//! - limbs ↔ 32-byte little-endian buffers,
//! - canonical field elements → decimal strings.
//!
//! Range checks against a modulus are *not* done here; callers decide which
//! field a value belongs to and report `OutOfRange` themselves.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_ff::{BigInt, PrimeField};

/// Width in bytes of every serialized field element (BN254 `Fr` and `Fq`).
pub const FIELD_BYTES: usize = 32;

/// 256-bit unsigned integer as four little-endian `u64` limbs.
pub type Limbs = [u64; 4];

/// Errors produced while parsing textual integers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("empty number")]
    Empty,
    #[error("invalid digit `{0}`")]
    InvalidDigit(char),
    #[error("value does not fit in 256 bits")]
    Overflow,
    #[error("negative values are not field elements")]
    Negative,
}

/// Parse a non-negative integer written in decimal or `0x`-prefixed hex.
pub fn parse_u256(text: &str) -> Result<Limbs, NumberError> {
    let t = text.trim();
    if t.starts_with('-') {
        return Err(NumberError::Negative);
    }
    let t = t.strip_prefix('+').unwrap_or(t);
    match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex_digits) => parse_hex(hex_digits),
        None => parse_decimal(t),
    }
}

fn parse_decimal(t: &str) -> Result<Limbs, NumberError> {
    if t.is_empty() {
        return Err(NumberError::Empty);
    }
    let mut limbs = [0u64; 4];
    for ch in t.chars() {
        let d = ch.to_digit(10).ok_or(NumberError::InvalidDigit(ch))?;
        // limbs = limbs * 10 + d
        let mut carry = d as u128;
        for limb in limbs.iter_mut() {
            let v = (*limb as u128) * 10 + carry;
            *limb = v as u64;
            carry = v >> 64;
        }
        if carry != 0 {
            return Err(NumberError::Overflow);
        }
    }
    Ok(limbs)
}

fn parse_hex(t: &str) -> Result<Limbs, NumberError> {
    if t.is_empty() {
        return Err(NumberError::Empty);
    }
    let mut limbs = [0u64; 4];
    for ch in t.chars() {
        let d = ch.to_digit(16).ok_or(NumberError::InvalidDigit(ch))? as u64;
        if limbs[3] >> 60 != 0 {
            return Err(NumberError::Overflow);
        }
        for i in (1..4).rev() {
            limbs[i] = (limbs[i] << 4) | (limbs[i - 1] >> 60);
        }
        limbs[0] = (limbs[0] << 4) | d;
    }
    Ok(limbs)
}

/// Little-endian bytes of a 256-bit integer.
pub fn limbs_to_le_bytes(limbs: &Limbs) -> [u8; FIELD_BYTES] {
    let mut out = [0u8; FIELD_BYTES];
    for (chunk, limb) in out.chunks_exact_mut(8).zip(limbs.iter()) {
        chunk.copy_from_slice(&limb.to_le_bytes());
    }
    out
}

/// Inverse of [`limbs_to_le_bytes`]. `bytes` must be exactly 32 bytes long.
pub fn le_bytes_to_limbs(bytes: &[u8]) -> Option<Limbs> {
    if bytes.len() != FIELD_BYTES {
        return None;
    }
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut w = [0u8; 8];
        w.copy_from_slice(chunk);
        *limb = u64::from_le_bytes(w);
    }
    Some(limbs)
}

/// Decimal rendering of a 256-bit integer (`"0"` for zero).
pub fn limbs_to_decimal(limbs: &Limbs) -> String {
    const CHUNK: u64 = 10_000_000_000_000_000_000; // 10^19
    let mut n = *limbs;
    let mut parts: Vec<u64> = Vec::new();
    while n.iter().any(|&l| l != 0) {
        // n, rem = divmod(n, 10^19)
        let mut rem: u128 = 0;
        for limb in n.iter_mut().rev() {
            let cur = (rem << 64) | (*limb as u128);
            *limb = (cur / CHUNK as u128) as u64;
            rem = cur % CHUNK as u128;
        }
        parts.push(rem as u64);
    }
    match parts.split_last() {
        None => "0".to_string(),
        Some((head, rest)) => {
            let mut s = head.to_string();
            for p in rest.iter().rev() {
                s.push_str(&format!("{p:019}"));
            }
            s
        }
    }
}

/// Interpret limbs as a canonical element of `Fp`; `None` when `>= modulus`.
pub fn field_from_limbs<Fp: PrimeField<BigInt = BigInt<4>>>(limbs: Limbs) -> Option<Fp> {
    Fp::from_bigint(BigInt::new(limbs))
}

/// Canonical little-endian bytes of a field element.
pub fn field_to_le_bytes<Fp: PrimeField<BigInt = BigInt<4>>>(x: &Fp) -> [u8; FIELD_BYTES] {
    limbs_to_le_bytes(&x.into_bigint().0)
}

/// Canonical decimal string of a field element.
pub fn field_to_decimal<Fp: PrimeField<BigInt = BigInt<4>>>(x: &Fp) -> String {
    limbs_to_decimal(&x.into_bigint().0)
}

/// Parse decimal/hex text into a field element without modular reduction.
///
/// Returns `Ok(None)` when the integer is well-formed but not below the modulus.
pub fn field_from_text<Fp: PrimeField<BigInt = BigInt<4>>>(
    text: &str,
) -> Result<Option<Fp>, NumberError> {
    Ok(field_from_limbs(parse_u256(text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fq, Fr};

    const FR_MODULUS: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn decimal_modulus_matches_field_constant() {
        let limbs = parse_u256(FR_MODULUS).unwrap();
        assert_eq!(limbs, Fr::MODULUS.0);
        assert!(field_from_limbs::<Fr>(limbs).is_none());
    }

    #[test]
    fn hex_and_decimal_agree() {
        assert_eq!(parse_u256("0xff").unwrap(), parse_u256("255").unwrap());
        assert_eq!(parse_u256("0X0001").unwrap(), [1, 0, 0, 0]);
        let big = parse_u256("0x10000000000000000").unwrap();
        assert_eq!(big, [0, 1, 0, 0]);
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        assert_eq!(parse_u256(""), Err(NumberError::Empty));
        assert_eq!(parse_u256("12a"), Err(NumberError::InvalidDigit('a')));
        assert_eq!(parse_u256("-5"), Err(NumberError::Negative));
        let two_pow_256 =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert_eq!(parse_u256(two_pow_256), Err(NumberError::Overflow));
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(parse_u256(max).unwrap(), [u64::MAX; 4]);
        assert_eq!(parse_u256(&format!("0x{}", "f".repeat(65))), Err(NumberError::Overflow));
    }

    #[test]
    fn decimal_rendering() {
        assert_eq!(limbs_to_decimal(&[0; 4]), "0");
        assert_eq!(limbs_to_decimal(&[10_000_000_000_000_000_000, 0, 0, 0]), "10000000000000000000");
        assert_eq!(limbs_to_decimal(&Fr::MODULUS.0), FR_MODULUS);
        let minus_one = -Fq::from(1u64);
        let s = field_to_decimal(&minus_one);
        assert_eq!(field_from_text::<Fq>(&s).unwrap(), Some(minus_one));
    }

    #[test]
    fn byte_layout_is_little_endian() {
        let x = Fr::from(0x0102u64);
        let bytes = field_to_le_bytes(&x);
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1], 0x01);
        assert!(bytes[2..].iter().all(|&b| b == 0));
        assert_eq!(le_bytes_to_limbs(&bytes), Some([0x0102, 0, 0, 0]));
        assert_eq!(le_bytes_to_limbs(&bytes[..31]), None);
    }
}
