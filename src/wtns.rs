//! Witness Artifacts
//!
//! Two witness representations reach the prover:
//! - the binary `wtns` container (version 2), read from disk by the CLIs;
//! - a JSON document posted to the server, either `{"witness": [...]}` or a
//!   bare array whose elements are decimal strings, `0x`-hex strings or exact
//!   JSON integers.
//!
//! The JSON document is converted to `wtns` bytes and then parsed by the same
//! reader as a file, so both paths share one set of range checks. Values are
//! never reduced modulo the field: anything `>= r` is `OutOfRange`.

#![forbid(unsafe_code)]

use std::path::Path;

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binfile::{expect_section_len, ArtifactError, BinFile, BinWriter, ByteReader};
use crate::encoding::{
    field_to_decimal, field_to_le_bytes, limbs_to_le_bytes, parse_u256, Limbs, NumberError,
    FIELD_BYTES,
};
use crate::F;

/// Container magic.
pub const WTNS_MAGIC: &[u8; 4] = b"wtns";
/// Supported container version.
pub const WTNS_VERSION: u32 = 2;
const SECTION_HEADER: u32 = 1;
const SECTION_VALUES: u32 = 2;

/// Full wire assignment; wire 0 is the constant one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness {
    values: Vec<F>,
}

impl Witness {
    /// Wrap already-validated wire values, wire 0 first.
    pub fn new(values: Vec<F>) -> Self {
        Self { values }
    }

    /// All wire values.
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// `w[1..=n_public]`, clamped to the witness length.
    pub fn public_inputs(&self, n_public: usize) -> &[F] {
        let end = (n_public + 1).min(self.values.len());
        self.values.get(1..end).unwrap_or(&[])
    }
}

/// Parse a `wtns` container holding exactly `expected_len` elements.
pub fn parse_witness(bytes: &[u8], expected_len: usize) -> Result<Witness, ArtifactError> {
    let file = BinFile::parse(bytes, WTNS_MAGIC, "wtns", WTNS_VERSION)?;

    let mut r = ByteReader::new(file.section(SECTION_HEADER)?, "witness header");
    let n8 = r.read_u32()?;
    if n8 as usize != FIELD_BYTES {
        return Err(ArtifactError::SizeMismatch {
            section: "witness element width",
            declared: n8 as u64,
            expected: FIELD_BYTES as u64,
        });
    }
    if r.take(FIELD_BYTES as u64)? != limbs_to_le_bytes(&F::MODULUS.0) {
        return Err(ArtifactError::CurveMismatch("witness field"));
    }
    let n_witness = r.read_u32()? as usize;
    if n_witness != expected_len {
        return Err(ArtifactError::LengthMismatch {
            expected: expected_len,
            got: n_witness,
        });
    }

    let data = file.section(SECTION_VALUES)?;
    expect_section_len("witness values", data, n_witness as u64, FIELD_BYTES as u64)?;
    let mut r = ByteReader::new(data, "witness values");
    let values = (0..n_witness)
        .map(|i| r.read_field::<F>("witness value", i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Witness { values })
}

/// Read and parse a `wtns` file.
pub fn load_witness(path: impl AsRef<Path>, expected_len: usize) -> Result<Witness, ArtifactError> {
    let bytes = std::fs::read(path)?;
    parse_witness(&bytes, expected_len)
}

fn encode_raw(count: usize, body: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut header = Vec::with_capacity(4 + FIELD_BYTES + 4);
    header.extend_from_slice(&(FIELD_BYTES as u32).to_le_bytes());
    header.extend_from_slice(&limbs_to_le_bytes(&F::MODULUS.0));
    header.extend_from_slice(&(count as u32).to_le_bytes());

    let mut values = Vec::with_capacity(count * FIELD_BYTES);
    body(&mut values);

    let mut w = BinWriter::new(WTNS_MAGIC, WTNS_VERSION);
    w.section(SECTION_HEADER, &header).section(SECTION_VALUES, &values);
    w.finish()
}

/// Encode field elements as a `wtns` container.
pub fn encode_witness(values: &[F]) -> Vec<u8> {
    encode_raw(values.len(), |out| {
        for v in values {
            out.extend_from_slice(&field_to_le_bytes(v));
        }
    })
}

/// Encode raw 256-bit integers without range checks; the reader rejects any
/// value `>= r`.
pub fn encode_witness_limbs(values: &[Limbs]) -> Vec<u8> {
    encode_raw(values.len(), |out| {
        for v in values {
            out.extend_from_slice(&limbs_to_le_bytes(v));
        }
    })
}

// ============================================================================
// JSON witness document
// ============================================================================

/// Submitted witness: `{"witness": [...]}` or a bare array.
///
/// Kept as a raw JSON value so that busy checks never depend on payload shape;
/// structure is validated by [`WitnessDocument::elements`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WitnessDocument(Value);

impl WitnessDocument {
    /// Wrap a raw JSON value; nothing is validated yet.
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// `{"witness": ["1", "2", ...]}` from field elements.
    pub fn from_field_elements(values: &[F]) -> Self {
        let items = values
            .iter()
            .map(|v| Value::String(field_to_decimal(v)))
            .collect();
        let mut obj = serde_json::Map::new();
        obj.insert("witness".to_string(), Value::Array(items));
        Self(Value::Object(obj))
    }

    /// The element array, or `MalformedDocument` for any other shape.
    pub fn elements(&self) -> Result<&[Value], ArtifactError> {
        let arr = match &self.0 {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("witness") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(ArtifactError::MalformedDocument(
                        "`witness` must be an array".into(),
                    ))
                }
                None => {
                    return Err(ArtifactError::MalformedDocument(
                        "missing `witness` array".into(),
                    ))
                }
            },
            _ => {
                return Err(ArtifactError::MalformedDocument(
                    "expected an array or an object with a `witness` array".into(),
                ))
            }
        };
        Ok(arr.as_slice())
    }

    /// Element count, or `MalformedDocument` for a bad shape.
    pub fn len(&self) -> Result<usize, ArtifactError> {
        Ok(self.elements()?.len())
    }

    /// Convert to raw 256-bit integers. Range against the field is not
    /// checked here.
    pub fn to_limbs(&self) -> Result<Vec<Limbs>, ArtifactError> {
        self.elements()?
            .iter()
            .enumerate()
            .map(|(i, v)| element_limbs(i, v))
            .collect()
    }

    /// Convert to a `wtns` container.
    pub fn to_wtns_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(encode_witness_limbs(&self.to_limbs()?))
    }

    /// Full conversion: shape, element syntax, then field range via the
    /// binary reader.
    pub fn to_witness(&self, expected_len: usize) -> Result<Witness, ArtifactError> {
        check_witness_shape(self, expected_len)?;
        parse_witness(&self.to_wtns_bytes()?, expected_len)
    }
}

fn element_limbs(index: usize, value: &Value) -> Result<Limbs, ArtifactError> {
    let text = match value {
        Value::String(s) => s.clone(),
        // arbitrary_precision keeps the literal digits
        Value::Number(n) => n.to_string(),
        other => {
            return Err(ArtifactError::MalformedDocument(format!(
                "element {index} is not a number: {other}"
            )))
        }
    };
    parse_u256(&text).map_err(|e| match e {
        NumberError::Overflow => ArtifactError::OutOfRange {
            what: "witness value",
            index,
        },
        other => ArtifactError::MalformedDocument(format!("element {index} ({text}): {other}")),
    })
}

/// Cheap pre-acceptance check: the document is an array (or wraps one) with
/// exactly `expected_len` elements. Element values are checked later.
pub fn check_witness_shape(doc: &WitnessDocument, expected_len: usize) -> Result<(), ArtifactError> {
    let got = doc.len()?;
    if got != expected_len {
        return Err(ArtifactError::LengthMismatch {
            expected: expected_len,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const R: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";
    const R_MINUS_ONE: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495616";

    fn fr(v: u64) -> F {
        F::from(v)
    }

    #[test]
    fn binary_witness_round_trips() {
        let values = vec![fr(1), fr(2), fr(3), fr(4)];
        let bytes = encode_witness(&values);
        let w = parse_witness(&bytes, 4).unwrap();
        assert_eq!(w.values(), &values[..]);
        assert_eq!(w.public_inputs(1), &[fr(2)]);
        assert_eq!(w.public_inputs(10), &values[1..]);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let bytes = encode_witness(&[fr(1), fr(2), fr(3)]);
        assert!(matches!(
            parse_witness(&bytes, 4),
            Err(ArtifactError::LengthMismatch { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn value_equal_to_modulus_is_out_of_range() {
        let mut limbs = vec![[1, 0, 0, 0]; 4];
        limbs[2] = F::MODULUS.0;
        let bytes = encode_witness_limbs(&limbs);
        assert!(matches!(
            parse_witness(&bytes, 4),
            Err(ArtifactError::OutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn truncated_values_section() {
        let mut bytes = encode_witness(&[fr(1), fr(2)]);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(parse_witness(&bytes, 2), Err(ArtifactError::Truncated { .. })));
    }

    #[test]
    fn foreign_field_header_is_rejected() {
        let mut bytes = encode_witness(&[fr(1)]);
        // header payload starts after 12-byte file header + 12-byte section header
        bytes[24 + 4] ^= 1;
        assert!(matches!(
            parse_witness(&bytes, 1),
            Err(ArtifactError::CurveMismatch(_))
        ));
    }

    #[test]
    fn loads_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), encode_witness(&[fr(1), fr(5)])).unwrap();
        let w = load_witness(file.path(), 2).unwrap();
        assert_eq!(w.values()[1], fr(5));
    }

    #[test]
    fn json_document_accepts_all_element_forms() {
        let doc: WitnessDocument =
            serde_json::from_value(json!({"witness": ["1", 2, "0x03", R_MINUS_ONE]})).unwrap();
        let w = doc.to_witness(4).unwrap();
        assert_eq!(w.values()[..3], [fr(1), fr(2), fr(3)]);
        assert_eq!(w.values()[3], -fr(1));

        let bare = WitnessDocument::from_value(json!(["1", "2"]));
        assert_eq!(bare.len().unwrap(), 2);
    }

    #[test]
    fn json_document_distinguishes_failures() {
        let at_modulus = WitnessDocument::from_value(json!(["1", R]));
        assert!(matches!(
            at_modulus.to_witness(2),
            Err(ArtifactError::OutOfRange { index: 1, .. })
        ));

        let too_wide = WitnessDocument::from_value(json!(["1", format!("0x1{}", "0".repeat(64))]));
        assert!(matches!(
            too_wide.to_witness(2),
            Err(ArtifactError::OutOfRange { index: 1, .. })
        ));

        for bad in [json!(["1", "-2"]), json!(["1", true]), json!(["1", 2.5]), json!(["1", "abc"])] {
            let doc = WitnessDocument::from_value(bad);
            assert!(matches!(doc.to_witness(2), Err(ArtifactError::MalformedDocument(_))));
        }

        let not_array = WitnessDocument::from_value(json!({"values": []}));
        assert!(matches!(
            check_witness_shape(&not_array, 0),
            Err(ArtifactError::MalformedDocument(_))
        ));
        let short = WitnessDocument::from_value(json!(["1"]));
        assert!(matches!(
            check_witness_shape(&short, 4),
            Err(ArtifactError::LengthMismatch { expected: 4, got: 1 })
        ));
    }

    #[test]
    fn large_json_integer_is_exact() {
        let doc: WitnessDocument =
            serde_json::from_str(&format!("{{\"witness\": [1, {R_MINUS_ONE}]}}")).unwrap();
        let w = doc.to_witness(2).unwrap();
        assert_eq!(w.values()[1], -fr(1));
    }

    #[test]
    fn document_from_field_elements() {
        let doc = WitnessDocument::from_field_elements(&[fr(1), fr(9)]);
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"witness": ["1", "9"]}));
    }
}
