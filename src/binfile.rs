//! Section-Stream Container
//!
//! Both artifact formats (`zkey` proving keys and `wtns` witnesses) share one
//! container layout:
//!
//! ```text
//! magic      [u8; 4]
//! version    u32 LE
//! n_sections u32 LE
//! repeat n_sections { type u32 LE, size u64 LE, payload [u8; size] }
//! ```
//!
//! Every declared length is checked against the bytes actually remaining
//! *before* the payload is sliced, so a hostile length can never index past
//! the buffer. Typed interpretation of payloads happens in `zkey`/`wtns`.

#![forbid(unsafe_code)]

use ark_ff::{BigInt, PrimeField};

use crate::encoding::{le_bytes_to_limbs, FIELD_BYTES};

/// Errors raised while loading or parsing binary artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// A read or a declared length ran past the end of the buffer.
    #[error("truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        /// Region being read.
        what: &'static str,
        /// Bytes the read required.
        needed: u64,
        /// Bytes left in the buffer.
        available: u64,
    },
    /// The first four bytes are not the expected magic.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Expected magic, escaped.
        expected: String,
        /// Magic found in the file, escaped.
        found: String,
    },
    /// Container version other than the supported one.
    #[error("unsupported {format} version {found} (expected {expected})")]
    UnsupportedVersion {
        /// `zkey` or `wtns`.
        format: &'static str,
        /// Version in the file.
        found: u32,
        /// Supported version.
        expected: u32,
    },
    /// A section or header field has the wrong byte length.
    #[error("{section} size mismatch: declared {declared} bytes, expected {expected}")]
    SizeMismatch {
        /// Section or field name.
        section: &'static str,
        /// Length found.
        declared: u64,
        /// Length implied by the header (`u64::MAX` on overflow).
        expected: u64,
    },
    /// Witness element count differs from the key's wire count.
    #[error("witness length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch {
        /// Wire count of the proving key.
        expected: usize,
        /// Elements supplied.
        got: usize,
    },
    /// A field element is not below its modulus, or is wider than 256 bits.
    #[error("{what} #{index} is out of range")]
    OutOfRange {
        /// Table or document the element came from.
        what: &'static str,
        /// Position of the element.
        index: usize,
    },
    /// A required section tag is absent.
    #[error("missing section {0}")]
    MissingSection(u32),
    /// A section tag appears twice.
    #[error("duplicate section {0}")]
    DuplicateSection(u32),
    /// The key is for a proving system other than Groth16.
    #[error("unsupported proving protocol {0} (only Groth16 = 1)")]
    UnsupportedProtocol(u32),
    /// A declared modulus is not the BN254 one.
    #[error("{0} modulus does not match BN254")]
    CurveMismatch(&'static str),
    /// A point is off the curve or outside the prime-order subgroup.
    #[error("{what} #{index} is not a valid curve point")]
    InvalidPoint {
        /// Table the point came from.
        what: &'static str,
        /// Position of the point.
        index: usize,
    },
    /// Domain size is not a supported power of two, or an index exceeds it.
    #[error("bad evaluation domain: {0}")]
    BadDomain(String),
    /// The JSON witness document has the wrong structure or a non-numeric value.
    #[error("malformed witness document: {0}")]
    MalformedDocument(String),
    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Bounded reader
// ----------------------------------------------------------------------------

/// Cursor over a byte slice whose reads fail with `Truncated` instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    /// `what` names the region being read; it is echoed in truncation errors.
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrow the next `n` bytes.
    pub fn take(&mut self, n: u64) -> Result<&'a [u8], ArtifactError> {
        let available = self.remaining() as u64;
        if n > available {
            return Err(ArtifactError::Truncated {
                what: self.what,
                needed: n,
                available,
            });
        }
        let n = n as usize;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, ArtifactError> {
        let mut w = [0u8; 4];
        w.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(w))
    }

    /// Little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, ArtifactError> {
        let mut w = [0u8; 8];
        w.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(w))
    }

    /// Read a canonical 32-byte little-endian field element, rejecting values
    /// `>= modulus` as `OutOfRange` (never reduced).
    pub fn read_field<Fp: PrimeField<BigInt = BigInt<4>>>(
        &mut self,
        what: &'static str,
        index: usize,
    ) -> Result<Fp, ArtifactError> {
        let bytes = self.take(FIELD_BYTES as u64)?;
        le_bytes_to_limbs(bytes)
            .and_then(|limbs| Fp::from_bigint(BigInt::new(limbs)))
            .ok_or(ArtifactError::OutOfRange { what, index })
    }
}

// ----------------------------------------------------------------------------
// Container
// ----------------------------------------------------------------------------

/// One section of a container: its type tag and its (bounds-checked) payload.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    /// Section type tag.
    pub kind: u32,
    /// Payload bytes.
    pub data: &'a [u8],
}

/// Parsed container header plus its section table. Payloads borrow the input.
#[derive(Debug, Clone)]
pub struct BinFile<'a> {
    sections: Vec<Section<'a>>,
}

impl<'a> BinFile<'a> {
    /// Parse the header and section table, validating magic, version and
    /// every declared section length against the remaining buffer.
    pub fn parse(
        bytes: &'a [u8],
        magic: &[u8; 4],
        format: &'static str,
        version: u32,
    ) -> Result<Self, ArtifactError> {
        let mut r = ByteReader::new(bytes, "file header");
        let found = r.take(4)?;
        if found != magic {
            return Err(ArtifactError::BadMagic {
                expected: magic.escape_ascii().to_string(),
                found: found.escape_ascii().to_string(),
            });
        }
        let found_version = r.read_u32()?;
        if found_version != version {
            return Err(ArtifactError::UnsupportedVersion {
                format,
                found: found_version,
                expected: version,
            });
        }
        let n_sections = r.read_u32()?;

        let mut sections: Vec<Section<'a>> = Vec::new();
        for _ in 0..n_sections {
            r.what = "section header";
            let kind = r.read_u32()?;
            let size = r.read_u64()?;
            if sections.iter().any(|s| s.kind == kind) {
                return Err(ArtifactError::DuplicateSection(kind));
            }
            r.what = "section payload";
            let data = r.take(size)?;
            sections.push(Section { kind, data });
        }
        Ok(Self { sections })
    }

    /// Payload of the section tagged `kind`, or `MissingSection`.
    pub fn section(&self, kind: u32) -> Result<&'a [u8], ArtifactError> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.data)
            .ok_or(ArtifactError::MissingSection(kind))
    }

    /// All sections in file order, unknown tags included.
    pub fn sections(&self) -> &[Section<'a>] {
        &self.sections
    }
}

/// Check that a section's byte length equals `count * item_size`, using
/// checked arithmetic so hostile counts cannot overflow.
pub fn expect_section_len(
    section: &'static str,
    data: &[u8],
    count: u64,
    item_size: u64,
) -> Result<(), ArtifactError> {
    let declared = data.len() as u64;
    let expected = count.checked_mul(item_size).ok_or(ArtifactError::SizeMismatch {
        section,
        declared,
        expected: u64::MAX,
    })?;
    if declared != expected {
        return Err(ArtifactError::SizeMismatch {
            section,
            declared,
            expected,
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Writer
// ----------------------------------------------------------------------------

/// Builder for the container format (used for witness encoding and dev keys).
#[derive(Debug)]
pub struct BinWriter {
    out: Vec<u8>,
    n_sections: u32,
}

impl BinWriter {
    /// Start a container with `magic` and `version` and no sections.
    pub fn new(magic: &[u8; 4], version: u32) -> Self {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(magic);
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // patched in `finish`
        Self { out, n_sections: 0 }
    }

    /// Append one section.
    pub fn section(&mut self, kind: u32, payload: &[u8]) -> &mut Self {
        self.out.extend_from_slice(&kind.to_le_bytes());
        self.out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        self.out.extend_from_slice(payload);
        self.n_sections += 1;
        self
    }

    /// Patch the section count and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.out[8..12].copy_from_slice(&self.n_sections.to_le_bytes());
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    fn sample() -> Vec<u8> {
        let mut w = BinWriter::new(b"test", 3);
        w.section(1, &[1, 2, 3, 4]).section(2, &[]);
        w.finish()
    }

    #[test]
    fn parses_written_container() {
        let bytes = sample();
        let f = BinFile::parse(&bytes, b"test", "test", 3).unwrap();
        assert_eq!(f.sections().len(), 2);
        assert_eq!(f.section(1).unwrap(), &[1, 2, 3, 4]);
        assert!(f.section(2).unwrap().is_empty());
        assert!(matches!(f.section(7), Err(ArtifactError::MissingSection(7))));
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let bytes = sample();
        assert!(matches!(
            BinFile::parse(&bytes, b"zkey", "zkey", 3),
            Err(ArtifactError::BadMagic { .. })
        ));
        assert!(matches!(
            BinFile::parse(&bytes, b"test", "test", 4),
            Err(ArtifactError::UnsupportedVersion { found: 3, expected: 4, .. })
        ));
    }

    #[test]
    fn declared_length_past_end_is_truncation() {
        let mut bytes = sample();
        // section 1 size field lives right after the 12-byte header + 4-byte type
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = BinFile::parse(&bytes, b"test", "test", 3).unwrap_err();
        assert!(matches!(err, ArtifactError::Truncated { what: "section payload", .. }));

        let full = sample();
        assert!(matches!(
            BinFile::parse(&full[..14], b"test", "test", 3),
            Err(ArtifactError::Truncated { .. })
        ));
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let mut w = BinWriter::new(b"test", 1);
        w.section(5, &[0]).section(5, &[1]);
        let bytes = w.finish();
        assert!(matches!(
            BinFile::parse(&bytes, b"test", "test", 1),
            Err(ArtifactError::DuplicateSection(5))
        ));
    }

    #[test]
    fn field_reads_are_range_checked() {
        let mut buf = [0xffu8; 32].to_vec();
        buf.extend_from_slice(&crate::encoding::field_to_le_bytes(&Fr::from(9u64)));
        let mut r = ByteReader::new(&buf, "values");
        assert!(matches!(
            r.read_field::<Fr>("value", 0),
            Err(ArtifactError::OutOfRange { index: 0, .. })
        ));
        assert_eq!(r.read_field::<Fr>("value", 1).unwrap(), Fr::from(9u64));
        assert!(matches!(r.read_field::<Fr>("value", 2), Err(ArtifactError::Truncated { .. })));
    }

    #[test]
    fn section_length_arithmetic_is_checked() {
        assert!(expect_section_len("points", &[0u8; 128], 2, 64).is_ok());
        assert!(matches!(
            expect_section_len("points", &[0u8; 128], 3, 64),
            Err(ArtifactError::SizeMismatch { declared: 128, expected: 192, .. })
        ));
        assert!(expect_section_len("points", &[], u64::MAX, 64).is_err());
    }
}
