//! K-mer encoding: 2-bit mapping, reverse complement, canonicalization.
//!
//! Conventions
//! - Keys are **LSB-first**: base `i` of the k-mer occupies bits `[2i, 2i+1]`.
//! - A=00, C=01, G=10, T=11. Lower-case bases map like their upper-case forms.
//! - A canonical key is the smaller of the forward and reverse-complement keys.

use crate::error::{KmerError, Result, invalid};

/// Longest k-mer that fits a `u64` key at 2 bits per base.
pub const MAX_K: usize = 32;

/// Marks bytes outside the nucleotide alphabet in [`MAP_LUT`].
const X: u8 = 0xFF;

/// 256-entry LUT: ASCII -> 2-bit (A=0, C=1, G=2, T=3), 0xFF for anything else.
pub static MAP_LUT: [u8; 256] = {
    let mut t = [X; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t
};

const BASES: [u8; 4] = *b"ACGT";

/// How bytes outside {A,C,G,T} are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SymbolPolicy {
    /// Reject with [`KmerError::MalformedSymbol`].
    #[default]
    Strict,
    /// Alias to `A` (contributes zero bits), matching older k-mer tables.
    Legacy,
    /// K-mers and read windows touching the symbol are ignored by the set.
    /// The encoder itself still reports the symbol as malformed.
    Skip,
}

/// 2-bit code of a base. `None` if the byte is not a nucleotide.
#[inline]
pub fn map_base(b: u8) -> Option<u8> {
    let v = MAP_LUT[b as usize];
    if v <= 3 { Some(v) } else { None }
}

/// 2-bit code of `b` at offset `pos`, resolved under `policy`.
#[inline]
pub(crate) fn code_at(b: u8, pos: usize, policy: SymbolPolicy) -> Result<u64> {
    match map_base(b) {
        Some(v) => Ok(v as u64),
        None if policy == SymbolPolicy::Legacy => Ok(0),
        None => Err(KmerError::MalformedSymbol {
            symbol: b as char,
            pos,
        }),
    }
}

/// Check `1 <= k <= 32`.
pub(crate) fn check_k(k: usize) -> Result<()> {
    if k == 0 || k > MAX_K {
        return invalid(format!("k must be in 1..={MAX_K}, got {k}"));
    }
    Ok(())
}

fn check_len(bases: &[u8], k: usize) -> Result<()> {
    check_k(k)?;
    if bases.len() != k {
        return invalid(format!(
            "k-mer length {} does not match k={k}",
            bases.len()
        ));
    }
    Ok(())
}

/// Mask covering the lower `2k` bits.
#[inline]
pub fn key_mask(k: usize) -> u64 {
    if k >= MAX_K {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

/// Encode exactly `k` bases into an LSB-first key.
pub fn encode(bases: &[u8], k: usize, policy: SymbolPolicy) -> Result<u64> {
    check_len(bases, k)?;
    let mut key = 0u64;
    for (i, &b) in bases.iter().enumerate() {
        key |= code_at(b, i, policy)? << (2 * i);
    }
    Ok(key)
}

/// Reverse-complement a key (lower `2k` bits used).
#[inline]
pub fn revcomp_key(key: u64, k: usize) -> u64 {
    debug_assert!((1..=MAX_K).contains(&k));
    let mut rc = 0u64;
    for i in 0..k {
        let comp = ((key >> (2 * i)) & 0b11) ^ 0b11;
        rc |= comp << (2 * (k - 1 - i));
    }
    rc
}

/// Canonical form of an already-encoded key.
#[inline]
pub fn canonical_of(key: u64, k: usize) -> u64 {
    key.min(revcomp_key(key, k))
}

/// Canonical key of `k` bases: the smaller of the forward and the
/// reverse-complement encodings. Computed in one pass without allocating.
pub fn canonical_key(bases: &[u8], k: usize, policy: SymbolPolicy) -> Result<u64> {
    check_len(bases, k)?;
    let mut fwd = 0u64;
    let mut rc = 0u64;
    for (i, &b) in bases.iter().enumerate() {
        let v = code_at(b, i, policy)?;
        fwd |= v << (2 * i);
        rc |= (v ^ 0b11) << (2 * (k - 1 - i));
    }
    Ok(fwd.min(rc))
}

/// Reverse complement of `bases` as upper-case ASCII.
pub fn reverse_complement(bases: &[u8], policy: SymbolPolicy) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bases.len());
    reverse_complement_into(bases, policy, &mut out)?;
    Ok(out)
}

/// Like [`reverse_complement`], writing into a reusable buffer.
///
/// `out` is cleared first. On error its contents are unspecified.
pub fn reverse_complement_into(
    bases: &[u8],
    policy: SymbolPolicy,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    out.reserve(bases.len());
    for (i, &b) in bases.iter().enumerate().rev() {
        let v = code_at(b, i, policy)?;
        out.push(BASES[(v ^ 0b11) as usize]);
    }
    Ok(())
}

/// Decode the lower `2k` bits of `key` back into bases.
pub fn decode_kmer(key: u64, k: usize) -> String {
    (0..k.min(MAX_K))
        .map(|i| BASES[((key >> (2 * i)) & 0b11) as usize] as char)
        .collect()
}
