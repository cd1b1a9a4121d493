//! Home-slot selection for the open-addressing table.

/// Multiplier of the xor-shift-multiply mixer.
pub const MIX_MUL: u64 = 0x45d9f3b;

/// How a key is turned into its home slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashPolicy {
    /// Avalanche mix, then modulo capacity.
    #[default]
    Mixed,
    /// Raw key modulo capacity. Clusters badly on biased base composition.
    RawModulo,
}

/// xor-shift-multiply avalanche mix (wrapping arithmetic).
#[inline]
pub fn mix64(mut x: u64) -> u64 {
    x = ((x >> 16) ^ x).wrapping_mul(MIX_MUL);
    x = ((x >> 16) ^ x).wrapping_mul(MIX_MUL);
    x ^ (x >> 16)
}

impl HashPolicy {
    /// Home slot of `key` in a table of `capacity` slots. `capacity > 0`.
    #[inline]
    pub fn slot(self, key: u64, capacity: usize) -> usize {
        let h = match self {
            HashPolicy::Mixed => mix64(key),
            HashPolicy::RawModulo => key,
        };
        (h % capacity as u64) as usize
    }
}
