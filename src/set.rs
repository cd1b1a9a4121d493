//! KmerSet: fixed-capacity open-addressing table over canonical 2-bit keys.
//!
//! The table is sized once from the expected entry count (`n * 4 / 3` slots)
//! and never grows. Collisions move to the next slot (wrapping at the end);
//! since there is no deletion, an empty slot always ends a collision run.

use crate::builder::SetConfig;
use crate::encode::{SymbolPolicy, canonical_key, canonical_of, check_k, key_mask};
use crate::error::{KmerError, Result, invalid};

/// Empty-slot sentinel. No canonical key equals `u64::MAX`: the only k-mer
/// encoding to it (32 x `T`) has the all-`A` reverse complement, key 0.
const EMPTY: u64 = u64::MAX;

/// Behaviour of [`KmerSet::insert`] for a key that is already present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertMode {
    /// Set semantics: a duplicate insert is a no-op.
    #[default]
    Dedup,
    /// Every insert takes a fresh slot, so slot usage matches input line count.
    Bag,
}

/// Canonical k-mer hash set.
#[derive(Clone, Debug)]
pub struct KmerSet {
    k: usize,
    count: usize,
    slots: Box<[u64]>,
    config: SetConfig,
}

impl KmerSet {
    /// Create an empty set with the default configuration.
    pub fn new(k: usize, expected_count: usize) -> Result<Self> {
        Self::with_config(k, expected_count, &SetConfig::default())
    }

    /// Create an empty set sized for `expected_count` entries.
    pub fn with_config(k: usize, expected_count: usize, config: &SetConfig) -> Result<Self> {
        check_k(k)?;
        let capacity = capacity_for(expected_count)?;
        Ok(KmerSet {
            k,
            count: 0,
            slots: vec![EMPTY; capacity].into_boxed_slice(),
            config: config.clone(),
        })
    }

    /// K-mer length.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Occupied fraction of the table.
    pub fn load_factor(&self) -> f64 {
        self.count as f64 / self.capacity() as f64
    }

    pub fn config(&self) -> &SetConfig {
        &self.config
    }

    #[inline]
    pub fn symbol_policy(&self) -> SymbolPolicy {
        self.config.symbol_policy()
    }

    /// Canonicalize `bases` for this set. `Ok(None)` when the skip policy
    /// drops a k-mer with a malformed symbol.
    fn key_of(&self, bases: &[u8]) -> Result<Option<u64>> {
        match canonical_key(bases, self.k, self.symbol_policy()) {
            Ok(key) => Ok(Some(key)),
            Err(KmerError::MalformedSymbol { .. })
                if self.symbol_policy() == SymbolPolicy::Skip =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert a k-mer (build phase). Returns `true` if a slot was taken.
    pub fn insert(&mut self, bases: &[u8]) -> Result<bool> {
        match self.key_of(bases)? {
            Some(key) => self.insert_key(key),
            None => Ok(false),
        }
    }

    /// Insert an already-canonical key.
    ///
    /// Keys with bits above `2k`, or that are not the canonical form for this
    /// set's `k`, are rejected with [`KmerError::InvalidArgument`]. The slot
    /// scan is bounded by `capacity`; a full table reports
    /// [`KmerError::Overflow`].
    pub fn insert_key(&mut self, key: u64) -> Result<bool> {
        if key > key_mask(self.k) || canonical_of(key, self.k) != key {
            return invalid(format!("key {key:#x} is not a canonical {}-mer", self.k));
        }
        let capacity = self.capacity();
        let dedup = self.config.insert_mode() == InsertMode::Dedup;
        if !dedup && self.count == capacity {
            return Err(KmerError::Overflow { capacity });
        }
        let mut pos = self.config.hash_policy().slot(key, capacity);
        for _ in 0..capacity {
            let slot = self.slots[pos];
            if slot == EMPTY {
                self.slots[pos] = key;
                self.count += 1;
                return Ok(true);
            }
            if dedup && slot == key {
                return Ok(false);
            }
            pos = next(pos, capacity);
        }
        Err(KmerError::Overflow { capacity })
    }

    /// Membership test for a k-mer or its reverse complement.
    pub fn contains(&self, bases: &[u8]) -> Result<bool> {
        Ok(match self.key_of(bases)? {
            Some(key) => self.contains_key(key),
            None => false,
        })
    }

    /// Membership test for an already-canonical key.
    pub fn contains_key(&self, key: u64) -> bool {
        if key == EMPTY {
            return false;
        }
        let capacity = self.capacity();
        let mut pos = self.config.hash_policy().slot(key, capacity);
        for _ in 0..capacity {
            match self.slots[pos] {
                EMPTY => return false,
                slot if slot == key => return true,
                _ => pos = next(pos, capacity),
            }
        }
        false
    }

    /// Occupied keys in slot order.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().copied().filter(|&s| s != EMPTY)
    }
}

#[inline]
fn next(pos: usize, capacity: usize) -> usize {
    let p = pos + 1;
    if p == capacity { 0 } else { p }
}

/// `expected_count * 4 / 3` slots, at least one.
pub fn capacity_for(expected_count: usize) -> Result<usize> {
    if expected_count == 0 {
        return invalid("expected k-mer count must be > 0");
    }
    let capacity = expected_count
        .checked_mul(4)
        .map(|n| n / 3)
        .ok_or_else(|| {
            KmerError::InvalidArgument(format!("expected count {expected_count} is too large"))
        })?;
    Ok(capacity.max(1))
}
