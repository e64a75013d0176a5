use std::ops::Range;

use crate::error::{Result, TensorError};

/// Offset list ("level of detail") describing sequence boundaries along axis 0
/// of a sequence-packed tensor.
///
/// Offsets are cumulative start positions: sequence `i` occupies rows
/// `offsets[i]..offsets[i + 1]`. The list always starts at 0, is strictly
/// increasing, and has `sequence_count + 1` entries.
///
/// For sequences of lengths `[3, 3, 3]` the offsets are `[0, 3, 6, 9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lod {
    offsets: Vec<usize>,
}

impl Lod {
    /// Create an offset list, validating that it starts at 0 and is strictly
    /// increasing.
    pub fn new(offsets: Vec<usize>) -> Result<Self> {
        let invalid = |reason: &str| TensorError::InvalidLod {
            offsets: offsets.clone(),
            reason: reason.to_string(),
        };

        match offsets.first() {
            None => return Err(invalid("offset list is empty")),
            Some(&first) if first != 0 => return Err(invalid("first offset must be 0")),
            Some(_) => {}
        }
        if offsets.windows(2).any(|w| w[1] <= w[0]) {
            return Err(invalid("offsets must be strictly increasing"));
        }

        Ok(Lod { offsets })
    }

    /// Offsets for `sequence_count` sequences of `sequence_len` rows each.
    pub fn aligned(sequence_count: usize, sequence_len: usize) -> Result<Self> {
        Lod::new((0..=sequence_count).map(|i| i * sequence_len).collect())
    }

    /// The raw offsets, starting at 0.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of sequences described by this list.
    pub fn sequence_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Row count of sequence `i`, or `None` if `i` is out of range.
    pub fn sequence_len(&self, i: usize) -> Option<usize> {
        let start = *self.offsets.get(i)?;
        let end = *self.offsets.get(i + 1)?;
        Some(end - start)
    }

    /// Row range of sequence `i`, or `None` if `i` is out of range.
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        Some(*self.offsets.get(i)?..*self.offsets.get(i + 1)?)
    }

    /// Total number of rows covered (the last offset).
    pub fn total_len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// True if every sequence has the same length.
    pub fn is_aligned(&self) -> bool {
        match self.sequence_len(0) {
            Some(first) => self.offsets.windows(2).all(|w| w[1] - w[0] == first),
            None => true,
        }
    }
}
