use seqmm_tensor::{DevicePtr, DeviceTensor, Lod, Shape};

use crate::error::{Result, ShapeError};

/// Per-operand geometry of an aligned, sequence-packed 2-D tensor.
///
/// The tensor is `[sequence_count * batch_size, inner_size]`; each sequence
/// is a `batch_size x inner_size` row-major block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDescriptor {
    pub sequence_count: usize,
    /// Rows per sequence, taken from the first offset delta.
    pub batch_size: usize,
    /// Columns, i.e. `shape[1]`.
    pub inner_size: usize,
}

impl SequenceDescriptor {
    /// Read the descriptor of operand `operand` (used in error messages).
    pub fn read(operand: &'static str, tensor: &DeviceTensor) -> Result<Self> {
        let lod = tensor.lod().ok_or(ShapeError::MissingLod { operand })?;
        Self::from_parts(operand, tensor.shape(), lod)
    }

    /// Derive the descriptor from a shape and offset list.
    ///
    /// Alignment is assumed, not checked: the batch size is the length of the
    /// first sequence.
    pub fn from_parts(operand: &'static str, shape: &Shape, lod: &Lod) -> Result<Self> {
        if shape.ndim() != 2 {
            return Err(ShapeError::Rank {
                operand,
                rank: shape.ndim(),
            }
            .into());
        }
        let sequence_count = lod.sequence_count();
        let batch_size = lod
            .sequence_len(0)
            .ok_or(ShapeError::NoSequences { operand })?;
        let inner_size = shape.dim(1);
        if inner_size == 0 {
            return Err(ShapeError::EmptyRows { operand }.into());
        }
        if lod.total_len() != shape.dim(0) {
            return Err(ShapeError::LodRowMismatch {
                operand,
                rows: shape.dim(0),
                covered: lod.total_len(),
            }
            .into());
        }

        Ok(SequenceDescriptor {
            sequence_count,
            batch_size,
            inner_size,
        })
    }

    /// Elements in one sequence's block.
    pub fn per_sequence_elements(&self) -> usize {
        self.batch_size * self.inner_size
    }
}

/// A contiguous run of f32 elements in device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    pub ptr: DevicePtr,
    pub len: usize,
}

/// Index-addressed view of `count` equally strided sequences inside one
/// device buffer of `len` f32 elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceView {
    base: DevicePtr,
    len: usize,
    stride: usize,
    count: usize,
}

impl SequenceView {
    /// A view of `count` sequences of `stride` elements starting at `base`.
    ///
    /// Fails unless all of them fit within the `len` elements of the buffer.
    pub fn new(base: DevicePtr, len: usize, stride: usize, count: usize) -> Result<Self> {
        let fits = stride
            .checked_mul(count)
            .is_some_and(|needed| needed <= len);
        if !fits {
            return Err(ShapeError::SequenceOutOfBounds {
                index: count.saturating_sub(1),
                stride,
                len,
            }
            .into());
        }
        Ok(SequenceView {
            base,
            len,
            stride,
            count,
        })
    }

    /// Number of sequences in the view.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Elements per sequence.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The sub-range holding sequence `index`.
    pub fn get(&self, index: usize) -> Result<SubRange> {
        if index >= self.count {
            return Err(ShapeError::SequenceOutOfBounds {
                index,
                stride: self.stride,
                len: self.len,
            }
            .into());
        }
        Ok(SubRange {
            ptr: self.base.offset::<f32>(index * self.stride),
            len: self.stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    #[test]
    fn test_read_aligned() {
        let lod = Lod::aligned(2, 3).unwrap();
        let d = SequenceDescriptor::from_parts("X", &Shape::new(vec![6, 4]), &lod).unwrap();
        assert_eq!(
            d,
            SequenceDescriptor {
                sequence_count: 2,
                batch_size: 3,
                inner_size: 4
            }
        );
        assert_eq!(d.per_sequence_elements(), 12);
    }

    #[test]
    fn test_batch_size_from_first_sequence() {
        let lod = Lod::new(vec![0, 2, 5]).unwrap();
        let d = SequenceDescriptor::from_parts("X", &Shape::new(vec![5, 1]), &lod).unwrap();
        assert_eq!(d.batch_size, 2);
    }

    #[test]
    fn test_missing_lod() {
        let t = DeviceTensor::empty();
        assert_eq!(
            SequenceDescriptor::read("Y", &t),
            Err(KernelError::Shape(ShapeError::MissingLod { operand: "Y" }))
        );
    }

    #[test]
    fn test_rank_must_be_two() {
        let lod = Lod::aligned(1, 2).unwrap();
        assert!(matches!(
            SequenceDescriptor::from_parts("X", &Shape::new(vec![2, 2, 2]), &lod),
            Err(KernelError::Shape(ShapeError::Rank { rank: 3, .. }))
        ));
    }

    #[test]
    fn test_no_sequences() {
        let lod = Lod::new(vec![0]).unwrap();
        assert!(matches!(
            SequenceDescriptor::from_parts("X", &Shape::new(vec![0, 2]), &lod),
            Err(KernelError::Shape(ShapeError::NoSequences { .. }))
        ));
    }

    #[test]
    fn test_lod_row_mismatch() {
        let lod = Lod::aligned(2, 2).unwrap();
        assert!(matches!(
            SequenceDescriptor::from_parts("X", &Shape::new(vec![5, 2]), &lod),
            Err(KernelError::Shape(ShapeError::LodRowMismatch { .. }))
        ));
    }

    #[test]
    fn test_view_addresses() {
        let base = DevicePtr::new(0x1000);
        let view = SequenceView::new(base, 24, 12, 2).unwrap();
        assert_eq!(view.get(0).unwrap().ptr, base);
        assert_eq!(view.get(1).unwrap().ptr, DevicePtr::new(0x1000 + 12 * 4));
        assert_eq!(view.get(1).unwrap().len, 12);
    }

    #[test]
    fn test_view_must_fit_buffer() {
        assert_eq!(
            SequenceView::new(DevicePtr::new(0x1000), 20, 12, 2),
            Err(KernelError::Shape(ShapeError::SequenceOutOfBounds {
                index: 1,
                stride: 12,
                len: 20
            }))
        );
        assert!(SequenceView::new(DevicePtr::new(0x1000), 8, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_view_index_bounds() {
        let view = SequenceView::new(DevicePtr::new(0x1000), 36, 12, 2).unwrap();
        assert!(view.get(1).is_ok());
        assert!(matches!(
            view.get(2),
            Err(KernelError::Shape(ShapeError::SequenceOutOfBounds { index: 2, .. }))
        ));
    }
}
