use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// Element buffer of a host [`Tensor`](crate::Tensor).
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    F32(Vec<f32>),
    F16(Vec<half::f16>),
}

impl CpuStorage {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
        }
    }

    /// Whether the storage holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the stored vector.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
        }
    }

    /// Borrow f32 data; `DTypeMismatch` for any other element type.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v),
            CpuStorage::F16(_) => Err(TensorError::DTypeMismatch {
                expected: DType::F32.to_string(),
                got: self.dtype().to_string(),
            }),
        }
    }
}
