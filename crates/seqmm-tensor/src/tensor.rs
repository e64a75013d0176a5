use crate::device::{Device, DeviceTensor};
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::lod::Lod;
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// Row-major host tensor, optionally sequence-packed along axis 0.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    lod: Option<Lod>,
}

impl Tensor {
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::F32(data), shape)
    }

    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f16(data: Vec<half::f16>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::F16(data), shape)
    }

    fn from_storage(storage: CpuStorage, shape: Shape) -> Self {
        assert_eq!(
            storage.len(),
            shape.numel(),
            "{} elements cannot fill shape {}",
            storage.len(),
            shape
        );
        Tensor {
            storage,
            shape,
            lod: None,
        }
    }

    /// An f32 tensor of `shape` filled with zeros.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Self::new(vec![0.0; n], shape)
    }

    /// Mark axis 0 as a concatenation of sequences. The offset list must
    /// cover exactly `shape[0]` rows.
    pub fn with_lod(mut self, lod: Lod) -> Result<Tensor> {
        let rows = self.shape.get(0).unwrap_or(0);
        if lod.total_len() != rows {
            return Err(TensorError::ShapeMismatch {
                expected: vec![lod.total_len()],
                got: vec![rows],
            });
        }
        self.lod = Some(lod);
        Ok(self)
    }

    /// Dimensions of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The sequence offset list, if axis 0 is packed.
    pub fn lod(&self) -> Option<&Lod> {
        self.lod.as_ref()
    }

    /// Element type of the underlying storage.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// The underlying host storage.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// # Panics
    /// Panics on half-precision tensors.
    pub fn data_f32(&self) -> &[f32] {
        match &self.storage {
            CpuStorage::F32(v) => v,
            CpuStorage::F16(_) => panic!("tensor holds {} data", self.dtype()),
        }
    }

    /// Rows of sequence `i`, flattened. `None` without an offset list, past
    /// the last sequence, or for non-f32 data.
    pub fn sequence_f32(&self, i: usize) -> Option<&[f32]> {
        let rows = self.lod.as_ref()?.range(i)?;
        let data = self.storage.as_f32_slice().ok()?;
        let row_len = self.shape.row_numel();
        data.get(rows.start * row_len..rows.end * row_len)
    }

    /// Upload to `device`. Only f32 tensors are accepted.
    pub fn to_device(&self, device: &Device) -> Result<DeviceTensor> {
        DeviceTensor::from_host(self, device)
    }
}
