use super::{Device, DeviceBuffer, DevicePtr, Stream};
use crate::error::{Result, TensorError};
use crate::lod::Lod;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// An f32 tensor resident in device memory, optionally sequence-packed.
///
/// A tensor may exist before it has storage: operator outputs start empty and
/// receive a buffer the first time a kernel asks for mutable data.
#[derive(Debug, Default)]
pub struct DeviceTensor {
    buffer: Option<DeviceBuffer<f32>>,
    shape: Shape,
    lod: Option<Lod>,
}

impl DeviceTensor {
    /// A tensor with no storage and an empty shape.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Upload a host tensor. Only f32 data can live on the device.
    pub fn from_host(tensor: &Tensor, device: &Device) -> Result<Self> {
        if !tensor.dtype().is_device_supported() {
            return Err(TensorError::UnsupportedDType(format!(
                "{} tensors cannot be uploaded to the device",
                tensor.dtype()
            )));
        }
        let data = tensor.storage().as_f32_slice()?;
        Ok(DeviceTensor {
            buffer: Some(device.upload(data)?),
            shape: tensor.shape().clone(),
            lod: tensor.lod().cloned(),
        })
    }

    /// Logical shape of the data.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of elements in the logical shape.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// The sequence offset list, if this tensor is sequence-packed.
    pub fn lod(&self) -> Option<&Lod> {
        self.lod.as_ref()
    }

    /// Replace the sequence offset list.
    pub fn set_lod(&mut self, lod: Option<Lod>) {
        self.lod = lod;
    }

    /// Whether storage has been allocated.
    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    /// Device address of the tensor data, for reading.
    pub fn data_ptr(&self) -> Result<DevicePtr> {
        self.buffer
            .as_ref()
            .map(DeviceBuffer::ptr)
            .ok_or_else(|| TensorError::Other("tensor has no device storage".to_string()))
    }

    /// Resize the tensor to `shape` and return the address of its data, for
    /// writing on `stream`.
    ///
    /// Existing storage is reused when it lives on `device` and is large
    /// enough; otherwise a new buffer is allocated there. Either way the
    /// storage is bound to `stream`, so a replaced buffer is released after
    /// the work already queued on it. Contents are unspecified afterwards.
    pub fn mutable_data(
        &mut self,
        device: &Device,
        stream: &Stream,
        shape: Shape,
    ) -> Result<DevicePtr> {
        if !device.owns_stream(stream) {
            return Err(TensorError::Other(format!(
                "stream {} belongs to another device",
                stream.id()
            )));
        }
        let needed = shape.numel();
        let reusable = self
            .buffer
            .as_ref()
            .is_some_and(|b| b.len() >= needed && b.device().same_device(device));
        if !reusable {
            if let Some(mut old) = self.buffer.take() {
                if old.device().same_device(device) {
                    old.bind_stream(stream)?;
                }
            }
            self.buffer = Some(device.alloc::<f32>(needed)?);
        }
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.bind_stream(stream)?;
        }
        self.shape = shape;
        self.data_ptr()
    }

    /// Capacity of the underlying storage, in elements.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, DeviceBuffer::len)
    }

    /// Synchronously read the tensor back to the host.
    ///
    /// Pending stream work that writes this tensor must be synchronized
    /// first.
    pub fn to_host(&self) -> Result<Tensor> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| TensorError::Other("tensor has no device storage".to_string()))?;
        let data = buffer.device().download::<f32>(buffer.ptr(), self.numel())?;
        let tensor = Tensor::new(data, self.shape.clone());
        Ok(match &self.lod {
            Some(lod) => tensor.with_lod(lod.clone())?,
            None => tensor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_lod() {
        let device = Device::new();
        let lod = Lod::aligned(2, 1).unwrap();
        let host = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]))
            .with_lod(lod.clone())
            .unwrap();
        let dev = DeviceTensor::from_host(&host, &device).unwrap();
        assert_eq!(dev.lod(), Some(&lod));
        let back = dev.to_host().unwrap();
        assert_eq!(back.data_f32(), host.data_f32());
        assert_eq!(back.lod(), Some(&lod));
    }

    #[test]
    fn test_f16_rejected() {
        let device = Device::new();
        let host = Tensor::from_f16(vec![half::f16::ONE; 2], Shape::new(vec![1, 2]));
        assert!(matches!(
            DeviceTensor::from_host(&host, &device),
            Err(TensorError::UnsupportedDType(_))
        ));
    }

    #[test]
    fn test_mutable_data_reuses_storage() {
        let device = Device::new();
        let stream = device.create_stream();
        let mut t = DeviceTensor::empty();
        assert!(!t.is_allocated());
        assert!(t.data_ptr().is_err());

        let first = t.mutable_data(&device, &stream, Shape::new(vec![4, 3])).unwrap();
        assert_eq!(t.capacity(), 12);
        let second = t.mutable_data(&device, &stream, Shape::new(vec![2, 3])).unwrap();
        assert_eq!(first, second);
        assert_eq!(t.shape().dims(), &[2, 3]);

        let third = t.mutable_data(&device, &stream, Shape::new(vec![5, 3])).unwrap();
        assert_ne!(first, third);
        // The replaced buffer is released on the stream.
        stream.synchronize().unwrap();
        assert_eq!(device.allocation_count(), 1);
    }

    #[test]
    fn test_mutable_data_reallocates_on_other_device() {
        let home = Device::new();
        let away = Device::new();
        let host = Tensor::new(vec![1.0; 6], Shape::new(vec![3, 2]));
        let mut t = DeviceTensor::from_host(&host, &home).unwrap();

        let stream = away.create_stream();
        t.mutable_data(&away, &stream, Shape::new(vec![3, 2])).unwrap();
        assert_eq!(home.allocation_count(), 0);
        assert_eq!(away.allocation_count(), 1);

        // Writes through the new pointer land in the right arena.
        let ptr = t.data_ptr().unwrap();
        stream
            .enqueue("fill", move |mem| {
                mem.write::<f32>(ptr, 6)?.fill(2.0);
                Ok(())
            })
            .unwrap();
        stream.synchronize().unwrap();
        assert_eq!(t.to_host().unwrap().data_f32(), &[2.0; 6]);
    }

    #[test]
    fn test_mutable_data_rejects_foreign_stream() {
        let device = Device::new();
        let other = Device::new();
        let mut t = DeviceTensor::empty();
        assert!(t
            .mutable_data(&device, &other.create_stream(), Shape::new(vec![2, 2]))
            .is_err());
        assert!(!t.is_allocated());
        assert_eq!(device.allocation_count(), 0);
    }
}
