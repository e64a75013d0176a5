use std::fmt;
use std::marker::PhantomData;

use super::{Device, DeviceElement, DevicePtr, Stream};
use crate::error::{Result, TensorError};

/// An owned device allocation of `len` elements of `T`.
///
/// The allocation is freed when the buffer is dropped. An unbound buffer is
/// freed with [`Device::free`], which waits for every stream of the device.
/// A buffer bound to a stream is released on that stream instead, after the
/// work already queued there and without blocking the host.
pub struct DeviceBuffer<T: DeviceElement> {
    device: Device,
    ptr: DevicePtr,
    len: usize,
    stream: Option<Stream>,
    _marker: PhantomData<T>,
}

impl<T: DeviceElement> DeviceBuffer<T> {
    pub(crate) fn from_raw(device: Device, ptr: DevicePtr, len: usize) -> Self {
        DeviceBuffer {
            device,
            ptr,
            len,
            stream: None,
            _marker: PhantomData,
        }
    }

    /// Device address of the first element.
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The device holding the allocation.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The stream this buffer is released on, if bound.
    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    /// Release this buffer on `stream` when it is dropped.
    ///
    /// Only `stream` may access the buffer from then on; work on other
    /// streams must be synchronized before binding.
    pub fn bind_stream(&mut self, stream: &Stream) -> Result<()> {
        if !self.device.owns_stream(stream) {
            return Err(TensorError::Other(format!(
                "stream {} belongs to another device",
                stream.id()
            )));
        }
        self.stream = Some(stream.clone());
        Ok(())
    }

    /// Synchronously read the whole buffer back to the host.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.device.download(self.ptr, self.len)
    }
}

impl<T: DeviceElement> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        let freed = match self.stream.take() {
            Some(stream) => stream
                .free_async(self.ptr)
                .or_else(|_| self.device.free(self.ptr)),
            None => self.device.free(self.ptr),
        };
        if let Err(err) = freed {
            log::warn!("failed to free device buffer {:?}: {}", self.ptr, err);
        }
    }
}

impl<T: DeviceElement> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("kind", &T::KIND)
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("stream", &self.stream.as_ref().map(Stream::id))
            .finish()
    }
}
