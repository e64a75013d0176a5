//! A host-simulated accelerator.
//!
//! Device memory is an arena of typed allocations addressed by opaque 64-bit
//! [`DevicePtr`]s. Work is submitted to [`Stream`]s, which execute it in
//! submission order on a worker thread, asynchronously with respect to the
//! submitting thread. This mirrors the execution model of CUDA-style
//! accelerators closely enough for stream-ordered kernels to be written and
//! tested against it.

mod buffer;
mod memory;
mod stream;
mod tensor;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub use buffer::DeviceBuffer;
pub use memory::{Allocation, DeviceElement, DeviceMemory};
pub use stream::Stream;
pub use tensor::DeviceTensor;

use crate::error::Result;
use stream::StreamShared;

/// An address in device memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DevicePtr(u64);

impl DevicePtr {
    pub const fn new(addr: u64) -> Self {
        DevicePtr(addr)
    }

    pub const fn null() -> Self {
        DevicePtr(0)
    }

    /// Whether this is the null address.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The raw 64-bit address.
    pub fn addr(&self) -> u64 {
        self.0
    }

    /// The address `elements` elements of type `T` past this one.
    pub fn offset<T: DeviceElement>(self, elements: usize) -> Self {
        DevicePtr(self.0 + (elements * T::SIZE) as u64)
    }
}

impl fmt::Debug for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePtr({:#x})", self.0)
    }
}

/// Device construction options.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Upper bound on allocated bytes. `None` means unlimited.
    pub capacity_bytes: Option<usize>,
}

struct DeviceInner {
    memory: Arc<Mutex<DeviceMemory>>,
    streams: Mutex<Vec<Weak<StreamShared>>>,
    next_stream_id: AtomicUsize,
}

/// Cloneable handle to a simulated accelerator.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Create a device with unlimited memory.
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default())
    }

    /// Create a device with the given limits.
    pub fn with_config(config: DeviceConfig) -> Self {
        Device {
            inner: Arc::new(DeviceInner {
                memory: Arc::new(Mutex::new(DeviceMemory::new(config.capacity_bytes))),
                streams: Mutex::new(Vec::new()),
                next_stream_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a new compute stream on this device.
    pub fn create_stream(&self) -> Stream {
        let mut streams = lock(&self.inner.streams);
        streams.retain(|s| s.strong_count() > 0);
        let id = self.inner.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let stream = Stream::spawn(id, self.inner.memory.clone());
        streams.push(stream.downgrade());
        stream
    }

    /// Allocate `len` zero-initialized elements.
    pub fn alloc<T: DeviceElement>(&self, len: usize) -> Result<DeviceBuffer<T>> {
        let ptr = self.memory().alloc(vec![T::default(); len])?;
        Ok(DeviceBuffer::from_raw(self.clone(), ptr, len))
    }

    /// Synchronously copy host data into a fresh allocation.
    pub fn upload<T: DeviceElement>(&self, data: &[T]) -> Result<DeviceBuffer<T>> {
        let ptr = self.memory().alloc(data.to_vec())?;
        Ok(DeviceBuffer::from_raw(self.clone(), ptr, data.len()))
    }

    /// Synchronously copy `len` elements starting at `ptr` back to the host.
    ///
    /// Does not wait for pending stream work; synchronize the producing
    /// stream first.
    pub fn download<T: DeviceElement>(&self, ptr: DevicePtr, len: usize) -> Result<Vec<T>> {
        Ok(self.memory().read::<T>(ptr, len)?.to_vec())
    }

    /// Free the allocation starting at `ptr`.
    ///
    /// Like `cudaFree`, this first waits for all outstanding work on every
    /// stream of the device, so in-flight work never observes freed memory.
    /// Deferred stream errors are left in place for the stream's owner.
    /// Buffers bound to a stream avoid the wait; see
    /// [`DeviceBuffer::bind_stream`].
    pub fn free(&self, ptr: DevicePtr) -> Result<()> {
        let streams: Vec<Stream> = lock(&self.inner.streams)
            .iter()
            .filter_map(Stream::upgrade)
            .collect();
        for stream in &streams {
            stream.drain();
        }
        self.memory().free(ptr)
    }

    /// Whether `self` and `other` are handles to the same device.
    pub fn same_device(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `stream` was created on this device.
    pub fn owns_stream(&self, stream: &Stream) -> bool {
        stream.uses_memory(&self.inner.memory)
    }

    /// Bytes currently allocated on the device.
    pub fn used_bytes(&self) -> usize {
        self.memory().used_bytes()
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.memory().allocation_count()
    }

    fn memory(&self) -> MutexGuard<'_, DeviceMemory> {
        lock(&self.inner.memory)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

/// Device state stays consistent across a panicking stream op, so a poisoned
/// lock is recovered rather than propagated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
