use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use super::memory::{DeviceElement, DeviceMemory};
use super::{lock, DevicePtr};
use crate::error::{Result, TensorError};

type StreamOp = Box<dyn FnOnce(&mut DeviceMemory) -> Result<()> + Send>;
type HostFn = Box<dyn FnOnce() + Send>;

enum Command {
    Op { label: &'static str, op: StreamOp },
    /// Host callback in stream order; does not touch device memory.
    Host { label: &'static str, f: HostFn },
    /// Reply once everything before it ran, handing back the deferred error.
    Fence(Sender<Option<TensorError>>),
    /// Reply once everything before it ran, leaving the deferred error set.
    Drain(Sender<()>),
    /// Release an allocation. Runs even after a failed operation.
    Free(DevicePtr),
}

pub(crate) struct StreamShared {
    id: usize,
    memory: Arc<Mutex<DeviceMemory>>,
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl Drop for StreamShared {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued work and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("stream {} worker panicked", self.id);
            }
        }
    }
}

/// An in-order queue of device work.
///
/// Operations enqueued on a stream run one at a time, in submission order,
/// on a dedicated worker thread. Enqueueing never waits for device work.
/// An operation that fails records a deferred error; later operations on
/// the stream are skipped until [`Stream::synchronize`] reports it, the way
/// an accelerator context is poisoned by a failed launch.
///
/// Cloning a `Stream` yields another handle to the same queue.
#[derive(Clone)]
pub struct Stream {
    shared: Arc<StreamShared>,
}

impl Stream {
    pub(crate) fn spawn(id: usize, memory: Arc<Mutex<DeviceMemory>>) -> Stream {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("seqmm-stream-{}", id))
            .spawn({
                let memory = memory.clone();
                move || run_worker(id, receiver, memory)
            })
            .ok();
        let worker_id = worker
            .as_ref()
            .map(|w| w.thread().id())
            .unwrap_or_else(|| thread::current().id());
        if worker.is_none() {
            log::warn!("failed to spawn worker for stream {}", id);
        }
        Stream {
            shared: Arc::new(StreamShared {
                id,
                memory,
                sender: worker.as_ref().map(|_| sender),
                worker,
                worker_id,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<StreamShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<StreamShared>) -> Option<Stream> {
        weak.upgrade().map(|shared| Stream { shared })
    }

    /// Whether this stream executes against `memory`.
    pub(crate) fn uses_memory(&self, memory: &Arc<Mutex<DeviceMemory>>) -> bool {
        Arc::ptr_eq(&self.shared.memory, memory)
    }

    /// Identifier of this stream, unique per device.
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Enqueue an operation against device memory.
    ///
    /// The closure must only capture addresses, never owning buffers: a
    /// buffer freed on the worker thread would wait on its own stream.
    pub fn enqueue<F>(&self, label: &'static str, op: F) -> Result<()>
    where
        F: FnOnce(&mut DeviceMemory) -> Result<()> + Send + 'static,
    {
        log::trace!("stream {}: enqueue {}", self.id(), label);
        self.send(Command::Op {
            label,
            op: Box::new(op),
        })
    }

    /// Enqueue a host callback that runs once all earlier work on the stream
    /// has run. Later work on the stream waits for it to return.
    ///
    /// The callback has no access to device memory, so other streams keep
    /// running while it executes.
    pub fn enqueue_host<F>(&self, label: &'static str, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        log::trace!("stream {}: enqueue host {}", self.id(), label);
        self.send(Command::Host {
            label,
            f: Box::new(f),
        })
    }

    /// Enqueue a host-to-device copy of `src` into the `src.len()` elements
    /// starting at `dst`.
    ///
    /// `src` is staged at enqueue time, so the caller may reuse or mutate its
    /// host buffer as soon as this returns.
    pub fn memcpy_htod_async<T: DeviceElement>(&self, src: &[T], dst: DevicePtr) -> Result<()> {
        let staged = src.to_vec();
        self.enqueue("memcpy_htod", move |mem| {
            mem.write::<T>(dst, staged.len())?.copy_from_slice(&staged);
            Ok(())
        })
    }

    /// Release the allocation at `ptr` after all work enqueued so far.
    ///
    /// The host does not wait. Unlike other operations the release still
    /// happens when an earlier operation on the stream failed.
    pub fn free_async(&self, ptr: DevicePtr) -> Result<()> {
        log::trace!("stream {}: enqueue free {:?}", self.id(), ptr);
        self.send(Command::Free(ptr))
    }

    /// Block until all previously enqueued work has run.
    ///
    /// Returns the first error recorded since the previous synchronize and
    /// clears it.
    pub fn synchronize(&self) -> Result<()> {
        let (reply, done) = mpsc::channel();
        self.send(Command::Fence(reply))?;
        match done.recv() {
            Ok(None) => Ok(()),
            Ok(Some(err)) => Err(err),
            Err(_) => Err(self.closed()),
        }
    }

    /// Wait for queued work without consuming the deferred error. A no-op on
    /// the stream's own worker thread.
    pub(crate) fn drain(&self) {
        if thread::current().id() == self.shared.worker_id {
            return;
        }
        let (reply, done) = mpsc::channel();
        if self.send(Command::Drain(reply)).is_ok() {
            let _ = done.recv();
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.shared
            .sender
            .as_ref()
            .ok_or_else(|| self.closed())?
            .send(command)
            .map_err(|_| self.closed())
    }

    fn closed(&self) -> TensorError {
        TensorError::StreamFailure {
            stream: self.id(),
            message: "stream worker is not running".to_string(),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("id", &self.id()).finish()
    }
}

fn run_worker(id: usize, commands: Receiver<Command>, memory: Arc<Mutex<DeviceMemory>>) {
    let mut deferred: Option<TensorError> = None;
    for command in commands {
        match command {
            Command::Op { label, op } => {
                if deferred.is_some() {
                    log::trace!("stream {}: skip {} after earlier failure", id, label);
                    continue;
                }
                let mut mem = lock(&memory);
                if let Err(err) = op(&mut mem) {
                    log::debug!("stream {}: {} failed: {}", id, label, err);
                    deferred = Some(err);
                }
            }
            Command::Host { label, f } => {
                if deferred.is_some() {
                    log::trace!("stream {}: skip {} after earlier failure", id, label);
                    continue;
                }
                f();
            }
            Command::Fence(reply) => {
                let _ = reply.send(deferred.take());
            }
            Command::Drain(reply) => {
                let _ = reply.send(());
            }
            Command::Free(ptr) => {
                if let Err(err) = lock(&memory).free(ptr) {
                    log::warn!("stream {}: failed to free {:?}: {}", id, ptr, err);
                }
            }
        }
    }
}
