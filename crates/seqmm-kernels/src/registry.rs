use crate::error::{ConfigError, Result};
use crate::kernel::{DataLayout, Kernel, KernelKey, Precision, Target};
use crate::kernels::search_aligned_mat_mul::{self, SearchAlignedMatMulKernel};
use crate::param::MatMulParam;

/// Constructor stored in a registration.
pub type KernelFactory<P> = fn() -> Box<dyn Kernel<Param = P>>;

/// A kernel implementation together with its key and tensor bindings.
pub struct KernelRegistration<P> {
    pub key: KernelKey,
    /// Names of the input tensor slots, in binding order.
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
    pub factory: KernelFactory<P>,
}

impl<P> std::fmt::Debug for KernelRegistration<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelRegistration")
            .field("key", &self.key)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Kernel implementations for operators sharing one parameter type.
pub struct KernelRegistry<P> {
    registrations: Vec<KernelRegistration<P>>,
}

impl<P> Default for KernelRegistry<P> {
    fn default() -> Self {
        KernelRegistry {
            registrations: Vec::new(),
        }
    }
}

impl<P> std::fmt::Debug for KernelRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.registrations).finish()
    }
}

impl<P> KernelRegistry<P> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kernel factory. Fails if its key is already taken.
    pub fn register(&mut self, registration: KernelRegistration<P>) -> Result<()> {
        if self.registrations.iter().any(|r| r.key == registration.key) {
            return Err(ConfigError::DuplicateKernel(registration.key.to_string()).into());
        }
        log::debug!("registered kernel {}", registration.key);
        self.registrations.push(registration);
        Ok(())
    }

    /// The registration serving `key`: an exact match if one exists,
    /// otherwise the first registration whose wildcards cover it.
    pub fn lookup(&self, key: &KernelKey) -> Option<&KernelRegistration<P>> {
        self.registrations
            .iter()
            .find(|r| r.key == *key)
            .or_else(|| self.registrations.iter().find(|r| r.key.matches(key)))
    }

    /// Instantiate the kernel for an operator on the given target.
    pub fn create(
        &self,
        op_type: &str,
        target: Target,
        precision: Precision,
        layout: DataLayout,
    ) -> Result<Box<dyn Kernel<Param = P>>> {
        let key = KernelKey::new(op_type, target, precision, layout);
        let registration = self
            .lookup(&key)
            .ok_or_else(|| ConfigError::KernelNotFound(key.to_string()))?;
        Ok((registration.factory)())
    }

    /// Every registration, in insertion order.
    pub fn registrations(&self) -> &[KernelRegistration<P>] {
        &self.registrations
    }
}

fn create_search_aligned_mat_mul() -> Box<dyn Kernel<Param = MatMulParam>> {
    Box::new(SearchAlignedMatMulKernel::new())
}

/// Install the kernels this crate provides.
pub fn register_builtin_kernels(registry: &mut KernelRegistry<MatMulParam>) -> Result<()> {
    registry.register(KernelRegistration {
        key: KernelKey::new(
            search_aligned_mat_mul::OP_TYPE,
            Target::Cuda,
            Precision::Float,
            DataLayout::Nchw,
        ),
        inputs: vec!["X", "Y"],
        outputs: vec!["Out"],
        factory: create_search_aligned_mat_mul,
    })
}
