use std::fmt;

/// Dimension sizes of a row-major tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a shape from its dimensions, outermost first.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count. A rank-0 shape holds one element.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Size of axis `i`. Panics past the last axis; see [`get`](Self::get).
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Size of dimension `i`, or `None` if out of range.
    pub fn get(&self, i: usize) -> Option<usize> {
        self.dims.get(i).copied()
    }

    /// All dimensions, outermost first.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Elements per axis-0 row: `inner` for a packed `[rows, inner]` tensor.
    pub fn row_numel(&self) -> usize {
        self.dims.iter().skip(1).product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}
