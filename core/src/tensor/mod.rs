//! Tensors and strided views.
//!
//! # Views vs. Tensors
//!
//! A [`TensorView`] describes how to read an N-dimensional array out of a flat buffer it does
//! not own: a **shape** (size of each dimension), **strides** (how many elements to step in the
//! buffer to advance one position along each dimension) and a base **offset**. Strides are
//! signed, so a view can walk a buffer backwards, and they need not be row-major, so a view can
//! describe a transposed or sliced tensor without copying anything.
//!
//! A [`Tensor`] is an owned, row-major buffer. Layers return their results as tensors; callers
//! read them back through [`Tensor::view`].
//!
//! ```rust
//! use pool1d_rs::tensor::TensorView;
//!
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//!
//! // Row-major [2, 3]
//! let view = TensorView::contiguous(&data, &[2, 3]).unwrap();
//! assert_eq!(view.element_at(&[1, 0]).unwrap(), 4.0);
//!
//! // The same buffer read as its [3, 2] transpose
//! let transposed = TensorView::new(&data, &[3, 2], &[1, 3]).unwrap();
//! assert_eq!(transposed.element_at(&[0, 1]).unwrap(), 4.0);
//! ```
//!
//! `pool1d-rs` uses **Row-Major** (C-style) layout for everything it allocates. The last
//! dimension changes the fastest in memory.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use pool1d_rs_kernels::KernelError;
use std::fmt::Debug;
use thiserror::Error;

pub mod view;

pub use view::{TensorView, TensorViewMut};

/// Error type for Tensor operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// The shape of the data does not match the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// An index is out of bounds for the given shape.
    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },
    /// The layer parameters cannot describe a pooling.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Some pooling window covers only padding.
    #[error(
        "Degenerate window at output {output_index}: window starting at {window_start} with \
         kernel size {kernel_size} covers no element of an input of length {input_len}"
    )]
    DegenerateWindow {
        output_index: usize,
        window_start: isize,
        kernel_size: usize,
        input_len: usize,
    },
    /// Max pooling backward was called without the selection recorded by forward.
    #[error("Max pooling backward requires the selection recorded by the forward pass")]
    MissingSelection,
}

impl From<KernelError> for TensorError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::ShapeMismatch { expected, got } => {
                TensorError::ShapeMismatch { expected, got }
            }
            KernelError::InvalidConfiguration(msg) => TensorError::InvalidConfiguration(msg),
            KernelError::DegenerateWindow {
                output_index,
                window_start,
                kernel_size,
                input_len,
            } => TensorError::DegenerateWindow {
                output_index,
                window_start,
                kernel_size,
                input_len,
            },
            KernelError::MissingSelection => TensorError::MissingSelection,
            KernelError::SelectionOutOfRange {
                index, input_len, ..
            } => TensorError::IndexOutOfBounds {
                index: vec![index],
                shape: vec![input_len],
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Trait bound for elements that can be stored in a Tensor.
///
/// # Requirements
/// - `Copy + Clone`: Essential for efficient storage in contiguous memory (e.g., `Vec<T>`) and fast element access.
/// - `Num + ...`: Provides necessary numeric operations for pooling.
/// - `Send + Sync`: Required for parallel execution via `rayon`.
pub trait TensorElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> TensorElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// An owned, row-major tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<T>
where
    T: TensorElem,
{
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T>
where
    T: TensorElem,
{
    /// Creates a new Tensor from a vector of data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not match the product of `shape`.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a new Tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self {
            data: vec![T::zero(); size],
            shape,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major strides of this tensor.
    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.shape)
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements in the tensor.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns a reference to the underlying data as a slice.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consumes the tensor and returns its buffer.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Borrows the tensor as a read-only view.
    pub fn view(&self) -> TensorView<'_, T> {
        TensorView::from_contiguous_parts(&self.data, self.shape.clone())
    }

    /// Borrows the tensor as a writable view.
    pub fn view_mut(&mut self) -> TensorViewMut<'_, T> {
        TensorViewMut::from_contiguous_parts(&mut self.data, self.shape.clone())
    }
}

/// Computes row-major strides for a given shape.
///
/// Strides represent the number of elements to skip in memory to move to the next element
/// along a specific dimension.
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}
