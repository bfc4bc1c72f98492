//! CPU kernels for 1D pooling.
//!
//! The kernels in this crate only know about flat, row-major buffers. A tensor of any rank is
//! viewed as `[outer, len, inner]`, where `len` is the pooled axis, `outer` is the product of
//! the dimensions before it and `inner` the product of the dimensions after it. Strided views and
//! layer bookkeeping live in the `pool1d-rs` crate.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod cpu_pool1d;
pub mod cpu_pool1d_backward;
pub mod geometry;

pub use cpu_pool1d::{Pool1dOutput, cpu_pool1d_forward};
pub use cpu_pool1d_backward::cpu_pool1d_backward;
pub use geometry::{NO_CONTRIBUTION, Pool1dGeometry, PoolingMethod, Window};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Invalid pooling configuration: {0}")]
    InvalidConfiguration(String),
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
    #[error("Max pooling backward requires the selection recorded by the forward pass")]
    MissingSelection,
    #[error("Selection entry {index} at position {position} is outside an input of length {input_len}")]
    SelectionOutOfRange {
        position: usize,
        index: usize,
        input_len: usize,
    },
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
/// This mirrors `TensorElem` in the main crate to avoid circular dependencies.
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
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
