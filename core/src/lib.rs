//! # pool1d-rs
//!
//! `pool1d-rs` is a pure Rust implementation of a 1D pooling layer: max, average and sum pooling
//! along any dimension of an N-dimensional tensor, with the matching backward pass.
//!
//! It runs on **CPU only**. The numeric kernels live in the `pool1d-rs-kernels` crate and are
//! parallelized with `rayon` across the slices that are not pooled.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: Owned tensors and strided, borrowed views.
//! - [`nn`]: Pooling parameters, the [`Pool1d`] layer and the [`Layer`] trait.
//!
//! ## Example
//!
//! ```rust
//! use pool1d_rs::nn::{Pool1d, PoolingMethod, PoolingParameters};
//! use pool1d_rs::tensor::TensorView;
//!
//! // [batch, channels, length] = [1, 2, 4], pooled along the length
//! let data = vec![1.0f32, 2.0, 3.0, 4.0, 8.0, 6.0, 4.0, 2.0];
//! let input = TensorView::contiguous(&data, &[1, 2, 4]).unwrap();
//!
//! let params = PoolingParameters::new(2, 2)
//!     .unwrap()
//!     .with_dimension_index(2)
//!     .with_method(PoolingMethod::Average);
//! let pool = Pool1d::configure(params).unwrap();
//!
//! let out = pool.forward(&input).unwrap();
//! assert_eq!(out.value.shape(), &[1, 2, 2]);
//! assert_eq!(out.value.data(), &[1.5, 3.5, 7.0, 3.0]);
//!
//! // Gradients flow back to the input shape
//! let grad = vec![1.0f32; 4];
//! let grad_view = TensorView::contiguous(&grad, &[1, 2, 2]).unwrap();
//! let saved = out.result_for_backward.unwrap();
//! let grad_input = pool.backward(&grad_view, saved).unwrap();
//! assert_eq!(grad_input.data(), &[0.5; 8]);
//! ```

pub mod nn;
pub mod tensor;

pub use nn::{Layer, Pool1d, PoolingMethod, PoolingParameters};
pub use tensor::{Tensor, TensorElem, TensorError, TensorView, TensorViewMut};
