//! Strided views over borrowed buffers.
//!
//! A view never owns its buffer. The caller keeps ownership and must not mutate the buffer while
//! a read-only view of it is alive, which the borrow checker enforces.

use crate::tensor::{Result, TensorElem, TensorError, compute_strides};
use rayon::prelude::*;
use std::borrow::Cow;

/// Shape, strides and base offset shared by [`TensorView`] and [`TensorViewMut`].
#[derive(Clone, Debug, PartialEq, Eq)]
struct Layout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl Layout {
    /// Validates a layout against a buffer of `len` elements.
    ///
    /// Every addressable position must map inside `[0, len)`. A layout with a zero-sized
    /// dimension addresses nothing and is always valid.
    fn new(len: usize, shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![shape.len()],
                got: vec![strides.len()],
            });
        }

        let layout = Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
        };

        if shape.contains(&0) {
            return Ok(layout);
        }

        let too_small = || TensorError::ShapeMismatch {
            expected: shape.to_vec(),
            got: vec![len],
        };

        let mut lo = isize::try_from(offset).map_err(|_| too_small())?;
        let mut hi = lo;
        for (&dim, &stride) in shape.iter().zip(strides) {
            let extent = isize::try_from(dim - 1)
                .ok()
                .and_then(|d| d.checked_mul(stride))
                .ok_or_else(too_small)?;
            if extent >= 0 {
                hi = hi.checked_add(extent).ok_or_else(too_small)?;
            } else {
                lo = lo.checked_add(extent).ok_or_else(too_small)?;
            }
        }

        if lo < 0 || hi as usize >= len {
            return Err(too_small());
        }
        Ok(layout)
    }

    fn contiguous(shape: Vec<usize>) -> Self {
        let strides = compute_strides(&shape)
            .into_iter()
            .map(|s| s as isize)
            .collect();
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Buffer offset of a multi-dimensional index.
    fn offset_of(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, d)| i >= d) {
            return Err(TensorError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape.clone(),
            });
        }
        let pos = index
            .iter()
            .zip(&self.strides)
            .fold(self.offset as isize, |acc, (&i, &s)| acc + i as isize * s);
        Ok(pos as usize)
    }

    /// Buffer offset of the `flat`-th element in row-major order.
    fn flat_offset(&self, flat: usize) -> usize {
        let mut rem = flat;
        let mut pos = self.offset as isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            pos += (rem % dim) as isize * stride;
            rem /= dim;
        }
        pos as usize
    }

    /// Whether the view reads a dense row-major block starting at `offset`.
    fn is_contiguous(&self) -> bool {
        let mut expected = 1isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            if dim > 1 && stride != expected {
                return false;
            }
            expected *= dim as isize;
        }
        true
    }
}

/// A read-only, strided view over a borrowed buffer.
#[derive(Clone, Debug)]
pub struct TensorView<'a, T>
where
    T: TensorElem,
{
    data: &'a [T],
    layout: Layout,
}

impl<'a, T> TensorView<'a, T>
where
    T: TensorElem,
{
    /// Creates a view with explicit strides.
    ///
    /// # Arguments
    ///
    /// * `data` - The buffer to read from.
    /// * `shape` - Size of each dimension.
    /// * `strides` - Signed step, in elements, for each dimension.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if `shape` and `strides` have different lengths or
    /// if the view would read outside `data`.
    pub fn new(data: &'a [T], shape: &[usize], strides: &[isize]) -> Result<Self> {
        Self::with_offset(data, shape, strides, 0)
    }

    /// Creates a view whose first element sits at `offset` in `data`.
    pub fn with_offset(
        data: &'a [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = Layout::new(data.len(), shape, strides, offset)?;
        Ok(Self { data, layout })
    }

    /// Creates a row-major view covering all of `data`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not match the product of `shape`.
    pub fn contiguous(data: &'a [T], shape: &[usize]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }
        Ok(Self::from_contiguous_parts(data, shape.to_vec()))
    }

    pub(crate) fn from_contiguous_parts(data: &'a [T], shape: Vec<usize>) -> Self {
        Self {
            data,
            layout: Layout::contiguous(shape),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.layout.strides
    }

    pub fn offset(&self) -> usize {
        self.layout.offset
    }

    pub fn rank(&self) -> usize {
        self.layout.shape.len()
    }

    /// Number of addressable elements.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Reads one element.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if the number of indices differs from the rank or
    /// any index is not smaller than its dimension.
    pub fn element_at(&self, index: &[usize]) -> Result<T> {
        let pos = self.layout.offset_of(index)?;
        Ok(self.data[pos])
    }

    /// Returns the elements in row-major order.
    ///
    /// Borrows the buffer when the view is already a dense row-major block, otherwise gathers
    /// into a new buffer.
    pub fn to_contiguous(&self) -> Cow<'a, [T]> {
        let size = self.size();
        let data: &'a [T] = self.data;
        if size == 0 {
            return Cow::Owned(Vec::new());
        }
        if self.is_contiguous() {
            let start = self.layout.offset;
            return Cow::Borrowed(&data[start..start + size]);
        }
        let layout = &self.layout;
        Cow::Owned(
            (0..size)
                .into_par_iter()
                .map(|flat| data[layout.flat_offset(flat)])
                .collect(),
        )
    }
}

/// A writable, strided view over a borrowed buffer.
#[derive(Debug)]
pub struct TensorViewMut<'a, T>
where
    T: TensorElem,
{
    data: &'a mut [T],
    layout: Layout,
}

impl<'a, T> TensorViewMut<'a, T>
where
    T: TensorElem,
{
    /// Creates a writable view with explicit strides.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if `shape` and `strides` have different lengths or
    /// if the view would reach outside `data`.
    pub fn new(data: &'a mut [T], shape: &[usize], strides: &[isize]) -> Result<Self> {
        Self::with_offset(data, shape, strides, 0)
    }

    pub fn with_offset(
        data: &'a mut [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = Layout::new(data.len(), shape, strides, offset)?;
        Ok(Self { data, layout })
    }

    pub(crate) fn from_contiguous_parts(data: &'a mut [T], shape: Vec<usize>) -> Self {
        Self {
            data,
            layout: Layout::contiguous(shape),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn rank(&self) -> usize {
        self.layout.shape.len()
    }

    pub fn element_at(&self, index: &[usize]) -> Result<T> {
        let pos = self.layout.offset_of(index)?;
        Ok(self.data[pos])
    }

    /// Writes one element.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` under the same conditions as
    /// [`TensorView::element_at`].
    pub fn set_element_at(&mut self, index: &[usize], value: T) -> Result<()> {
        let pos = self.layout.offset_of(index)?;
        self.data[pos] = value;
        Ok(())
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> TensorView<'_, T> {
        TensorView {
            data: &*self.data,
            layout: self.layout.clone(),
        }
    }
}
