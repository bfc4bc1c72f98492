use crate::{KernelElem, KernelError, NO_CONTRIBUTION, Pool1dGeometry, PoolingMethod, Result, Window};
use rayon::prelude::*;

/// Result of a forward pooling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool1dOutput<T> {
    /// Pooled values, row-major `[outer, output_len, inner]`.
    pub values: Vec<T>,
    /// For max pooling, the absolute pooled-axis input index that produced each value.
    /// Same layout as `values`.
    pub selection: Option<Vec<usize>>,
}

/// Performs 1D pooling on CPU.
///
/// # Arguments
///
/// * `input` - Input tensor data (flattened). Shape: `[outer, input_len, inner]`
/// * `geometry` - Pooled axis, window size, stride and padding.
/// * `method` - Reduction applied to each window.
/// * `record_selection` - Whether max pooling should record the selected input indices.
///   Ignored by the other methods.
///
/// # Returns
///
/// The pooled values with shape `[outer, output_len, inner]`, plus the selection map when
/// one was requested for max pooling.
///
/// Padding never takes part in a reduction: max and average only look at valid elements, and
/// average divides by the number of valid elements rather than the kernel size.
pub fn cpu_pool1d_forward<T: KernelElem>(
    input: &[T],
    geometry: &Pool1dGeometry,
    method: PoolingMethod,
    record_selection: bool,
) -> Result<Pool1dOutput<T>> {
    if input.len() != geometry.input_size() {
        return Err(KernelError::ShapeMismatch {
            expected: vec![geometry.outer, geometry.input_len, geometry.inner],
            got: vec![input.len()],
        });
    }

    // Fails before anything is written if some window lies entirely in padding.
    let windows = geometry.windows()?;

    log::trace!(
        "pool1d forward: method={:?} outer={} len={}->{} inner={} kernel={} stride={} padding={:?}",
        method,
        geometry.outer,
        geometry.input_len,
        geometry.output_len(),
        geometry.inner,
        geometry.kernel_size,
        geometry.stride,
        geometry.padding
    );

    let inner = geometry.inner;
    let in_stride = geometry.input_len * inner;
    let out_stride = geometry.output_len() * inner;
    let mut values = vec![T::zero(); geometry.output_size()];
    let mut selection = (method == PoolingMethod::Max && record_selection)
        .then(|| vec![NO_CONTRIBUTION; geometry.output_size()]);

    if out_stride == 0 {
        return Ok(Pool1dOutput { values, selection });
    }

    match method {
        PoolingMethod::Max => match selection.as_mut() {
            Some(selection) => values
                .par_chunks_mut(out_stride)
                .zip(selection.par_chunks_mut(out_stride))
                .enumerate()
                .for_each(|(b, (out, sel))| {
                    let slice = &input[b * in_stride..(b + 1) * in_stride];
                    max_slice(slice, &windows, inner, out, Some(sel));
                }),
            None => values
                .par_chunks_mut(out_stride)
                .enumerate()
                .for_each(|(b, out)| {
                    let slice = &input[b * in_stride..(b + 1) * in_stride];
                    max_slice(slice, &windows, inner, out, None);
                }),
        },
        PoolingMethod::Average => {
            let divisors = window_divisors::<T>(&windows)?;
            values
                .par_chunks_mut(out_stride)
                .enumerate()
                .for_each(|(b, out)| {
                    let slice = &input[b * in_stride..(b + 1) * in_stride];
                    sum_slice(slice, &windows, inner, out);
                    for (o, div) in divisors.iter().enumerate() {
                        for v in &mut out[o * inner..(o + 1) * inner] {
                            *v /= *div;
                        }
                    }
                });
        }
        PoolingMethod::Sum => values
            .par_chunks_mut(out_stride)
            .enumerate()
            .for_each(|(b, out)| {
                let slice = &input[b * in_stride..(b + 1) * in_stride];
                sum_slice(slice, &windows, inner, out);
            }),
    }

    Ok(Pool1dOutput { values, selection })
}

/// Converts the valid-element count of every window into the element type.
pub(crate) fn window_divisors<T: KernelElem>(windows: &[Window]) -> Result<Vec<T>> {
    windows
        .iter()
        .map(|w| {
            T::from_usize(w.len()).ok_or_else(|| {
                KernelError::InvalidConfiguration(format!(
                    "window size {} is not representable in the element type",
                    w.len()
                ))
            })
        })
        .collect()
}

/// Max over each window of one `[input_len, inner]` slice.
///
/// Only a strictly greater value replaces the current maximum, so the lowest index wins ties.
fn max_slice<T: KernelElem>(
    input: &[T],
    windows: &[Window],
    inner: usize,
    out: &mut [T],
    mut selection: Option<&mut [usize]>,
) {
    for (o, w) in windows.iter().enumerate() {
        for j in 0..inner {
            let mut best_idx = w.start;
            let mut best = input[w.start * inner + j];
            for i in w.start + 1..w.end {
                let val = input[i * inner + j];
                if val > best {
                    best = val;
                    best_idx = i;
                }
            }
            out[o * inner + j] = best;
            if let Some(sel) = selection.as_deref_mut() {
                sel[o * inner + j] = best_idx;
            }
        }
    }
}

/// Sum over each window of one `[input_len, inner]` slice. Padding contributes nothing.
fn sum_slice<T: KernelElem>(input: &[T], windows: &[Window], inner: usize, out: &mut [T]) {
    for (o, w) in windows.iter().enumerate() {
        let out_row = &mut out[o * inner..(o + 1) * inner];
        for i in w.range() {
            let in_row = &input[i * inner..(i + 1) * inner];
            for (acc, &val) in out_row.iter_mut().zip(in_row) {
                *acc += val;
            }
        }
    }
}
