use crate::cpu_pool1d::window_divisors;
use crate::{KernelElem, KernelError, NO_CONTRIBUTION, Pool1dGeometry, PoolingMethod, Result};
use rayon::prelude::*;

/// Scatters output gradients of a 1D pooling back onto its input on CPU.
///
/// # Arguments
///
/// * `grad_output` - Gradient w.r.t. the pooled output (flattened). Shape: `[outer, output_len, inner]`
/// * `geometry` - The geometry used for the forward pass.
/// * `method` - The reduction used for the forward pass.
/// * `selection` - For max pooling, the selection recorded by the forward pass. Not read by the
///   other methods, whose gradient routing follows from the geometry alone.
///
/// # Returns
///
/// The gradient w.r.t. the input, shape `[outer, input_len, inner]`. Every slice accumulates its
/// output positions in ascending order, so overlapping windows give reproducible sums.
pub fn cpu_pool1d_backward<T: KernelElem>(
    grad_output: &[T],
    geometry: &Pool1dGeometry,
    method: PoolingMethod,
    selection: Option<&[usize]>,
) -> Result<Vec<T>> {
    if grad_output.len() != geometry.output_size() {
        return Err(KernelError::ShapeMismatch {
            expected: vec![geometry.outer, geometry.output_len(), geometry.inner],
            got: vec![grad_output.len()],
        });
    }

    let selection = match method {
        PoolingMethod::Max => Some(check_selection(
            selection.ok_or(KernelError::MissingSelection)?,
            grad_output.len(),
            geometry.input_len,
        )?),
        PoolingMethod::Average | PoolingMethod::Sum => None,
    };

    let windows = geometry.windows()?;

    log::trace!(
        "pool1d backward: method={:?} outer={} len={}<-{} inner={}",
        method,
        geometry.outer,
        geometry.input_len,
        geometry.output_len(),
        geometry.inner
    );

    let inner = geometry.inner;
    let in_stride = geometry.input_len * inner;
    let out_stride = geometry.output_len() * inner;
    let mut grad_input = vec![T::zero(); geometry.input_size()];

    if in_stride == 0 || out_stride == 0 {
        return Ok(grad_input);
    }

    match (method, selection) {
        (PoolingMethod::Max, Some(selection)) => grad_input
            .par_chunks_mut(in_stride)
            .enumerate()
            .for_each(|(b, grad_in)| {
                let grad = &grad_output[b * out_stride..(b + 1) * out_stride];
                let sel = &selection[b * out_stride..(b + 1) * out_stride];
                for (pos, (&g, &idx)) in grad.iter().zip(sel).enumerate() {
                    if idx != NO_CONTRIBUTION {
                        grad_in[idx * inner + pos % inner] += g;
                    }
                }
            }),
        (PoolingMethod::Average, _) => {
            let divisors = window_divisors::<T>(&windows)?;
            grad_input
                .par_chunks_mut(in_stride)
                .enumerate()
                .for_each(|(b, grad_in)| {
                    let grad = &grad_output[b * out_stride..(b + 1) * out_stride];
                    for (o, (w, &div)) in windows.iter().zip(&divisors).enumerate() {
                        for j in 0..inner {
                            let share = grad[o * inner + j] / div;
                            for i in w.range() {
                                grad_in[i * inner + j] += share;
                            }
                        }
                    }
                });
        }
        (PoolingMethod::Sum, _) => grad_input
            .par_chunks_mut(in_stride)
            .enumerate()
            .for_each(|(b, grad_in)| {
                let grad = &grad_output[b * out_stride..(b + 1) * out_stride];
                for (o, w) in windows.iter().enumerate() {
                    let grad_row = &grad[o * inner..(o + 1) * inner];
                    for i in w.range() {
                        for (acc, &g) in grad_in[i * inner..(i + 1) * inner].iter_mut().zip(grad_row) {
                            *acc += g;
                        }
                    }
                }
            }),
        (PoolingMethod::Max, None) => return Err(KernelError::MissingSelection),
    }

    Ok(grad_input)
}

/// Checks that a selection map matches the gradient and only points inside the input.
fn check_selection(selection: &[usize], expected_len: usize, input_len: usize) -> Result<&[usize]> {
    if selection.len() != expected_len {
        return Err(KernelError::ShapeMismatch {
            expected: vec![expected_len],
            got: vec![selection.len()],
        });
    }
    if let Some((position, &index)) = selection
        .iter()
        .enumerate()
        .find(|&(_, &idx)| idx != NO_CONTRIBUTION && idx >= input_len)
    {
        return Err(KernelError::SelectionOutOfRange {
            position,
            index,
            input_len,
        });
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_pool1d_forward;
    use approx::assert_relative_eq;

    fn geometry_1d(len: usize, kernel: usize, stride: usize, padding: [usize; 2]) -> Pool1dGeometry {
        Pool1dGeometry::new(1, len, 1, kernel, stride, padding).unwrap()
    }

    #[test]
    fn test_max_backward_non_overlapping() {
        let input = vec![1.0f32, 3.0, 2.0, 5.0, 4.0];
        let geometry = geometry_1d(5, 2, 2, [0, 0]);
        let forward = cpu_pool1d_forward(&input, &geometry, PoolingMethod::Max, true).unwrap();

        let grad = vec![10.0f32, 20.0];
        let grad_in = cpu_pool1d_backward(
            &grad,
            &geometry,
            PoolingMethod::Max,
            forward.selection.as_deref(),
        )
        .unwrap();
        assert_eq!(grad_in, vec![0.0, 10.0, 0.0, 20.0, 0.0]);
    }

    #[test]
    fn test_max_backward_accumulates_overlaps() {
        // Windows [1, 5] [5, 2] [2, 0]: the first two both select index 1.
        let input = vec![1.0f32, 5.0, 2.0, 0.0];
        let geometry = geometry_1d(4, 2, 1, [0, 0]);
        let forward = cpu_pool1d_forward(&input, &geometry, PoolingMethod::Max, true).unwrap();
        assert_eq!(forward.selection.as_deref(), Some(&[1, 1, 2][..]));

        let grad = vec![1.0f32, 2.0, 3.0];
        let grad_in = cpu_pool1d_backward(
            &grad,
            &geometry,
            PoolingMethod::Max,
            forward.selection.as_deref(),
        )
        .unwrap();
        assert_eq!(grad_in, vec![0.0, 3.0, 3.0, 0.0]);
    }

    #[test]
    fn test_max_backward_skips_no_contribution() {
        let geometry = geometry_1d(3, 1, 1, [0, 0]);
        let selection = vec![0, NO_CONTRIBUTION, 2];
        let grad = vec![1.0f32, 2.0, 3.0];

        let grad_in =
            cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Max, Some(selection.as_slice())).unwrap();
        assert_eq!(grad_in, vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_average_backward_uses_valid_count() {
        // Windows: [pad, x0] [x0, x1] [x1, pad]
        let geometry = geometry_1d(2, 2, 1, [1, 1]);
        let grad = vec![1.0f64, 2.0, 3.0];

        let grad_in = cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Average, None).unwrap();
        assert_relative_eq!(grad_in[0], 1.0 + 1.0);
        assert_relative_eq!(grad_in[1], 1.0 + 3.0);
    }

    #[test]
    fn test_average_backward_conserves_gradient() {
        let geometry = Pool1dGeometry::new(3, 10, 2, 3, 2, [1, 2]).unwrap();
        let grad: Vec<f64> = (0..geometry.output_size()).map(|i| i as f64 * 0.25 + 1.0).collect();

        let grad_in = cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Average, None).unwrap();
        assert_eq!(grad_in.len(), geometry.input_size());
        assert_relative_eq!(
            grad_in.iter().sum::<f64>(),
            grad.iter().sum::<f64>(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sum_backward_with_padding() {
        let geometry = geometry_1d(3, 2, 1, [1, 1]);
        let grad = vec![1.0f32, 1.0, 1.0, 1.0];

        let grad_in = cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Sum, None).unwrap();
        assert_eq!(grad_in, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_sum_backward_inner_slices() {
        // Shape [1, 3, 2] pooled along the middle axis with kernel 2, stride 1.
        let geometry = Pool1dGeometry::new(1, 3, 2, 2, 1, [0, 0]).unwrap();
        let grad = vec![1, 10, 2, 20];

        let grad_in = cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Sum, None).unwrap();
        assert_eq!(grad_in, vec![1, 10, 3, 30, 2, 20]);
    }

    #[test]
    fn test_max_backward_requires_selection() {
        let geometry = geometry_1d(4, 2, 2, [0, 0]);
        let grad = vec![1.0f32, 1.0];

        let err = cpu_pool1d_backward(&grad, &geometry, PoolingMethod::Max, None);
        assert_eq!(err, Err(KernelError::MissingSelection));
    }

    #[test]
    fn test_backward_shape_checks() {
        let geometry = geometry_1d(4, 2, 2, [0, 0]);

        let err = cpu_pool1d_backward(&[1.0f32; 3], &geometry, PoolingMethod::Sum, None);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));

        let err = cpu_pool1d_backward(&[1.0f32; 2], &geometry, PoolingMethod::Max, Some(&[0][..]));
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));

        let err = cpu_pool1d_backward(&[1.0f32; 2], &geometry, PoolingMethod::Max, Some(&[1, 4][..]));
        assert_eq!(
            err,
            Err(KernelError::SelectionOutOfRange {
                position: 1,
                index: 4,
                input_len: 4,
            })
        );
    }
}
