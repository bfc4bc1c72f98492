use crate::{KernelError, Result};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Marker stored in a selection map for an output that routes no gradient back.
pub const NO_CONTRIBUTION: usize = usize::MAX;

/// The reduction applied to every pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PoolingMethod {
    /// Largest valid element. Ties go to the lowest input index.
    #[default]
    Max,
    /// Mean over the valid elements only; padding is not counted.
    Average,
    /// Sum over the window; padding contributes zero.
    Sum,
}

/// The part of a pooling window that overlaps the real input, in absolute input indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Number of valid input positions covered by the window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Computes the output length of a 1D pooling along one axis.
///
/// `floor((input_len + padding_before + padding_after - kernel_size) / stride) + 1`
///
/// # Errors
///
/// Returns `KernelError::InvalidConfiguration` if `kernel_size` or `stride` is zero, or if the
/// kernel does not fit in the padded input (the output would be empty).
pub fn output_len(
    input_len: usize,
    kernel_size: usize,
    stride: usize,
    padding: [usize; 2],
) -> Result<usize> {
    if kernel_size == 0 {
        return Err(KernelError::InvalidConfiguration(
            "kernel size must be at least 1".into(),
        ));
    }
    if stride == 0 {
        return Err(KernelError::InvalidConfiguration(
            "stride must be at least 1".into(),
        ));
    }

    // Window starts are signed, so the padded length must fit in an isize.
    let padded = input_len
        .checked_add(padding[0])
        .and_then(|n| n.checked_add(padding[1]))
        .filter(|&n| isize::try_from(n).is_ok())
        .ok_or_else(|| {
            KernelError::InvalidConfiguration(format!(
                "padded input length {input_len} + {} + {} overflows",
                padding[0], padding[1]
            ))
        })?;
    if padded < kernel_size {
        return Err(KernelError::InvalidConfiguration(format!(
            "kernel size {kernel_size} exceeds padded input length {padded}"
        )));
    }

    Ok((padded - kernel_size) / stride + 1)
}

/// Shape of a single 1D pooling problem over a row-major buffer.
///
/// The input buffer is read as `[outer, input_len, inner]` and the output as
/// `[outer, output_len, inner]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool1dGeometry {
    pub outer: usize,
    pub input_len: usize,
    pub inner: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: [usize; 2],
    output_len: usize,
}

impl Pool1dGeometry {
    /// Creates a geometry and computes its output length.
    ///
    /// # Arguments
    ///
    /// * `outer` - Product of the dimensions before the pooled axis.
    /// * `input_len` - Size of the pooled axis.
    /// * `inner` - Product of the dimensions after the pooled axis.
    /// * `kernel_size` - Width of the pooling window.
    /// * `stride` - Step between consecutive windows.
    /// * `padding` - Virtual elements `[before, after]` the real data.
    pub fn new(
        outer: usize,
        input_len: usize,
        inner: usize,
        kernel_size: usize,
        stride: usize,
        padding: [usize; 2],
    ) -> Result<Self> {
        let output_len = output_len(input_len, kernel_size, stride, padding)?;
        Ok(Self {
            outer,
            input_len,
            inner,
            kernel_size,
            stride,
            padding,
            output_len,
        })
    }

    /// Creates a geometry that pools `shape` along `axis`.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::ShapeMismatch` if `axis` is not a valid axis of `shape`.
    pub fn from_shape(
        shape: &[usize],
        axis: usize,
        kernel_size: usize,
        stride: usize,
        padding: [usize; 2],
    ) -> Result<Self> {
        if axis >= shape.len() {
            return Err(KernelError::ShapeMismatch {
                expected: vec![axis + 1],
                got: vec![shape.len()],
            });
        }
        let outer = shape[..axis].iter().product();
        let inner = shape[axis + 1..].iter().product();
        Self::new(outer, shape[axis], inner, kernel_size, stride, padding)
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Total number of input elements.
    pub fn input_size(&self) -> usize {
        self.outer * self.input_len * self.inner
    }

    /// Total number of output elements.
    pub fn output_size(&self) -> usize {
        self.outer * self.output_len * self.inner
    }

    /// Start of the window for `output_index`, in input coordinates. Negative inside the
    /// leading padding.
    pub fn window_start(&self, output_index: usize) -> isize {
        (output_index * self.stride) as isize - self.padding[0] as isize
    }

    /// Clips every window to the real input.
    ///
    /// Windows only depend on the output index, so they are shared by all `outer * inner`
    /// slices.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::DegenerateWindow` for the first window that lies entirely in
    /// padding.
    pub fn windows(&self) -> Result<Vec<Window>> {
        (0..self.output_len)
            .map(|o| {
                let start = self.window_start(o);
                let end = start + self.kernel_size as isize;
                let lo = start.max(0);
                let hi = end.min(self.input_len as isize);
                if hi <= lo {
                    return Err(KernelError::DegenerateWindow {
                        output_index: o,
                        window_start: start,
                        kernel_size: self.kernel_size,
                        input_len: self.input_len,
                    });
                }
                Ok(Window {
                    start: lo as usize,
                    end: hi as usize,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_len() {
        assert_eq!(output_len(5, 2, 1, [0, 0]).unwrap(), 4);
        assert_eq!(output_len(5, 2, 2, [0, 0]).unwrap(), 2);
        assert_eq!(output_len(3, 2, 1, [1, 1]).unwrap(), 4);
        // kernel == input, stride 1, no padding
        assert_eq!(output_len(7, 7, 1, [0, 0]).unwrap(), 1);
    }

    #[test]
    fn test_output_len_rejects_bad_config() {
        assert!(matches!(
            output_len(5, 0, 1, [0, 0]),
            Err(KernelError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            output_len(5, 2, 0, [0, 0]),
            Err(KernelError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            output_len(2, 4, 1, [0, 1]),
            Err(KernelError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_output_len_rejects_overflowing_padding() {
        assert!(matches!(
            output_len(3, 2, 1, [usize::MAX, 1]),
            Err(KernelError::InvalidConfiguration(_))
        ));
        // fits in usize but not in the signed window coordinates
        assert!(matches!(
            output_len(3, 2, 1, [usize::MAX / 2 + 1, 0]),
            Err(KernelError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Pool1dGeometry::new(1, 3, 1, 2, 1, [0, usize::MAX - 2]),
            Err(KernelError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_shape() {
        let geometry = Pool1dGeometry::from_shape(&[2, 3, 8, 4], 2, 2, 2, [0, 0]).unwrap();
        assert_eq!(geometry.outer, 6);
        assert_eq!(geometry.input_len, 8);
        assert_eq!(geometry.inner, 4);
        assert_eq!(geometry.output_len(), 4);
        assert_eq!(geometry.output_size(), 6 * 4 * 4);

        let err = Pool1dGeometry::from_shape(&[2, 3], 2, 2, 1, [0, 0]);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_windows_clip_padding() {
        let geometry = Pool1dGeometry::new(1, 3, 1, 2, 1, [1, 1]).unwrap();
        let windows = geometry.windows().unwrap();
        let ranges: Vec<_> = windows.iter().map(Window::range).collect();
        assert_eq!(ranges, vec![0..1, 0..2, 1..3, 2..3]);
    }

    #[test]
    fn test_fully_padded_window_is_degenerate() {
        // The leading window covers only padding.
        let geometry = Pool1dGeometry::new(1, 4, 1, 2, 1, [2, 0]).unwrap();
        let err = geometry.windows().unwrap_err();
        assert_eq!(
            err,
            KernelError::DegenerateWindow {
                output_index: 0,
                window_start: -2,
                kernel_size: 2,
                input_len: 4,
            }
        );

        // The trailing window starts past the end of the input.
        let geometry = Pool1dGeometry::new(1, 2, 1, 1, 1, [0, 1]).unwrap();
        assert!(matches!(
            geometry.windows(),
            Err(KernelError::DegenerateWindow { output_index: 2, .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_output_len_matches_formula(
                input_len in 0usize..=64,
                kernel_size in 1usize..=8,
                stride in 1usize..=4,
                pad_before in 0usize..=4,
                pad_after in 0usize..=4,
            ) {
                let padded = input_len + pad_before + pad_after;
                let result = output_len(input_len, kernel_size, stride, [pad_before, pad_after]);
                if padded >= kernel_size {
                    prop_assert_eq!(result.unwrap(), (padded - kernel_size) / stride + 1);
                } else {
                    prop_assert!(result.is_err());
                }
            }

            #[test]
            fn prop_windows_stay_inside_input(
                input_len in 1usize..=32,
                kernel_size in 1usize..=6,
                stride in 1usize..=3,
                pad_before in 0usize..=2,
                pad_after in 0usize..=2,
            ) {
                prop_assume!(pad_before < kernel_size && pad_after < kernel_size);
                prop_assume!(input_len + pad_before + pad_after >= kernel_size);
                let geometry = Pool1dGeometry::new(
                    1, input_len, 1, kernel_size, stride, [pad_before, pad_after],
                ).unwrap();
                if let Ok(windows) = geometry.windows() {
                    prop_assert_eq!(windows.len(), geometry.output_len());
                    for w in windows {
                        prop_assert!(w.start < w.end);
                        prop_assert!(w.end <= input_len);
                        prop_assert!(w.len() <= kernel_size);
                    }
                }
            }
        }
    }
}
