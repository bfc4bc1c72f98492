use crate::nn::{Layer, PoolingParameters};
use crate::tensor::{Result, Tensor, TensorElem, TensorError, TensorView};
use pool1d_rs_kernels::{PoolingMethod, cpu_pool1d_backward, cpu_pool1d_forward};

/// The input positions picked by a max pooling forward pass.
///
/// Holds one entry per output element, in the row-major order of the output. Each entry is the
/// absolute index along the pooled dimension of the input element that won its window, or
/// [`NO_CONTRIBUTION`](pool1d_rs_kernels::NO_CONTRIBUTION).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMap {
    indices: Vec<usize>,
    shape: Vec<usize>,
    dimension_index: usize,
}

impl SelectionMap {
    /// Selected indices, laid out like the forward output.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Shape of the forward output this map belongs to.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of entries per slice, i.e. the output size along the pooled dimension.
    pub fn pooled_len(&self) -> usize {
        self.shape[self.dimension_index]
    }

    /// Selected input index for the output element at `index`.
    ///
    /// Builds a bounds-checked view on every call. For bulk access use [`SelectionMap::indices`].
    pub fn selected(&self, index: &[usize]) -> Result<usize> {
        TensorView::contiguous(&self.indices, &self.shape)?.element_at(index)
    }
}

/// What a forward pass keeps for the matching backward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultForBackward {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    selection: Option<SelectionMap>,
}

impl ResultForBackward {
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Only present for max pooling.
    pub fn selection(&self) -> Option<&SelectionMap> {
        self.selection.as_ref()
    }
}

/// Output of [`Pool1d::forward`].
#[derive(Debug, Clone, PartialEq)]
pub struct Pool1dForward<T>
where
    T: TensorElem,
{
    /// The pooled tensor.
    pub value: Tensor<T>,
    /// `None` when the layer runs in the prediction stage.
    pub result_for_backward: Option<ResultForBackward>,
}

/// 1D Pooling Layer.
///
/// Pools any tensor along one configurable dimension. All other dimensions are treated as
/// independent slices and processed in parallel.
///
/// ```rust
/// use pool1d_rs::nn::{Pool1d, PoolingParameters};
/// use pool1d_rs::tensor::TensorView;
///
/// let params = PoolingParameters::new(2, 2).unwrap();
/// let pool = Pool1d::configure(params).unwrap();
///
/// let data = vec![1.0f32, 3.0, 2.0, 5.0, 4.0];
/// let input = TensorView::contiguous(&data, &[5]).unwrap();
/// let out = pool.forward(&input).unwrap();
/// assert_eq!(out.value.data(), &[3.0, 5.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool1d {
    params: PoolingParameters,
}

impl Pool1d {
    /// Creates a pooling layer.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidConfiguration` if the kernel size or stride is zero.
    pub fn configure(params: PoolingParameters) -> Result<Self> {
        params.check()?;
        log::debug!(
            "configured pool1d layer: method={:?} kernel={} stride={} padding={:?} dim={} prediction_stage={}",
            params.method(),
            params.kernel_size(),
            params.stride(),
            params.padding(),
            params.dimension_index(),
            params.prediction_stage()
        );
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &PoolingParameters {
        &self.params
    }

    /// Performs the forward pass.
    ///
    /// # Errors
    ///
    /// - `TensorError::ShapeMismatch` if the input has no axis `dimension_index`.
    /// - `TensorError::InvalidConfiguration` if the padded input is shorter than the kernel.
    /// - `TensorError::DegenerateWindow` if some window covers only padding.
    pub fn forward<T: TensorElem>(&self, input: &TensorView<'_, T>) -> Result<Pool1dForward<T>> {
        let dim = self.params.dimension_index();
        if dim >= input.rank() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![dim + 1],
                got: vec![input.rank()],
            });
        }

        let geometry = self.params.geometry(input.shape())?;
        let data = input.to_contiguous();
        let record_selection = !self.params.prediction_stage();
        let out = cpu_pool1d_forward(&data, &geometry, self.params.method(), record_selection)?;

        let mut output_shape = input.shape().to_vec();
        output_shape[dim] = geometry.output_len();
        log::trace!(
            "pool1d layer forward: {:?} -> {:?}",
            input.shape(),
            output_shape
        );

        let value = Tensor::new(out.values, output_shape.clone())?;
        let result_for_backward = record_selection.then(|| ResultForBackward {
            input_shape: input.shape().to_vec(),
            selection: out.selection.map(|indices| SelectionMap {
                indices,
                shape: output_shape.clone(),
                dimension_index: dim,
            }),
            output_shape,
        });

        Ok(Pool1dForward {
            value,
            result_for_backward,
        })
    }

    /// Performs the backward pass.
    ///
    /// Consumes the data kept by the matching forward pass.
    ///
    /// # Errors
    ///
    /// - `TensorError::ShapeMismatch` if `grad_output` does not have the forward output's shape,
    ///   or the selection map does not match it.
    /// - `TensorError::MissingSelection` for max pooling without a selection map.
    pub fn backward<T: TensorElem>(
        &self,
        grad_output: &TensorView<'_, T>,
        saved: ResultForBackward,
    ) -> Result<Tensor<T>> {
        if grad_output.shape() != saved.output_shape.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: saved.output_shape,
                got: grad_output.shape().to_vec(),
            });
        }

        let geometry = self.params.geometry(&saved.input_shape)?;
        let mut expected_output = saved.input_shape.clone();
        expected_output[self.params.dimension_index()] = geometry.output_len();
        if expected_output != saved.output_shape {
            return Err(TensorError::ShapeMismatch {
                expected: expected_output,
                got: saved.output_shape,
            });
        }

        let selection = match self.params.method() {
            PoolingMethod::Max => {
                let selection = saved.selection.as_ref().ok_or(TensorError::MissingSelection)?;
                if selection.shape() != grad_output.shape() || selection.len() != grad_output.size() {
                    return Err(TensorError::ShapeMismatch {
                        expected: grad_output.shape().to_vec(),
                        got: selection.shape().to_vec(),
                    });
                }
                Some(selection.indices())
            }
            PoolingMethod::Average | PoolingMethod::Sum => None,
        };

        log::trace!(
            "pool1d layer backward: {:?} -> {:?}",
            grad_output.shape(),
            saved.input_shape
        );

        let grad = grad_output.to_contiguous();
        let grad_input = cpu_pool1d_backward(&grad, &geometry, self.params.method(), selection)?;
        Tensor::new(grad_input, saved.input_shape)
    }
}

impl<T: TensorElem> Layer<T> for Pool1d {
    type Saved = ResultForBackward;

    fn forward(&self, input: &TensorView<'_, T>) -> Result<(Tensor<T>, Option<Self::Saved>)> {
        let out = Pool1d::forward(self, input)?;
        Ok((out.value, out.result_for_backward))
    }

    fn backward(&self, grad_output: &TensorView<'_, T>, saved: Self::Saved) -> Result<Tensor<T>> {
        Pool1d::backward(self, grad_output, saved)
    }
}
