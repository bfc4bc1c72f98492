use crate::tensor::{Result, TensorError};
use pool1d_rs_kernels::{Pool1dGeometry, PoolingMethod};
use serde::{Deserialize, Serialize};

fn default_stride() -> usize {
    1
}

/// Configuration of a 1D pooling layer.
///
/// Kernel size and stride are checked when the parameters are built. Whether they fit a given
/// input is checked again by [`PoolingParameters::validate`] on every call.
///
/// Parameters can also be loaded with `serde`; only `kernel_size` is required:
///
/// ```rust
/// use pool1d_rs::nn::{PoolingMethod, PoolingParameters};
///
/// let json = r#"{ "kernel_size": 3, "stride": 2, "method": "average" }"#;
/// let params: PoolingParameters = serde_json::from_str(json).unwrap();
/// assert_eq!(params.method(), PoolingMethod::Average);
/// assert_eq!(params.padding(), [0, 0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolingParameters {
    kernel_size: usize,
    #[serde(default = "default_stride")]
    stride: usize,
    #[serde(default)]
    padding_before: usize,
    #[serde(default)]
    padding_after: usize,
    #[serde(default)]
    dimension_index: usize,
    #[serde(default)]
    method: PoolingMethod,
    #[serde(default)]
    prediction_stage: bool,
}

impl PoolingParameters {
    /// Creates max pooling parameters over axis 0 with no padding.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidConfiguration` if `kernel_size` or `stride` is zero.
    pub fn new(kernel_size: usize, stride: usize) -> Result<Self> {
        let params = Self {
            kernel_size,
            stride,
            padding_before: 0,
            padding_after: 0,
            dimension_index: 0,
            method: PoolingMethod::Max,
            prediction_stage: false,
        };
        params.check()?;
        Ok(params)
    }

    pub fn with_padding(mut self, before: usize, after: usize) -> Self {
        self.padding_before = before;
        self.padding_after = after;
        self
    }

    pub fn with_dimension_index(mut self, dimension_index: usize) -> Self {
        self.dimension_index = dimension_index;
        self
    }

    pub fn with_method(mut self, method: PoolingMethod) -> Self {
        self.method = method;
        self
    }

    /// In the prediction stage the forward pass keeps nothing for a backward pass.
    pub fn with_prediction_stage(mut self, prediction_stage: bool) -> Self {
        self.prediction_stage = prediction_stage;
        self
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Padding as `[before, after]`.
    pub fn padding(&self) -> [usize; 2] {
        [self.padding_before, self.padding_after]
    }

    pub fn dimension_index(&self) -> usize {
        self.dimension_index
    }

    pub fn method(&self) -> PoolingMethod {
        self.method
    }

    pub fn prediction_stage(&self) -> bool {
        self.prediction_stage
    }

    /// Checks the parameters on their own, without an input shape.
    pub fn check(&self) -> Result<()> {
        if self.kernel_size == 0 {
            return Err(TensorError::InvalidConfiguration(
                "kernel size must be at least 1".into(),
            ));
        }
        if self.stride == 0 {
            return Err(TensorError::InvalidConfiguration(
                "stride must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Computes the output size along the pooled dimension for an input of `input_shape`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidConfiguration` if the kernel size or stride is zero, if the
    /// dimension index is not an axis of `input_shape`, or if the output would be empty.
    pub fn validate(&self, input_shape: &[usize]) -> Result<usize> {
        Ok(self.geometry(input_shape)?.output_len())
    }

    /// Shape of the pooled output for an input of `input_shape`.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let output_len = self.validate(input_shape)?;
        let mut shape = input_shape.to_vec();
        shape[self.dimension_index] = output_len;
        Ok(shape)
    }

    pub(crate) fn geometry(&self, input_shape: &[usize]) -> Result<Pool1dGeometry> {
        self.check()?;
        if self.dimension_index >= input_shape.len() {
            return Err(TensorError::InvalidConfiguration(format!(
                "dimension index {} is out of range for an input of rank {}",
                self.dimension_index,
                input_shape.len()
            )));
        }
        Pool1dGeometry::from_shape(
            input_shape,
            self.dimension_index,
            self.kernel_size,
            self.stride,
            self.padding(),
        )
        .map_err(TensorError::from)
    }
}
