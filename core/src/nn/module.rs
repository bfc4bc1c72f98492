use crate::tensor::{Result, Tensor, TensorElem, TensorView};
use std::fmt::Debug;

/// The interface a network executor drives for every layer.
///
/// A forward pass may keep some data for its backward pass (`Saved`). The executor hands that
/// data back, by value, to exactly one backward call.
///
/// `Send + Sync` lets an executor share layers across threads; `Debug` keeps model structure
/// inspectable.
pub trait Layer<T: TensorElem>: Debug + Send + Sync {
    /// Data carried from a forward pass to its backward pass.
    type Saved;

    /// Computes the layer output. Returns `None` for the saved data when the layer keeps
    /// nothing, e.g. in the prediction stage.
    fn forward(&self, input: &TensorView<'_, T>) -> Result<(Tensor<T>, Option<Self::Saved>)>;

    /// Computes the gradient w.r.t. the layer input.
    fn backward(&self, grad_output: &TensorView<'_, T>, saved: Self::Saved) -> Result<Tensor<T>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Doubles its input and keeps nothing.
    #[derive(Debug)]
    struct MockLayer;

    impl Layer<f32> for MockLayer {
        type Saved = ();

        fn forward(&self, input: &TensorView<'_, f32>) -> Result<(Tensor<f32>, Option<()>)> {
            let data: Vec<f32> = input.to_contiguous().iter().map(|v| v * 2.0).collect();
            Ok((Tensor::new(data, input.shape().to_vec())?, None))
        }

        fn backward(&self, grad_output: &TensorView<'_, f32>, _saved: ()) -> Result<Tensor<f32>> {
            let data: Vec<f32> = grad_output.to_contiguous().iter().map(|v| v * 2.0).collect();
            Tensor::new(data, grad_output.shape().to_vec())
        }
    }

    fn run_layer<L: Layer<f32>>(layer: &L, input: &TensorView<'_, f32>) -> Tensor<f32> {
        layer.forward(input).unwrap().0
    }

    #[test]
    fn test_layer_object() {
        let data = vec![1.0, 2.0];
        let input = TensorView::contiguous(&data, &[2]).unwrap();
        let out = run_layer(&MockLayer, &input);
        assert_eq!(out.data(), &[2.0, 4.0]);

        let grad = MockLayer.backward(&out.view(), ()).unwrap();
        assert_eq!(grad.data(), &[4.0, 8.0]);
    }
}
