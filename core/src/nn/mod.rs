pub mod module;
pub mod params;
pub mod pool;

pub use module::Layer;
pub use params::PoolingParameters;
pub use pool::{Pool1d, Pool1dForward, ResultForBackward, SelectionMap};
pub use pool1d_rs_kernels::{NO_CONTRIBUTION, PoolingMethod};
