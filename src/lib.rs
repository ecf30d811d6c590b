pub mod data;
pub mod dense;
pub mod error;
pub mod metrics;
pub mod training;
pub mod unet;

pub mod prelude {
    pub use crate::data::*;
    pub use crate::dense::*;
    pub use crate::error::Error;
    pub use crate::metrics::*;
    pub use crate::training::*;
    pub use crate::unet::*;
}

pub mod utils;

#[cfg(test)]
pub(crate) mod tests {
    pub type TestBackend = burn::backend::NdArray<f32>;
    pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

    pub fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a - e).abs() <= tolerance,
                "index {i}: {a} vs {e} ({actual:?} vs {expected:?})"
            );
        }
    }
}
