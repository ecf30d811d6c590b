use burn::prelude::*;

/// Moves the class axis last and flattens every pixel into its own row.
///
/// # Shapes
/// - input: `[batch, classes, height, width]`
/// - output: `[batch * height * width, classes]`
pub fn flatten_pixels<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, classes, height, width] = x.dims();
    x.permute([0, 2, 3, 1])
        .reshape([batch * height * width, classes])
}

/// Flattens per-pixel class indices in the same order as [`flatten_pixels`].
///
/// # Shapes
/// - input: `[batch, height, width]`
/// - output: `[batch * height * width]`
pub fn flatten_targets<B: Backend>(targets: Tensor<B, 3, Int>) -> Tensor<B, 1, Int> {
    let [batch, height, width] = targets.dims();
    targets.reshape([batch * height * width])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn pixels_become_rows() {
        let device = Default::default();
        // one image, two classes, 1x2 pixels
        let x = Tensor::<TestBackend, 4>::from_data([[[[1.0, 2.0]], [[10.0, 20.0]]]], &device);
        let rows = flatten_pixels(x);
        assert_eq!([2, 2], rows.dims());
        let values = rows.into_data().to_vec::<f32>().unwrap();
        assert_eq!(vec![1.0, 10.0, 2.0, 20.0], values);
    }
}
