use crate::data::{CHANNELS, ColorShapesItem, NUM_OUTPUTS, Whitening};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct ColorShapesBatcher {
    pub whitening: Whitening,
}

impl ColorShapesBatcher {
    pub fn new(whitening: Whitening) -> Self {
        Self { whitening }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// Whitened images.
    ///
    /// # Shape
    /// [batch_size, CHANNELS, height, width]
    pub images: Tensor<B, 4>,
    /// One-hot masks.
    ///
    /// # Shape
    /// [batch_size, NUM_OUTPUTS, height, width]
    pub masks: Tensor<B, 4>,
    /// Class index of every pixel.
    ///
    /// # Shape
    /// [batch_size, height, width]
    pub targets: Tensor<B, 3, Int>,
}

impl<B: Backend> Batcher<B, ColorShapesItem, SegmentationBatch<B>> for ColorShapesBatcher {
    fn batch(&self, items: Vec<ColorShapesItem>, device: &B::Device) -> SegmentationBatch<B> {
        let batch_size = items.len();
        let (height, width) = items
            .first()
            .map(|item| (item.height, item.width))
            .unwrap_or((0, 0));
        let plane = height * width;

        let mut images = Vec::with_capacity(batch_size * CHANNELS * plane);
        let mut masks = vec![0f32; batch_size * NUM_OUTPUTS * plane];
        let mut targets = Vec::with_capacity(batch_size * plane);
        for (b, item) in items.iter().enumerate() {
            assert_eq!((height, width), (item.height, item.width));
            images.extend(self.whitening.whiten(&item.image, plane));
            for (p, class) in item.mask.iter().enumerate() {
                masks[(b * NUM_OUTPUTS + *class as usize) * plane + p] = 1.0;
                targets.push(*class as i64);
            }
        }

        let images = TensorData::new(images, [batch_size, CHANNELS, height, width])
            .convert::<B::FloatElem>();
        let masks = TensorData::new(masks, [batch_size, NUM_OUTPUTS, height, width])
            .convert::<B::FloatElem>();
        let targets =
            TensorData::new(targets, [batch_size, height, width]).convert::<B::IntElem>();

        SegmentationBatch {
            images: Tensor::from_data(images, device),
            masks: Tensor::from_data(masks, device),
            targets: Tensor::from_data(targets, device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    fn item(mask: Vec<u8>) -> ColorShapesItem {
        ColorShapesItem {
            image: vec![0.5; CHANNELS * 4],
            mask,
            height: 2,
            width: 2,
        }
    }

    #[test]
    fn masks_are_one_hot_over_the_class_axis() {
        let device = Default::default();
        let batcher = ColorShapesBatcher::default();
        let batch: SegmentationBatch<TestBackend> =
            batcher.batch(vec![item(vec![0, 1, 1, 0]), item(vec![1, 1, 1, 1])], &device);

        assert_eq!([2, CHANNELS, 2, 2], batch.images.dims());
        assert_eq!([2, NUM_OUTPUTS, 2, 2], batch.masks.dims());
        assert_eq!([2, 2, 2], batch.targets.dims());

        let masks = batch.masks.clone().into_data().to_vec::<f32>().unwrap();
        assert_eq!(
            vec![
                1.0, 0.0, 0.0, 1.0, // image 0, class 0
                0.0, 1.0, 1.0, 0.0, // image 0, class 1
                0.0, 0.0, 0.0, 0.0, // image 1, class 0
                1.0, 1.0, 1.0, 1.0, // image 1, class 1
            ],
            masks
        );

        // the one-hot argmax gives back the class indices
        let from_masks = batch.masks.argmax(1).reshape([2, 2, 2]);
        let same = from_masks
            .equal(batch.targets)
            .int()
            .sum()
            .into_data()
            .to_vec::<i64>()
            .unwrap();
        assert_eq!(vec![8], same);
    }

    #[test]
    fn images_are_whitened() {
        let device = Default::default();
        let batcher = ColorShapesBatcher::new(Whitening {
            mean: [0.5; CHANNELS],
            std: [0.25; CHANNELS],
        });
        let mut first = item(vec![0; 4]);
        first.image[0] = 1.0;
        let batch: SegmentationBatch<TestBackend> = batcher.batch(vec![first], &device);
        let images = batch.images.into_data().to_vec::<f32>().unwrap();
        assert_eq!(2.0, images[0]);
        assert!(images[1..].iter().all(|v| *v == 0.0));
    }
}
