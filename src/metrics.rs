use burn::prelude::*;
use burn::tensor::ElementConversion;

/// Pixel-level agreement between a segmentation and its ground truth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentationRates {
    /// Fraction of pixels whose predicted class is the true one.
    pub accuracy: f32,
    /// Fraction of pixels predicted with a higher class index than the truth.
    /// With two classes: background predicted as target.
    pub false_positive: f32,
    /// Fraction of pixels predicted with a lower class index than the truth.
    /// With two classes: target predicted as background.
    pub false_negative: f32,
}

impl SegmentationRates {
    /// # Shapes
    /// - probabilities (or logits): `[batch, classes, height, width]`
    /// - masks, one-hot: `[batch, classes, height, width]`
    pub fn from_predictions<B: Backend>(probabilities: Tensor<B, 4>, masks: Tensor<B, 4>) -> Self {
        assert_eq!(probabilities.dims(), masks.dims());
        let predicted = probabilities.argmax(1);
        let truth = masks.argmax(1);

        let rate = |hits: Tensor<B, 4, Bool>| -> f32 { hits.float().mean().into_scalar().elem() };
        Self {
            accuracy: rate(predicted.clone().equal(truth.clone())),
            false_positive: rate(predicted.clone().greater(truth.clone())),
            false_negative: rate(predicted.lower(truth)),
        }
    }

    /// Pixel-weighted average of rates measured over batches of `pixels` pixels each.
    pub fn weighted_mean(rates: &[(Self, usize)]) -> Self {
        let total: usize = rates.iter().map(|(_, pixels)| pixels).sum();
        if total == 0 {
            return Self::default();
        }
        let mut mean = Self::default();
        for (rate, pixels) in rates {
            let w = *pixels as f32 / total as f32;
            mean.accuracy += rate.accuracy * w;
            mean.false_positive += rate.false_positive * w;
            mean.false_negative += rate.false_negative * w;
        }
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn rates_split_the_errors_by_direction() {
        let device = Default::default();
        // 1x4 image, probabilities of [background, target]
        let probabilities = Tensor::<TestBackend, 4>::from_data(
            [[[[0.9, 0.2, 0.6, 0.1]], [[0.1, 0.8, 0.4, 0.9]]]],
            &device,
        );
        // predicted: 0 1 0 1
        // truth:     0 0 1 1
        let masks = Tensor::<TestBackend, 4>::from_data(
            [[[[1.0, 1.0, 0.0, 0.0]], [[0.0, 0.0, 1.0, 1.0]]]],
            &device,
        );

        let rates = SegmentationRates::from_predictions(probabilities, masks);
        assert_eq!(0.5, rates.accuracy);
        assert_eq!(0.25, rates.false_positive);
        assert_eq!(0.25, rates.false_negative);
        assert_eq!(
            1.0,
            rates.accuracy + rates.false_positive + rates.false_negative
        );
    }

    #[test]
    fn weighted_mean_follows_pixel_counts() {
        let full = SegmentationRates {
            accuracy: 1.0,
            ..Default::default()
        };
        let half = SegmentationRates {
            accuracy: 0.5,
            false_positive: 0.5,
            false_negative: 0.0,
        };
        let mean = SegmentationRates::weighted_mean(&[(full, 300), (half, 100)]);
        assert!((mean.accuracy - 0.875).abs() < 1e-6);
        assert!((mean.false_positive - 0.125).abs() < 1e-6);
        assert_eq!(SegmentationRates::default(), SegmentationRates::weighted_mean(&[]));
    }
}
