use crate::data::CHANNELS;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-channel standardization of planar images: `z = (value - mean) / std`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Whitening {
    pub mean: [f32; CHANNELS],
    pub std: [f32; CHANNELS],
}

impl Default for Whitening {
    fn default() -> Self {
        Self {
            mean: [0.0; CHANNELS],
            std: [1.0; CHANNELS],
        }
    }
}

impl Whitening {
    /// Statistics over planar images of `plane` pixels each.
    pub fn from_images<'a>(images: impl IntoIterator<Item = &'a [f32]>, plane: usize) -> Self {
        let mut sum = [0f64; CHANNELS];
        let mut sum_sq = [0f64; CHANNELS];
        let mut count = 0usize;
        for image in images {
            debug_assert_eq!(CHANNELS * plane, image.len());
            for (c, channel) in image.chunks(plane).enumerate() {
                for &v in channel {
                    sum[c] += v as f64;
                    sum_sq[c] += (v as f64) * (v as f64);
                }
            }
            count += plane;
        }
        if count == 0 {
            return Self::default();
        }

        let mut whitening = Self::default();
        for c in 0..CHANNELS {
            let mean = sum[c] / count as f64;
            let var = (sum_sq[c] / count as f64 - mean * mean).max(0.0);
            whitening.mean[c] = mean as f32;
            // flat channels are only centered
            whitening.std[c] = if var > 1e-12 { var.sqrt() as f32 } else { 1.0 };
        }
        whitening
    }

    pub fn whiten(&self, image: &[f32], plane: usize) -> Vec<f32> {
        image
            .chunks(plane)
            .enumerate()
            .flat_map(|(c, channel)| channel.iter().map(move |v| (v - self.mean[c]) / self.std[c]))
            .collect()
    }

    /// Reverts the whitening and clamps the values back into `[0, 1]`.
    ///
    /// # Shapes
    /// - input: `[batch, CHANNELS, height, width]`
    /// - output: `[batch, CHANNELS, height, width]`
    pub fn unwhiten_img<B: Backend>(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let device = images.device();
        let mean = Tensor::<B, 1>::from_floats(self.mean, &device).reshape([1, CHANNELS, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(self.std, &device).reshape([1, CHANNELS, 1, 1]);
        (images * std + mean).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{TestBackend, assert_close};

    #[test]
    fn whitened_channels_have_zero_mean_and_unit_std() {
        // two 1x2 images
        let a = [0.0, 1.0, 0.5, 0.5, 0.2, 0.4];
        let b = [1.0, 0.0, 0.5, 0.5, 0.6, 0.8];
        let whitening = Whitening::from_images([&a[..], &b[..]], 2);
        assert_close(&whitening.mean, &[0.5, 0.5, 0.5], 1e-6);
        assert_close(&whitening.std[..1], &[0.5], 1e-6);
        // constant channel keeps a unit std
        assert_eq!(1.0, whitening.std[1]);

        let z = whitening.whiten(&a, 2);
        assert_close(&z[..4], &[-1.0, 1.0, 0.0, 0.0], 1e-5);
    }

    #[test]
    fn unwhiten_reverts_whiten() {
        let image = [0.1, 0.9, 0.3, 0.7, 0.5, 0.6];
        let whitening = Whitening {
            mean: [0.5, 0.4, 0.3],
            std: [0.2, 0.3, 0.4],
        };
        let z = whitening.whiten(&image, 2);
        let tensor = Tensor::<TestBackend, 1>::from_floats(z.as_slice(), &Default::default())
            .reshape([1, CHANNELS, 1, 2]);
        let restored = whitening
            .unwhiten_img(tensor)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_close(&restored, &image, 1e-5);
    }
}
