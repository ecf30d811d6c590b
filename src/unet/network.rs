//! Encoder-decoder segmentation network with symmetric skip connections.

use crate::error::{Error, Result};
use crate::unet::block::he_normal;
use crate::unet::*;
use crate::utils::pixels::{flatten_pixels, flatten_targets};
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::train::ClassificationOutput;

#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = 64)]
    pub height: usize,
    #[config(default = 64)]
    pub width: usize,
    #[config(default = 3)]
    pub in_channels: usize,

    /// Channel width of each depth level, shallowest first.
    ///
    /// Each level but the last halves the spatial size on the way down
    /// and doubles it back on the way up.
    #[config(default = "vec![32, 64, 128, 256, 512]")]
    pub channels: Vec<usize>,

    /// Number of classes predicted for every pixel.
    #[config(default = 2)]
    pub num_outputs: usize,

    #[config(default = 0.95)]
    pub norm_momentum: f64,
    #[config(default = 1e-3)]
    pub norm_epsilon: f64,
}

impl UNetConfig {
    pub fn num_levels(&self) -> usize {
        self.channels.len()
    }

    /// Spatial sizes must be multiples of this value.
    pub fn size_divisor(&self) -> usize {
        1 << self.num_levels().saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::EmptyDepth);
        }
        if let Some(level) = self.channels.iter().position(|c| *c == 0) {
            return Err(Error::ZeroChannels { level });
        }
        if self.in_channels == 0 || self.num_outputs == 0 {
            return Err(Error::InvalidShape(format!(
                "{} input channels and {} outputs",
                self.in_channels, self.num_outputs
            )));
        }
        check_divisible(self.height, self.width, self.num_levels())
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<UNet<B>> {
        self.validate()?;
        let levels = self.num_levels();

        let down_blocks = self
            .channels
            .iter()
            .enumerate()
            .map(|(level, &width)| {
                let in_channels = match level {
                    0 => self.in_channels,
                    _ => self.channels[level - 1],
                };
                ConvBlockConfig::new(in_channels, width)
                    .with_norm_momentum(self.norm_momentum)
                    .with_norm_epsilon(self.norm_epsilon)
                    .init(device)
            })
            .collect();

        // deepest first, the order in which they run
        let up_blocks = (0..levels - 1)
            .rev()
            .map(|level| {
                UpBlockConfig::new(self.channels[level + 1], self.channels[level])
                    .with_norm_momentum(self.norm_momentum)
                    .with_norm_epsilon(self.norm_epsilon)
                    .init(device)
            })
            .collect();

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let out_proj = Conv2dConfig::new([self.channels[0], self.num_outputs], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .with_initializer(he_normal())
            .init(device);

        log::debug!(
            "unet: {levels} levels {:?}, input {}x{}x{}, {} outputs",
            self.channels,
            self.height,
            self.width,
            self.in_channels,
            self.num_outputs
        );

        Ok(UNet {
            down_blocks,
            pool,
            up_blocks,
            out_proj,
        })
    }
}

fn check_divisible(height: usize, width: usize, levels: usize) -> Result<()> {
    let divisor = 1 << levels.saturating_sub(1);
    if height == 0 || width == 0 || height % divisor != 0 || width % divisor != 0 {
        return Err(Error::IndivisibleInput {
            height,
            width,
            divisor,
            levels,
        });
    }
    Ok(())
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    /// # Shape
    /// [n_levels]
    pub down_blocks: Vec<ConvBlock<B>>,
    pub pool: MaxPool2d,
    /// Deepest level first.
    ///
    /// # Shape
    /// [n_levels - 1]
    pub up_blocks: Vec<UpBlock<B>>,
    pub out_proj: Conv2d<B>,
}

impl<B: Backend> UNet<B> {
    pub fn num_levels(&self) -> usize {
        self.down_blocks.len()
    }

    /// Runs the network, returning the logits and what each expanding level concatenated.
    ///
    /// Fails if the input channels differ from the network's, if the spatial size
    /// cannot be halved at every level, or if the skip connections don't line up.
    ///
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, num_outputs, height, width]
    pub fn forward_traced(&self, x: Tensor<B, 4>) -> Result<(Tensor<B, 4>, Vec<SkipRecord>)> {
        let [_, channels, height, width] = x.dims();
        let levels = self.num_levels();
        let first = self.down_blocks.first().ok_or(Error::EmptyDepth)?;
        let [_, in_channels, _, _] = first.conv1.weight.dims();
        if channels != in_channels {
            return Err(Error::InputChannels {
                expected: in_channels,
                got: channels,
            });
        }
        check_divisible(height, width, levels)?;

        // contracting path
        let mut skips = SkipStack::with_capacity(levels - 1);
        let mut x = x;
        for (level, block) in self.down_blocks.iter().enumerate() {
            x = block.forward(x);
            log::debug!("down level {level}: {:?}", x.dims());
            if level + 1 < levels {
                skips.push(x.clone());
                x = self.pool.forward(x);
            }
        }

        // expanding path
        let mut records = Vec::with_capacity(levels - 1);
        for (block, level) in self.up_blocks.iter().zip((0..levels - 1).rev()) {
            let up = block.upsample(x);
            let skip = skips.pop(level)?;
            let [_, upsampled_channels, up_height, up_width] = up.dims();
            let [_, skip_channels, skip_height, skip_width] = skip.dims();
            if [up_height, up_width] != [skip_height, skip_width] {
                return Err(Error::SkipMismatch {
                    level,
                    upsampled: [up_height, up_width],
                    skip: [skip_height, skip_width],
                });
            }

            let joined = Tensor::cat(vec![up, skip], 1);
            let [_, concat_channels, _, _] = joined.dims();
            records.push(SkipRecord {
                level,
                upsampled_channels,
                skip_channels,
                concat_channels,
                height: up_height,
                width: up_width,
            });
            log::debug!("up level {level}: {:?}", joined.dims());

            x = block.refine(joined);
        }
        skips.finish()?;

        Ok((self.out_proj.forward(x), records))
    }

    /// # Panics
    /// On the errors described in [`Self::forward_traced`].
    ///
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, num_outputs, height, width]
    pub fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self.forward_traced(x) {
            Ok((logits, _records)) => logits,
            Err(e) => panic!("unet forward failed: {e}"),
        }
    }

    /// Per-pixel class probabilities, summing to one over the class axis.
    ///
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, num_outputs, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        softmax(self.forward_logits(x), 1)
    }

    /// Per-pixel cross-entropy, with every pixel treated as one classification item.
    ///
    /// # Shapes
    ///   - images [batch, in_channels, height, width]
    ///   - targets [batch, height, width]
    ///   - output [batch * height * width, num_outputs]
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> ClassificationOutput<B> {
        let [batch, _channels, height, width] = images.dims();
        assert_eq!([batch, height, width], targets.dims());

        let output = flatten_pixels(self.forward_logits(images));
        let targets = flatten_targets(targets);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::{Distribution, ElementConversion};

    fn random_input(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::random(shape, Distribution::Normal(0.0, 1.0), &Default::default())
    }

    #[test]
    fn logits_follow_the_input_batch_and_size() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(8)
            .with_width(16)
            .with_in_channels(2)
            .with_num_outputs(3)
            .with_channels(vec![4, 8]);
        let unet = config.init::<TestBackend>(&device).unwrap();

        let (logits, records) = unet.forward_traced(random_input([3, 2, 8, 16])).unwrap();
        assert_eq!([3, 3, 8, 16], logits.dims());
        assert_eq!(1, records.len());
    }

    #[test]
    fn two_levels_on_a_4x4_image() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(4)
            .with_width(4)
            .with_in_channels(1)
            .with_channels(vec![32, 64]);
        let unet = config.init::<TestBackend>(&device).unwrap();
        assert_eq!(2, unet.num_levels());
        assert_eq!(1, unet.up_blocks.len());

        let (logits, records) = unet.forward_traced(random_input([1, 1, 4, 4])).unwrap();
        assert_eq!([1, 2, 4, 4], logits.dims());
        assert_eq!(
            vec![SkipRecord {
                level: 0,
                upsampled_channels: 32,
                skip_channels: 32,
                concat_channels: 64,
                height: 4,
                width: 4,
            }],
            records
        );
    }

    #[test]
    fn output_keeps_the_input_size() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(16)
            .with_width(8)
            .with_channels(vec![4, 8, 16, 32])
            .with_num_outputs(3);
        let unet = config.init::<TestBackend>(&device).unwrap();

        let output = unet.forward(random_input([2, 3, 16, 8]));
        assert_eq!([2, 3, 16, 8], output.dims());
    }

    #[test]
    fn skips_are_matched_in_reverse_order() {
        let device = Default::default();
        let channels = vec![4, 8, 16];
        let config = UNetConfig::new()
            .with_height(8)
            .with_width(8)
            .with_channels(channels.clone());
        let unet = config.init::<TestBackend>(&device).unwrap();

        let (_logits, records) = unet.forward_traced(random_input([1, 3, 8, 8])).unwrap();
        assert_eq!(channels.len() - 1, records.len());

        let levels: Vec<usize> = records.iter().map(|r| r.level).collect();
        assert_eq!(vec![1, 0], levels);
        for record in &records {
            let width = channels[record.level];
            assert_eq!(width, record.skip_channels);
            assert_eq!(width, record.upsampled_channels);
            assert_eq!(
                record.skip_channels + record.upsampled_channels,
                record.concat_channels
            );
            assert_eq!(8 >> record.level, record.height);
        }
    }

    #[test]
    fn probabilities_sum_to_one_per_pixel() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(8)
            .with_width(8)
            .with_channels(vec![4, 8])
            .with_num_outputs(4);
        let unet = config.init::<TestBackend>(&device).unwrap();

        let output = unet.forward(random_input([2, 3, 8, 8]) * 10.0);
        let sums = output.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        assert_eq!(2 * 8 * 8, sums.len());
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5, "sum {sum}");
        }
    }

    #[test]
    fn single_level_has_no_skips() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(5)
            .with_width(3)
            .with_channels(vec![4]);
        let unet = config.init::<TestBackend>(&device).unwrap();

        let (logits, records) = unet.forward_traced(random_input([1, 3, 5, 3])).unwrap();
        assert_eq!([1, 2, 5, 3], logits.dims());
        assert!(records.is_empty());
    }

    #[test]
    fn indivisible_sizes_are_rejected() {
        let config = UNetConfig::new()
            .with_height(6)
            .with_width(8)
            .with_channels(vec![4, 8, 16]);
        assert!(matches!(
            config.validate(),
            Err(Error::IndivisibleInput {
                height: 6,
                width: 8,
                divisor: 4,
                levels: 3
            })
        ));
        assert!(config.init::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn empty_or_zero_widths_are_rejected() {
        let empty = UNetConfig::new().with_channels(vec![]);
        assert!(matches!(empty.validate(), Err(Error::EmptyDepth)));

        let zero = UNetConfig::new().with_channels(vec![8, 0, 32, 64, 128]);
        assert!(matches!(zero.validate(), Err(Error::ZeroChannels { level: 1 })));
    }

    #[test]
    fn forward_rejects_mismatched_inputs() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(8)
            .with_width(8)
            .with_channels(vec![4, 8]);
        let unet = config.init::<TestBackend>(&device).unwrap();

        assert!(matches!(
            unet.forward_traced(random_input([1, 3, 7, 8])),
            Err(Error::IndivisibleInput { .. })
        ));
        assert!(matches!(
            unet.forward_traced(random_input([1, 1, 8, 8])),
            Err(Error::InputChannels {
                expected: 3,
                got: 1
            })
        ));
    }

    #[test]
    fn per_pixel_classification_loss_is_finite() {
        let device = Default::default();
        let config = UNetConfig::new()
            .with_height(4)
            .with_width(4)
            .with_channels(vec![4, 8]);
        let unet = config.init::<TestBackend>(&device).unwrap();

        let targets = Tensor::<TestBackend, 3, Int>::zeros([2, 4, 4], &device);
        let output = unet.forward_classification(random_input([2, 3, 4, 4]), targets);
        assert_eq!([2 * 4 * 4, 2], output.output.dims());
        assert_eq!([2 * 4 * 4], output.targets.dims());
        let loss: f32 = output.loss.into_scalar().elem();
        assert!(loss.is_finite());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = UNetConfig::new().with_channels(vec![8, 16]);
        let json = config.to_string();
        let loaded = UNetConfig::load_binary(json.as_bytes()).unwrap();
        assert_eq!(config.channels, loaded.channels);
        assert_eq!(config.height, loaded.height);
    }
}
