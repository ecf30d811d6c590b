use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// He-normal initialization, `std = sqrt(2 / fan_in)`.
pub(crate) fn he_normal() -> Initializer {
    Initializer::KaimingNormal {
        gain: core::f64::consts::SQRT_2,
        fan_out_only: false,
    }
}

/// Batch normalization where `momentum` weights the running statistics:
/// `running = momentum * running + (1 - momentum) * batch`.
///
/// burn's `momentum` weights the batch statistics instead.
pub(crate) fn batch_norm<B: Backend>(
    num_features: usize,
    momentum: f64,
    epsilon: f64,
    device: &B::Device,
) -> BatchNorm<B> {
    BatchNormConfig::new(num_features)
        .with_momentum(1.0 - momentum)
        .with_epsilon(epsilon)
        .init(device)
}

/// Feature extraction: two 3x3 convolutions, each followed by a relu, then a batch normalization.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub norm: BatchNorm<B>,
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = 0.95)]
    pub norm_momentum: f64,
    #[config(default = 1e-3)]
    pub norm_epsilon: f64,
}

impl ConvBlockConfig {
    /// Returns the initialized block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let conv1 = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(he_normal())
            .init(device);
        let conv2 = Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(he_normal())
            .init(device);
        let norm = batch_norm(self.out_channels, self.norm_momentum, self.norm_epsilon, device);
        ConvBlock { conv1, conv2, norm }
    }
}

impl<B: Backend> ConvBlock<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));
        self.norm.forward(x)
    }
}

/// Expanding stage: a stride-2 transposed convolution doubling the spatial size,
/// followed by a [`ConvBlock`] over the concatenation with the skip connection.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    pub up: ConvTranspose2d<B>,
    pub block: ConvBlock<B>,
}

#[derive(Config, Debug)]
pub struct UpBlockConfig {
    /// Channels coming from the deeper level.
    pub in_channels: usize,
    /// Channel width of this level, shared by the upsampled map and the skip connection.
    pub out_channels: usize,
    #[config(default = 0.95)]
    pub norm_momentum: f64,
    #[config(default = 1e-3)]
    pub norm_epsilon: f64,
}

impl UpBlockConfig {
    /// Returns the initialized block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpBlock<B> {
        // out = (in - 1) * 2 - 2 * 1 + 3 + 1 = 2 * in
        let up = ConvTranspose2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_padding_out([1, 1])
            .init(device);
        let block = ConvBlockConfig::new(2 * self.out_channels, self.out_channels)
            .with_norm_momentum(self.norm_momentum)
            .with_norm_epsilon(self.norm_epsilon)
            .init(device);
        UpBlock { up, block }
    }
}

impl<B: Backend> UpBlock<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, 2 * height, 2 * width]
    pub fn upsample(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.up.forward(x))
    }

    /// # Shapes
    ///   - Input [batch, 2 * out_channels, height, width]
    ///   - Output [batch, out_channels, height, width]
    pub fn refine(&self, joined: Tensor<B, 4>) -> Tensor<B, 4> {
        self.block.forward(joined)
    }
}
