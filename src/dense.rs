//! Fully-connected digit classifier: flatten, dense + relu, dropout, dense.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use burn::train::ClassificationOutput;

#[derive(Config, Debug)]
pub struct DigitClassifierConfig {
    #[config(default = 28)]
    pub height: usize,
    #[config(default = 28)]
    pub width: usize,
    #[config(default = 512)]
    pub hidden_size: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
    #[config(default = 10)]
    pub num_classes: usize,
}

impl DigitClassifierConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitClassifier<B> {
        let hidden = LinearConfig::new(self.height * self.width, self.hidden_size)
            .with_bias(true)
            .init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        let output = LinearConfig::new(self.hidden_size, self.num_classes)
            .with_bias(true)
            .init(device);
        DigitClassifier {
            hidden,
            dropout,
            output,
        }
    }
}

#[derive(Module, Debug)]
pub struct DigitClassifier<B: Backend> {
    pub hidden: Linear<B>,
    pub dropout: Dropout,
    pub output: Linear<B>,
}

impl<B: Backend> DigitClassifier<B> {
    /// # Shapes
    ///   - Input [batch, height, width]
    ///   - Output [batch, num_classes]
    pub fn forward_logits(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, height, width] = images.dims();
        let [input_size, _hidden] = self.hidden.weight.dims();
        assert_eq!(input_size, height * width);

        let x = images.reshape([batch, height * width]);
        let x = relu(self.hidden.forward(x));
        let x = self.dropout.forward(x);
        self.output.forward(x)
    }

    /// # Shapes
    ///   - Input [batch, height, width]
    ///   - Output [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.forward_logits(images), 1)
    }

    /// # Shapes
    ///   - images [batch, height, width]
    ///   - targets [batch]
    pub fn forward_classification(
        &self,
        images: Tensor<B, 3>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let [batch, _height, _width] = images.dims();
        assert_eq!([batch], targets.dims());

        let output = self.forward_logits(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{TestAutodiffBackend, TestBackend};
    use burn::optim::{AdamConfig, GradientsParams, Optimizer};
    use burn::tensor::{Distribution, ElementConversion};

    #[test]
    fn classifies_into_ten_probabilities() {
        let device = Default::default();
        let model = DigitClassifierConfig::new().init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 3>::random([3, 28, 28], Distribution::Uniform(0.0, 1.0), &device);

        let probabilities = model.forward(images);
        assert_eq!([3, 10], probabilities.dims());
        let sums = probabilities
            .sum_dim(1)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn a_training_step_keeps_the_loss_finite() {
        let device = Default::default();
        let model = DigitClassifierConfig::new()
            .with_height(4)
            .with_width(4)
            .with_hidden_size(8)
            .init::<TestAutodiffBackend>(&device);
        let mut optim = AdamConfig::new().init::<TestAutodiffBackend, DigitClassifier<_>>();

        let images = Tensor::<TestAutodiffBackend, 3>::ones([2, 4, 4], &device);
        let targets = Tensor::<TestAutodiffBackend, 1, Int>::from_data([3, 7], &device);
        let output = model.forward_classification(images, targets);
        let loss: f32 = output.loss.clone().into_scalar().elem();
        assert!(loss.is_finite());

        let grads = GradientsParams::from_grads(output.loss.backward(), &model);
        let model = optim.step(1e-3, model, grads);
        assert_eq!([16, 8], model.hidden.weight.dims());
    }
}
