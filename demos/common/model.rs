use burn::prelude::*;
use burn_unet::error::Result;
use burn_unet::prelude::*;

/// Config of a model that the demos can persist and re-initialize.
pub trait ModelConfigExt<B: Backend>: Config {
    type Model: Module<B>;
    fn init(&self, device: &B::Device) -> Result<Self::Model>;
}

impl<B: Backend> ModelConfigExt<B> for UNetConfig {
    type Model = UNet<B>;

    fn init(&self, device: &B::Device) -> Result<Self::Model> {
        UNetConfig::init(self, device)
    }
}

impl<B: Backend> ModelConfigExt<B> for DigitClassifierConfig {
    type Model = DigitClassifier<B>;

    fn init(&self, device: &B::Device) -> Result<Self::Model> {
        Ok(DigitClassifierConfig::init(self, device))
    }
}
