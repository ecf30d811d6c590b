use crate::dataset::{HEIGHT, NUM_CLASSES, WIDTH};
use burn_unet::prelude::*;

pub fn model_config() -> DigitClassifierConfig {
    DigitClassifierConfig::new()
        .with_height(HEIGHT)
        .with_width(WIDTH)
        .with_hidden_size(512)
        .with_dropout(0.2)
        .with_num_classes(NUM_CLASSES)
}
