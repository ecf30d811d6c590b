use burn_unet::prelude::*;

/// Five levels over 64x64 RGB images, background and target outputs.
pub fn model_config() -> UNetConfig {
    UNetConfig::new()
        .with_height(64)
        .with_width(64)
        .with_in_channels(CHANNELS)
        .with_channels(vec![32, 64, 128, 256, 512])
        .with_num_outputs(NUM_OUTPUTS)
}
