use crate::common::{cli::AppArgs, error::Result};
use crate::model::model_config;
use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use burn_unet::prelude::*;
use std::time::Instant;

pub fn training_config() -> SegmentationTrainingConfig {
    SegmentationTrainingConfig::new(model_config(), ColorShapesConfig::new(), AdamConfig::new())
        .with_num_epochs(10)
        .with_batch_size(4)
        .with_num_workers(2)
        .with_lr(1e-3)
}

/// Trains the model and optimizer found in the artifacts directory (or new ones),
/// saving them back once done.
pub fn train<AutoB: AutodiffBackend>(
    training_config: &SegmentationTrainingConfig,
    training_device: &AutoB::Device,
    app_args: &AppArgs,
) -> Result<()> {
    AutoB::seed(training_device, training_config.seed);

    // load (or init and save) model and optim
    let model = app_args.load_or_save_model::<AutoB, _>(&training_config.model, training_device)?;
    let optim = app_args.load_or_save_optim::<AutoB, UNet<AutoB>, _>(
        &training_config.optimizer,
        training_device,
    )?;
    let learner = SegmentationLearner::from_parts(model, optim, training_config.lr);

    let start = Instant::now();
    let learner = burn_unet::training::train(training_config, learner, training_device)?;
    log::info!("Training Complete in {:.2} secs", start.elapsed().as_secs_f64());

    // save assets
    let (model, optim) = learner.into_parts();
    app_args.save_model(&model)?;
    app_args.save_optim(&optim)?;
    Ok(())
}
