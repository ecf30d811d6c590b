//! Kept alone in its own test binary: the backend seed is process-wide, so no other
//! test may draw random numbers between seeding and initialization.

use burn::backend::{Autodiff, NdArray};
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn_unet::prelude::*;

type AutoB = Autodiff<NdArray<f32>>;

fn tiny_config() -> SegmentationTrainingConfig {
    SegmentationTrainingConfig::new(
        UNetConfig::new()
            .with_height(8)
            .with_width(8)
            .with_channels(vec![4, 8]),
        ColorShapesConfig::new()
            .with_height(8)
            .with_width(8)
            .with_num_train(2)
            .with_num_test(1)
            .with_min_size(2),
        AdamConfig::new(),
    )
}

/// Seeds the backend, builds a fresh model and batch, and returns the loss of one step.
fn seeded_step_loss(config: &SegmentationTrainingConfig, seed: u64) -> f32 {
    let device = Default::default();
    AutoB::seed(&device, seed);
    let model = config.model.init::<AutoB>(&device).unwrap();
    let optim = config.optimizer.init();
    let mut learner = SegmentationLearner::from_parts(model, optim, config.lr);

    let dataset = ColorShapesDataset::train(&config.data).unwrap();
    let batcher = ColorShapesBatcher::new(dataset.whitening());
    let items: Vec<_> = (0..2).map(|i| dataset.get(i).unwrap()).collect();
    let batch: SegmentationBatch<AutoB> = batcher.batch(items, &device);

    learner.train_step(batch).loss.into_scalar().elem()
}

#[test]
fn one_step_loss_depends_only_on_the_seed() {
    let config = tiny_config();

    let first = seeded_step_loss(&config, 42);
    let second = seeded_step_loss(&config, 42);
    assert!(first.is_finite(), "loss {first}");
    assert_eq!(first, second);

    let other = seeded_step_loss(&config, 7);
    assert!(other.is_finite(), "loss {other}");
    assert_ne!(first, other);
}
