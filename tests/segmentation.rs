use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamConfig;
use burn_unet::prelude::*;

type B = NdArray<f32>;
type AutoB = Autodiff<B>;

fn tiny_config() -> SegmentationTrainingConfig {
    SegmentationTrainingConfig::new(
        UNetConfig::new()
            .with_height(8)
            .with_width(8)
            .with_channels(vec![4, 8, 16]),
        ColorShapesConfig::new()
            .with_height(8)
            .with_width(8)
            .with_num_train(6)
            .with_num_test(3)
            .with_min_size(2)
            .with_seed(11),
        AdamConfig::new(),
    )
    .with_num_epochs(2)
    .with_batch_size(4)
    .with_num_workers(1)
    .with_seed(11)
}

#[test]
fn trains_and_evaluates_end_to_end() {
    let device = Default::default();
    let config = tiny_config();
    let learner = SegmentationLearner::<AutoB>::new(&config, &device).unwrap();
    let learner = train(&config, learner, &device).unwrap();

    let (_, dataloader) = dataloaders::<AutoB>(&config, &device).unwrap();
    let rates = evaluate::<B>(&learner.valid_model(), &dataloader);
    for rate in [rates.accuracy, rates.false_positive, rates.false_negative] {
        assert!((0.0..=1.0).contains(&rate), "{rates:?}");
    }
    let total = rates.accuracy + rates.false_positive + rates.false_negative;
    assert!((total - 1.0).abs() < 1e-4, "{rates:?}");
}

#[test]
fn learner_can_be_rebuilt_from_its_parts() {
    let device = Default::default();
    let config = tiny_config().with_num_epochs(1);
    let learner = SegmentationLearner::<AutoB>::new(&config, &device).unwrap();
    let (model, optim) = learner.into_parts();
    assert_eq!(3, model.num_levels());

    let learner = SegmentationLearner::from_parts(model, optim, 1e-2);
    assert_eq!(1e-2, learner.lr());
    let learner = train(&config, learner, &device).unwrap();
    assert_eq!(2, learner.model().up_blocks.len());
}

#[test]
fn training_refuses_a_model_that_does_not_fit_the_data() {
    let device = Default::default();
    let config = tiny_config();
    let config = SegmentationTrainingConfig {
        model: config.model.clone().with_in_channels(1),
        ..config
    };
    let learner = SegmentationLearner::<AutoB>::new(&config, &device).unwrap();
    assert!(matches!(
        train(&config, learner, &device),
        Err(Error::InvalidShape(_))
    ));
}
