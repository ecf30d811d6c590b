use crate::common::{
    backend::RecorderTy,
    cli::{AppArgs, MODEL_NAME},
    error::{DemoError, Result},
};
use burn::data::dataloader::{DataLoaderBuilder, batcher::Batcher};
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn::record::FileRecorder;
use burn::tensor::ElementConversion;
use burn_unet::prelude::*;

/// Measures the trained model on the test split, then looks closer at its first image.
pub fn infer<B: Backend>(
    training_config: &SegmentationTrainingConfig,
    device: &B::Device,
    app_args: &AppArgs,
) -> Result<()> {
    let model: UNet<B> = app_args
        .load_model::<B, _>(&training_config.model, device)?
        .ok_or_else(|| {
            let ext = <RecorderTy as FileRecorder<B>>::file_extension();
            let path = app_args.artifacts_path.join(MODEL_NAME).with_extension(ext);
            DemoError::MissingArtifact(path)
        })?;

    // the whitening statistics come from the (regenerated) training split
    let whitening = ColorShapesDataset::train(&training_config.data)?.whitening();
    let dataset_test = ColorShapesDataset::test(&training_config.data)?;
    let first = dataset_test
        .get(0)
        .ok_or_else(|| DemoError::Dataset("the test split is empty".to_string()))?;

    let batcher = ColorShapesBatcher::new(whitening);
    let dataloader: SegmentationDataloader<B> = DataLoaderBuilder::new(batcher.clone())
        .batch_size(training_config.batch_size)
        .set_device(device.clone())
        .build(dataset_test);

    let rates = evaluate(&model, &dataloader);
    log::info!(
        "test accuracy={:2.5} false positives={:2.5} false negatives={:2.5}",
        rates.accuracy,
        rates.false_positive,
        rates.false_negative,
    );

    let batch: SegmentationBatch<B> = batcher.batch(vec![first], device);
    let (logits, skips) = model.forward_traced(batch.images.clone())?;
    for skip in &skips {
        log::debug!("{skip:?}");
    }
    let probabilities = burn::tensor::activation::softmax(logits, 1);
    let predicted = probabilities.clone().argmax(1);
    let predicted_targets: i64 = predicted.sum().into_scalar().elem();
    let true_targets: i64 = batch.targets.sum().into_scalar().elem();
    let first_rates = SegmentationRates::from_predictions(probabilities, batch.masks);
    log::info!(
        "first test image: {predicted_targets} pixels segmented as target for {true_targets} true ones, accuracy={:2.5}",
        first_rates.accuracy
    );

    let restored = whitening.unwhiten_img(batch.images);
    let mean_color: Vec<f32> = (0..CHANNELS)
        .map(|c| restored.clone().narrow(1, c, 1).mean().into_scalar().elem())
        .collect();
    log::info!("first test image: mean color {mean_color:.3?}");

    Ok(())
}
