use crate::common::{
    backend::RecorderTy,
    cli::{AppArgs, MODEL_NAME},
    error::{DemoError, Result},
};
use crate::dataset::{MnistBatcher, MnistDataset, MnistItem};
use crate::training::{Dataloader, DigitTrainingConfig, epoch_valid};
use burn::data::dataloader::{DataLoaderBuilder, batcher::Batcher};
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn::record::FileRecorder;
use burn_unet::prelude::*;

/// Evaluates the trained classifier on the test images and shows its first predictions.
pub fn infer<B: Backend>(
    training_config: &DigitTrainingConfig,
    model_config: &DigitClassifierConfig,
    show: usize,
    device: &B::Device,
    app_args: &AppArgs,
) -> Result<()> {
    let model: DigitClassifier<B> = app_args
        .load_model::<B, _>(model_config, device)?
        .ok_or_else(|| {
            let ext = <RecorderTy as FileRecorder<B>>::file_extension();
            let path = app_args.artifacts_path.join(MODEL_NAME).with_extension(ext);
            DemoError::MissingArtifact(path)
        })?;

    let dataset_test = MnistDataset::test()?;
    let items: Vec<MnistItem> = (0..show.min(dataset_test.len()))
        .filter_map(|i| dataset_test.get(i))
        .collect();

    let batcher = MnistBatcher::default();
    let dataloader: Dataloader<B> = DataLoaderBuilder::new(batcher.clone())
        .batch_size(training_config.batch_size)
        .set_device(device.clone())
        .build(dataset_test);
    let (loss, acc) = epoch_valid(&dataloader, model.clone(), training_config, 0);
    log::info!("Test loss {loss:.4}, Test accuracy {acc:.2}");

    if items.is_empty() {
        return Ok(());
    }
    let batch = Batcher::<B, _, _>::batch(&batcher, items, device);
    let predicted = model.forward(batch.images).argmax(1).flatten::<1>(0, 1);
    let predicted = predicted.into_data().convert::<i64>().to_vec::<i64>();
    let expected = batch.targets.into_data().convert::<i64>().to_vec::<i64>();
    let (Ok(predicted), Ok(expected)) = (predicted, expected) else {
        return Err(DemoError::Dataset("unreadable predictions".to_string()));
    };
    log::info!("predicted/expected:");
    for (p, e) in predicted.iter().zip(&expected) {
        log::info!("- {p}/{e}");
    }
    Ok(())
}
