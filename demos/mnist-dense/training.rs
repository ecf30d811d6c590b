use crate::common::{cli::AppArgs, error::Result};
use crate::dataset::{MnistBatch, MnistBatcher, MnistDataset};
use burn::prelude::*;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder, Progress},
    module::AutodiffModule,
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::backend::AutodiffBackend,
    train::metric::{AccuracyMetric, Adaptor, LossMetric, Metric, MetricMetadata, Numeric},
};
use burn_unet::prelude::*;
use std::sync::Arc;
use std::time::Instant;

#[derive(Config, Debug)]
pub struct DigitTrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    #[config(default = 0)]
    pub seed: u64,
    /// Share of the training images held out for validation.
    #[config(default = 0.2)]
    pub validation_split: f64,
}

pub fn training_config() -> DigitTrainingConfig {
    DigitTrainingConfig::new(AdamConfig::new())
}

pub type Dataloader<B> = Arc<dyn DataLoader<B, MnistBatch<B>> + 'static>;

type DigitOptim<AutoB> = OptimizerAdaptor<Adam, DigitClassifier<AutoB>, AutoB>;

pub fn train<AutoB: AutodiffBackend>(
    training_config: &DigitTrainingConfig,
    model_config: &DigitClassifierConfig,
    training_device: &AutoB::Device,
    app_args: &AppArgs,
) -> Result<()> {
    AutoB::seed(training_device, training_config.seed);

    // load (or init and save) model and optim
    let mut model = app_args.load_or_save_model::<AutoB, _>(model_config, training_device)?;
    let mut optim: DigitOptim<AutoB> = app_args
        .load_or_save_optim::<AutoB, DigitClassifier<AutoB>, _>(
            &training_config.optimizer,
            training_device,
        )?;

    let (dataset_train, dataset_valid) =
        MnistDataset::train_valid_split(training_config.validation_split, training_config.seed)?;
    let dataset_test = MnistDataset::test()?;

    let batcher = MnistBatcher::default();
    let dataloader_train: Dataloader<AutoB> = DataLoaderBuilder::new(batcher.clone())
        .batch_size(training_config.batch_size)
        .shuffle(training_config.seed)
        .num_workers(training_config.num_workers)
        .set_device(training_device.clone())
        .build(dataset_train);
    let dataloader_valid: Dataloader<AutoB::InnerBackend> = DataLoaderBuilder::new(batcher.clone())
        .batch_size(training_config.batch_size)
        .num_workers(training_config.num_workers)
        .set_device(training_device.clone())
        .build(dataset_valid);
    let dataloader_test: Dataloader<AutoB::InnerBackend> = DataLoaderBuilder::new(batcher)
        .batch_size(training_config.batch_size)
        .num_workers(training_config.num_workers)
        .set_device(training_device.clone())
        .build(dataset_test);

    let mut metric_meta = MetricMetadata {
        progress: Progress::new(0, dataloader_train.num_items()),
        epoch: 1,
        epoch_total: training_config.num_epochs,
        iteration: 0,
        lr: Some(training_config.lr),
    };

    log::info!(
        "Starting training: {} training and {} validation images",
        dataloader_train.num_items(),
        dataloader_valid.num_items()
    );
    let start = Instant::now();
    for epoch in 1..training_config.num_epochs + 1 {
        metric_meta.epoch = epoch;
        metric_meta.progress = Progress::new(0, dataloader_train.num_items());

        model = epoch_train::<AutoB>(
            &dataloader_train,
            model,
            training_config,
            &mut optim,
            &mut metric_meta,
        );

        // save assets
        app_args.save_model(&model)?;
        app_args.save_optim(&optim)?;

        let (loss, acc) = epoch_valid::<AutoB::InnerBackend>(
            &dataloader_valid,
            model.valid(),
            training_config,
            epoch,
        );
        log::info!(
            "Epoch {epoch}/{}, Avg Valid Loss {loss:.4}, Avg Valid Acc {acc:.2}",
            training_config.num_epochs
        );
    }
    log::info!("Training Complete in {:.2} secs", start.elapsed().as_secs_f64());

    let (loss, acc) = epoch_valid::<AutoB::InnerBackend>(
        &dataloader_test,
        model.valid(),
        training_config,
        training_config.num_epochs,
    );
    log::info!("Test loss {loss:.4}, Test accuracy {acc:.2}");
    Ok(())
}

pub fn epoch_train<AutoB: AutodiffBackend>(
    dataloader_train: &Dataloader<AutoB>,
    mut training_model: DigitClassifier<AutoB>,
    training_config: &DigitTrainingConfig,
    optim: &mut DigitOptim<AutoB>,
    metric_meta: &mut MetricMetadata,
) -> DigitClassifier<AutoB> {
    let mut loss_metric = LossMetric::<AutoB>::new();
    let mut acc_metric = AccuracyMetric::<AutoB>::new();
    let num_batches = dataloader_train
        .num_items()
        .div_ceil(training_config.batch_size);

    for (b, batch) in dataloader_train.iter().enumerate() {
        let [batch_size, _height, _width] = batch.images.dims();
        metric_meta.iteration += 1;
        metric_meta.progress.items_processed += batch_size;

        let output = training_model.forward_classification(batch.images, batch.targets);
        acc_metric.update(&output.adapt(), metric_meta);
        loss_metric.update(&output.adapt(), metric_meta);

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &training_model);
        training_model = optim.step(training_config.lr, training_model, grads);

        log::debug!(
            "Epoch {}/{}, Batch {:0>4}/{num_batches}, Loss {:.4}, Acc {:0>6.2}",
            metric_meta.epoch,
            metric_meta.epoch_total,
            b + 1,
            loss_metric.value().current(),
            acc_metric.value().current(),
        );
    }

    log::info!(
        "Epoch {}/{}, Avg Loss {:.4}, Avg Acc {:.2}",
        metric_meta.epoch,
        metric_meta.epoch_total,
        loss_metric.running_value().current(),
        acc_metric.running_value().current(),
    );

    training_model
}

/// Average loss and accuracy over the whole loader.
pub fn epoch_valid<B: Backend>(
    dataloader: &Dataloader<B>,
    valid_model: DigitClassifier<B>,
    training_config: &DigitTrainingConfig,
    epoch: usize,
) -> (f64, f64) {
    let mut metric_meta = MetricMetadata {
        progress: Progress::new(0, dataloader.num_items()),
        epoch,
        epoch_total: training_config.num_epochs,
        iteration: 0,
        lr: Some(training_config.lr),
    };

    let mut loss_metric = LossMetric::<B>::new();
    let mut acc_metric = AccuracyMetric::<B>::new();

    for batch in dataloader.iter() {
        let [batch_size, _height, _width] = batch.images.dims();
        metric_meta.iteration += 1;
        metric_meta.progress.items_processed += batch_size;

        let output = valid_model.forward_classification(batch.images, batch.targets);
        acc_metric.update(&output.adapt(), &metric_meta);
        loss_metric.update(&output.adapt(), &metric_meta);
    }

    (
        loss_metric.running_value().current(),
        acc_metric.running_value().current(),
    )
}
