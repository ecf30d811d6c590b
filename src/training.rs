//! Training context and loop for the color segmentation network.

use crate::data::{
    CHANNELS, ColorShapesBatcher, ColorShapesConfig, ColorShapesDataset, NUM_OUTPUTS,
    SegmentationBatch, batch_count,
};
use crate::error::{Error, Result};
use crate::metrics::SegmentationRates;
use crate::unet::{UNet, UNetConfig};
use burn::data::dataloader::{DataLoader, DataLoaderBuilder, Progress};
use burn::module::AutodiffModule;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::train::ClassificationOutput;
use burn::train::metric::{
    AccuracyMetric, Adaptor, LossMetric, Metric, MetricMetadata, Numeric,
};
use std::sync::Arc;

#[derive(Config, Debug)]
pub struct SegmentationTrainingConfig {
    pub model: UNetConfig,
    pub data: ColorShapesConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    #[config(default = 0)]
    pub seed: u64,
    /// Evaluate on the test split every this many epochs.
    #[config(default = 1)]
    pub display_step: usize,
}

impl SegmentationTrainingConfig {
    /// Checks that the model fits the generated images.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.data.validate()?;
        let model = (
            self.model.height,
            self.model.width,
            self.model.in_channels,
            self.model.num_outputs,
        );
        let data = (self.data.height, self.data.width, CHANNELS, NUM_OUTPUTS);
        if model != data {
            return Err(Error::InvalidShape(format!(
                "model expects (height, width, channels, classes) {model:?}, data provides {data:?}"
            )));
        }
        if self.batch_size == 0 || self.display_step == 0 {
            return Err(Error::InvalidConfig(format!(
                "batch_size ({}) and display_step ({}) must be at least 1",
                self.batch_size, self.display_step
            )));
        }
        Ok(())
    }
}

pub type SegmentationOptim<AutoB> = OptimizerAdaptor<Adam, UNet<AutoB>, AutoB>;

pub type SegmentationDataloader<B> = Arc<dyn DataLoader<B, SegmentationBatch<B>> + 'static>;

/// Everything a training step needs: the model, its optimizer and the learning rate.
pub struct SegmentationLearner<AutoB: AutodiffBackend> {
    model: UNet<AutoB>,
    optim: SegmentationOptim<AutoB>,
    lr: f64,
}

impl<AutoB: AutodiffBackend> SegmentationLearner<AutoB> {
    /// A freshly initialized model and optimizer.
    pub fn new(config: &SegmentationTrainingConfig, device: &AutoB::Device) -> Result<Self> {
        let model = config.model.init(device)?;
        let optim = config.optimizer.init::<AutoB, UNet<AutoB>>();
        Ok(Self::from_parts(model, optim, config.lr))
    }

    pub fn from_parts(model: UNet<AutoB>, optim: SegmentationOptim<AutoB>, lr: f64) -> Self {
        Self { model, optim, lr }
    }

    pub fn into_parts(self) -> (UNet<AutoB>, SegmentationOptim<AutoB>) {
        (self.model, self.optim)
    }

    pub fn model(&self) -> &UNet<AutoB> {
        &self.model
    }

    pub fn optim(&self) -> &SegmentationOptim<AutoB> {
        &self.optim
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// The model without gradient tracking, for evaluation.
    pub fn valid_model(&self) -> UNet<AutoB::InnerBackend> {
        self.model.valid()
    }

    /// Forward, backward and one optimizer step.
    ///
    /// Returns the output computed before the parameters were updated.
    pub fn train_step(&mut self, batch: SegmentationBatch<AutoB>) -> ClassificationOutput<AutoB> {
        let output = self
            .model
            .forward_classification(batch.images, batch.targets);

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);

        output
    }
}

/// Pixel rates over the whole loader.
pub fn evaluate<B: Backend>(
    model: &UNet<B>,
    dataloader: &SegmentationDataloader<B>,
) -> SegmentationRates {
    let rates: Vec<(SegmentationRates, usize)> = dataloader
        .iter()
        .map(|batch| {
            let [batch_size, _classes, height, width] = batch.masks.dims();
            let probabilities = model.forward(batch.images);
            let rates = SegmentationRates::from_predictions(probabilities, batch.masks);
            (rates, batch_size * height * width)
        })
        .collect();
    SegmentationRates::weighted_mean(&rates)
}

/// Generates both splits and wraps them in loaders producing batches on `device`,
/// the test split whitened with the training statistics.
pub fn dataloaders<AutoB: AutodiffBackend>(
    config: &SegmentationTrainingConfig,
    device: &AutoB::Device,
) -> Result<(
    SegmentationDataloader<AutoB>,
    SegmentationDataloader<AutoB::InnerBackend>,
)> {
    let dataset_train = ColorShapesDataset::train(&config.data)?;
    let dataset_test = ColorShapesDataset::test(&config.data)?;
    dataset_train.print();
    dataset_test.print();

    let batcher = ColorShapesBatcher::new(dataset_train.whitening());

    let dataloader_train = DataLoaderBuilder::<AutoB, _, _>::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset_train);
    let dataloader_valid = DataLoaderBuilder::<AutoB::InnerBackend, _, _>::new(batcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset_test);
    Ok((dataloader_train, dataloader_valid))
}

/// Trains on freshly generated color shapes for `num_epochs`, logging the running training
/// loss and the test rates every `display_step` epochs.
pub fn train<AutoB: AutodiffBackend>(
    config: &SegmentationTrainingConfig,
    mut learner: SegmentationLearner<AutoB>,
    device: &AutoB::Device,
) -> Result<SegmentationLearner<AutoB>> {
    config.validate()?;
    AutoB::seed(device, config.seed);

    let (dataloader_train, dataloader_valid) = dataloaders::<AutoB>(config, device)?;

    let train_num_items = dataloader_train.num_items();
    let num_batches = batch_count(train_num_items, config.batch_size);

    let mut metric_meta = MetricMetadata {
        progress: Progress::new(0, train_num_items),
        epoch: 1,
        epoch_total: config.num_epochs,
        iteration: 0,
        lr: Some(learner.lr()),
    };

    log::info!(
        "Start training: batch size {}, learning rate {}, {} epochs of {num_batches} batches",
        config.batch_size,
        learner.lr(),
        config.num_epochs
    );
    for epoch in 1..config.num_epochs + 1 {
        metric_meta.epoch = epoch;
        metric_meta.progress = Progress::new(0, train_num_items);
        let mut loss_metric = LossMetric::<AutoB>::new();
        let mut acc_metric = AccuracyMetric::<AutoB>::new();

        for (b, batch) in dataloader_train.iter().enumerate() {
            let [batch_size, _channels, _height, _width] = batch.images.dims();
            metric_meta.iteration += 1;
            metric_meta.progress.items_processed += batch_size;

            let output = learner.train_step(batch);
            loss_metric.update(&output.adapt(), &metric_meta);
            acc_metric.update(&output.adapt(), &metric_meta);

            let loss = loss_metric.value().current();
            if !loss.is_finite() {
                log::warn!("epoch {epoch}, batch {}: non-finite loss {loss}", b + 1);
            }
            log::debug!(
                "Epoch {epoch}/{}, Batch {:0>4}/{num_batches}, Loss {loss:.5}, Pixel Acc {:.2}",
                config.num_epochs,
                b + 1,
                acc_metric.value().current(),
            );
        }

        if (epoch - 1) % config.display_step == 0 {
            let rates = evaluate(&learner.valid_model(), &dataloader_valid);
            log::info!(
                "Epoch {epoch:2}: training loss={:2.5} test accuracy={:2.5} false positives={:2.5} false negatives={:2.5}",
                loss_metric.running_value().current(),
                rates.accuracy,
                rates.false_positive,
                rates.false_negative,
            );
        }
    }
    log::info!("Training finished.");

    Ok(learner)
}
