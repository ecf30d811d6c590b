use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_unet::prelude::*;
pub use common::{
    backend::{MainAutoBackend, MainBackend, MainDevice},
    cli::AppArgs,
    error::Result,
};
use training::DigitTrainingConfig;

pub mod inference;
pub mod model;
pub mod training;

#[path = "../common/mod.rs"]
pub mod common;

pub use common::mnist::dataset;

pub fn launch<B, AutoB>(app_args: &AppArgs) -> Result<()>
where
    B: Backend + MainDevice,
    AutoB: AutodiffBackend + MainDevice,
{
    app_args.create_artifact_dir()?;

    // setup training and model configs
    let training_config: DigitTrainingConfig = app_args
        .load_training_config()?
        .unwrap_or_else(training::training_config);
    let model_config = app_args
        .load_model_config::<AutoB, DigitClassifierConfig>()?
        .unwrap_or_else(model::model_config);
    // save configs
    app_args.save_training_config(&training_config)?;
    app_args.save_model_config(&model_config)?;

    if app_args.training {
        let training_device = AutoB::main_device();
        training::train::<AutoB>(&training_config, &model_config, &training_device, app_args)?;
    }

    if app_args.inference {
        let infer_device = B::main_device();
        let show = 10;
        inference::infer::<B>(&training_config, &model_config, show, &infer_device, app_args)?;
    }

    if !app_args.inference && !app_args.training {
        log::warn!("neither training nor inference were enabled");
        println!("{}", common::cli::HELP);
    }
    Ok(())
}

fn main() {
    common::cli::init_logging();
    let result = AppArgs::parse().and_then(|app_args| launch::<MainBackend, MainAutoBackend>(&app_args));
    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}
