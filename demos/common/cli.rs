use crate::common::error::{DemoError, Result};
use crate::common::{
    backend::{MainBackend, RecorderTy},
    model::ModelConfigExt,
    optim::OptimConfigExt,
};
use burn::module::AutodiffModule;
use burn::record::{FileRecorder, Recorder};
use burn::{optim::Optimizer, prelude::*, tensor::backend::AutodiffBackend};
use std::path::{Path, PathBuf};

pub const HELP: &str = "\
Burn U-Net Demo

A command-line tool for training and/or running inference with the demo models.
Models, optimizers, and configurations are persisted in an artifacts directory.

USAGE:
    demo-name [OPTIONS]

When no --training or --inference flag is provided, the program exits after handling configuration logic.

BEHAVIOR OVERVIEW
- The program manages two configurations: training config and model config.
- If --training-config or --model-config is given, the corresponding config is loaded from the specified file and saved to the artifacts directory (overwriting any existing file).
- If no explicit config file is provided for a component, the program attempts to load it from the artifacts directory; if absent, a default configuration is created and saved.
- The artifacts directory (--artifacts-path) is used to read/write model weights, optimizer state, and configurations. If not specified, a new temporary directory is created and its path is logged.
- With --remove-artifacts, any existing model and optimizer files in the artifacts directory are deleted before training (if --training is active).
- Model and optimizer weights are loaded from the artifacts directory if present; otherwise new ones are created and saved.
- If both --training and --inference are specified, training executes first, followed by inference using the trained model.

The log level defaults to info and can be changed with RUST_LOG (e.g. RUST_LOG=debug).

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -t, --training              Run training (creates or updates model / optimizer)
    -i, --inference             Run inference after training (if both flags are used) or immediately (if only inference is requested)
    -r, --remove-artifacts      Delete existing model and optimizer files from the artifacts directory before training
                                (has no effect if --training is not used)
    -c, --training-config <PATH>
                                Load training configuration from this file (overrides any config in artifacts directory)
    -m, --model-config <PATH>   Load model configuration from this file (overrides any config in artifacts directory)
    -a, --artifacts-path <PATH>
                                Directory where configurations, model weights, and optimizer state are saved and loaded.
                                If the directory does not exist, it will be created.
                                Defaults to a newly created temporary directory (path will be logged).
";

/// Logs to stderr, at info level for this crate and the demo unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let filter = format!("burn_unet=info,{}=info", std::env!("CARGO_CRATE_NAME"));
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

#[derive(Debug)]
pub struct AppArgs {
    pub training: bool,
    pub inference: bool,
    pub remove_artifacts: bool,
    pub training_config: Option<PathBuf>,
    pub model_config: Option<PathBuf>,
    pub artifacts_path: PathBuf,
}

impl AppArgs {
    pub fn parse() -> Result<Self> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{}", HELP);
            std::process::exit(0);
        }

        let training_config =
            pargs.opt_value_from_os_str(["-c", "--training-config"], parse_path)?;
        let model_config = pargs.opt_value_from_os_str(["-m", "--model-config"], parse_path)?;
        let artifacts_path = pargs.opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)?;
        let artifacts_path = match artifacts_path {
            Some(path) => path,
            None => {
                // e.g. /tmp/burn-unet-color-segmentation-abcd-0
                let name = format!(
                    "{}-{}-",
                    std::env!("CARGO_PKG_NAME"), // burn-unet
                    std::env!("CARGO_BIN_NAME")  // e.g. color-segmentation
                );
                let tmp = temp_dir::TempDir::with_prefix(name)?.dont_delete_on_drop();
                let path = tmp.path();
                log::info!("new artifacts directory: {path:?}");
                path.into()
            }
        };

        let args = AppArgs {
            training_config,
            model_config,
            artifacts_path,
            // must parse flags after values
            training: pargs.contains(["-t", "--training"]),
            inference: pargs.contains(["-i", "--inference"]),
            remove_artifacts: pargs.contains(["-r", "--remove-artifacts"]),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            let remaining = remaining
                .into_iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            return Err(pico_args::Error::UnusedArgsLeft(remaining).into());
        }

        Ok(args)
    }

    pub fn create_artifact_dir(&self) -> Result<()> {
        create_artifact_dir(&self.artifacts_path, self.remove_artifacts && self.training)
    }

    fn artifact_path(&self, name: &str, extension: &str) -> PathBuf {
        self.artifacts_path.join(name).with_extension(extension)
    }

    pub fn save_training_config(&self, training_config: &impl Config) -> Result<()> {
        let path = self.artifact_path(TRAINING_CONFIG_NAME, "json");
        save_config(&path, training_config)
    }

    /// The config given with `--training-config`, or else the one in the artifacts directory.
    pub fn load_training_config<TrainingConfig: Config>(&self) -> Result<Option<TrainingConfig>> {
        match &self.training_config {
            Some(path) => load_config(path, true),
            None => load_config(&self.artifact_path(TRAINING_CONFIG_NAME, "json"), false),
        }
    }

    pub fn save_model_config(&self, model_config: &impl Config) -> Result<()> {
        let path = self.artifact_path(MODEL_CONFIG_NAME, "json");
        save_config(&path, model_config)
    }

    /// The config given with `--model-config`, or else the one in the artifacts directory.
    pub fn load_model_config<B: Backend, ModelConfig: ModelConfigExt<B>>(
        &self,
    ) -> Result<Option<ModelConfig>> {
        match &self.model_config {
            Some(path) => load_config(path, true),
            None => load_config(&self.artifact_path(MODEL_CONFIG_NAME, "json"), false),
        }
    }

    pub fn save_model<B: Backend>(&self, model: &impl Module<B>) -> Result<()> {
        save_model(&self.artifacts_path, model)
    }

    pub fn load_model<B: Backend, ModelConfig: ModelConfigExt<B>>(
        &self,
        model_config: &ModelConfig,
        device: &B::Device,
    ) -> Result<Option<ModelConfig::Model>> {
        load_model(&self.artifacts_path, model_config, device)
    }

    pub fn load_or_save_model<B: Backend, ModelConfig: ModelConfigExt<B>>(
        &self,
        model_config: &ModelConfig,
        device: &B::Device,
    ) -> Result<ModelConfig::Model> {
        if let Some(model) = self.load_model(model_config, device)? {
            return Ok(model);
        }
        log::info!("Initializing new model");
        let model_init = model_config.init(device)?;
        self.save_model(&model_init)?;
        Ok(model_init)
    }

    pub fn save_optim<AutoB, AutoM>(&self, optim: &impl Optimizer<AutoM, AutoB>) -> Result<()>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
    {
        save_optim(&self.artifacts_path, optim)
    }

    pub fn load_optim<AutoB, AutoM, OptimConfig>(
        &self,
        optim_config: &OptimConfig,
        device: &AutoB::Device,
    ) -> Result<Option<OptimConfig::Adaptor>>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
        OptimConfig: OptimConfigExt<AutoB, AutoM>,
    {
        load_optim(&self.artifacts_path, optim_config, device)
    }

    pub fn load_or_save_optim<AutoB, AutoM, OptimConfig>(
        &self,
        optim_config: &OptimConfig,
        device: &AutoB::Device,
    ) -> Result<OptimConfig::Adaptor>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
        OptimConfig: OptimConfigExt<AutoB, AutoM>,
    {
        if let Some(optim) = self.load_optim(optim_config, device)? {
            return Ok(optim);
        }
        log::info!("Initializing new optim");
        let optim_init = optim_config.init();
        self.save_optim(&optim_init)?;
        Ok(optim_init)
    }
}

fn parse_path(s: &std::ffi::OsStr) -> std::result::Result<PathBuf, &'static str> {
    Ok(s.into())
}

/// Creates the directory for the configs, model and optim,
/// optionally removing a previous model and optim.
pub fn create_artifact_dir(artifact_dir: &Path, delete: bool) -> Result<()> {
    if delete {
        for name in [MODEL_NAME, OPTIM_NAME] {
            let path = recorder_path::<MainBackend>(artifact_dir, name);
            if std::fs::exists(&path)? {
                log::info!("removing {path:?}");
                std::fs::remove_file(&path)?;
            }
        }
    }
    std::fs::create_dir_all(artifact_dir)?;
    Ok(())
}

pub const TRAINING_CONFIG_NAME: &str = "training_config";
pub const MODEL_CONFIG_NAME: &str = "model_config";

pub fn save_config(path: &Path, config: &impl Config) -> Result<()> {
    log::info!("Saving config into {path:?}");
    config.save(path)?;
    Ok(())
}

/// Returns `None` for a missing file, unless it is `required`.
pub fn load_config<C: Config>(path: &Path, required: bool) -> Result<Option<C>> {
    if !required && !std::fs::exists(path)? {
        return Ok(None);
    }
    log::info!("Loading config from {path:?}");
    let config = C::load(path).map_err(|source| DemoError::ConfigFile {
        path: path.to_owned(),
        source,
    })?;
    Ok(Some(config))
}

/// Path of a recorded file, with the recorder's extension.
fn recorder_path<B: Backend>(artifact_dir: &Path, name: &str) -> PathBuf {
    let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
    artifact_dir.join(name).with_extension(file_ext)
}

pub const MODEL_NAME: &str = "model";
pub fn save_model<B: Backend>(artifact_dir: &Path, model: &impl Module<B>) -> Result<()> {
    let path = artifact_dir.join(MODEL_NAME);
    log::info!("Saving model to {:?}", recorder_path::<B>(artifact_dir, MODEL_NAME));
    model
        .clone()
        .save_file(path, &RecorderTy::new())?; // ext added automatically
    Ok(())
}

pub fn load_model<B: Backend, ModelConfig: ModelConfigExt<B>>(
    artifact_dir: &Path,
    model_config: &ModelConfig,
    device: &B::Device,
) -> Result<Option<ModelConfig::Model>> {
    let path_ext = recorder_path::<B>(artifact_dir, MODEL_NAME);
    if !std::fs::exists(&path_ext)? {
        return Ok(None);
    }
    log::info!("Loading model from {path_ext:?}");
    let model_init = model_config.init(device)?;
    let model = model_init.load_file(artifact_dir.join(MODEL_NAME), &RecorderTy::new(), device)?; // ext added automatically
    Ok(Some(model))
}

pub const OPTIM_NAME: &str = "optim";
pub fn save_optim<AutoB, AutoM, Optim>(artifact_dir: &Path, optim: &Optim) -> Result<()>
where
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
    Optim: Optimizer<AutoM, AutoB>,
{
    log::info!("Saving optim to {:?}", recorder_path::<AutoB>(artifact_dir, OPTIM_NAME));
    let record = optim.to_record();
    RecorderTy::new().record(record, artifact_dir.join(OPTIM_NAME))?; // ext added automatically
    Ok(())
}

pub fn load_optim<AutoB, AutoM, OptimConfig>(
    artifact_dir: &Path,
    optim_config: &OptimConfig,
    device: &AutoB::Device,
) -> Result<Option<OptimConfig::Adaptor>>
where
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
    OptimConfig: OptimConfigExt<AutoB, AutoM>,
{
    let path_ext = recorder_path::<AutoB>(artifact_dir, OPTIM_NAME);
    if !std::fs::exists(&path_ext)? {
        return Ok(None);
    }
    log::info!("Loading optim from {path_ext:?}");
    let optim_init = optim_config.init();
    let record = RecorderTy::new().load(artifact_dir.join(OPTIM_NAME), device)?; // ext added automatically
    Ok(Some(optim_init.load_record(record)))
}
