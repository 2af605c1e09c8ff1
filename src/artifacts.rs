use std::fs;
use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::backend::Backend,
};
use tracing::info;

use crate::config::VaeConfig;
use crate::decoder::Decoder;
use crate::error::Result;
use crate::model::VaeModel;

/// Hyperparameters, saved as JSON.
pub const CONFIG_FILE: &str = "config.json";
/// Full encoder + decoder weights.
pub const MODEL_FILE: &str = "vae";
/// Decoder weights alone, for generation.
pub const DECODER_FILE: &str = "decoder";

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

/// Writes the config, the full model and a separate decoder snapshot into `dir`.
pub fn save_artifacts<B: Backend>(
    model: &VaeModel<B>,
    config: &VaeConfig,
    dir: impl AsRef<Path>,
) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    config.save(dir.join(CONFIG_FILE))?;
    model.clone().save_file(dir.join(MODEL_FILE), &recorder())?;
    model
        .decoder
        .clone()
        .save_file(dir.join(DECODER_FILE), &recorder())?;

    info!(dir = %dir.display(), "saved model artifacts");
    Ok(())
}

/// Reads back the configuration saved by [`save_artifacts`].
pub fn load_config(dir: impl AsRef<Path>) -> Result<VaeConfig> {
    let config = VaeConfig::load(dir.as_ref().join(CONFIG_FILE))?;
    config.validate()?;
    Ok(config)
}

/// Restores the trained decoder for generation.
pub fn load_decoder<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(VaeConfig, Decoder<B>)> {
    let dir = dir.as_ref();
    let config = load_config(dir)?;
    let decoder =
        Decoder::new(&config, device).load_file(dir.join(DECODER_FILE), &recorder(), device)?;
    Ok((config, decoder))
}

/// Restores the full model, e.g. to resume training.
pub fn load_model<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(VaeConfig, VaeModel<B>)> {
    let dir = dir.as_ref();
    let config = load_config(dir)?;
    let model =
        VaeModel::new(&config, device)?.load_file(dir.join(MODEL_FILE), &recorder(), device)?;
    Ok((config, model))
}
