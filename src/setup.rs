use candle_core::Device;
use dstl_segnet::{checkpoint::MODEL_FILE, hyperparams::HPS_FILE, Error, HyperParams};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::ModelArgs;

pub fn setup_tracing(verbose: bool) {
  let subscriber = FmtSubscriber::builder()
    .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
    .with_target(false)
    .finish();

  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");
}

pub fn setup_device(args: &ModelArgs) -> Result<Device, candle_core::Error> {
  if args.use_cpu {
    return Ok(Device::Cpu);
  }

  let device = Device::cuda_if_available(0)?;
  if device.is_cpu() {
    tracing::warn!("No GPU available, running on CPU...");
  }

  Ok(device)
}

/// Hyperparams from the model directory when it has them, defaults otherwise,
/// with the command-line overrides applied on top. A directory holding weights
/// must also hold the hyperparams they were built with.
pub fn setup_hps(args: &ModelArgs) -> dstl_segnet::Result<HyperParams> {
  let mut hps = match &args.model_dir {
    Some(dir) if dir.join(HPS_FILE).exists() => HyperParams::from_dir(dir)?,
    Some(dir) if dir.join(MODEL_FILE).exists() => {
      return Err(Error::Checkpoint(format!(
        "{} has {MODEL_FILE} but no {HPS_FILE}",
        dir.display()
      )));
    }
    Some(dir) => {
      tracing::info!("No {HPS_FILE} in {}, using defaults", dir.display());
      HyperParams::default()
    }
    None => HyperParams::default(),
  };

  hps.update(&args.hps)?;
  Ok(hps)
}
