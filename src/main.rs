mod cli;
mod setup;

use candle_core::{DType, ModuleT, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use dstl_segnet::{
  checkpoint::{self, MODEL_FILE},
  labels, SegmentationNet,
};

use crate::{
  cli::{Cli, Command, ModelArgs},
  setup::{setup_device, setup_hps, setup_tracing},
};

fn main() -> anyhow::Result<()> {
  let args = Cli::parse();
  setup_tracing(args.verbose);

  match args.command {
    Command::Init { model } => init(&model),
    Command::Inspect { model, batch } => inspect(&model, batch),
    Command::RemapLabels {
      input_path,
      output_path,
    } => {
      labels::remap_label_file(&input_path, &output_path)?;
      Ok(())
    }
  }
}

fn init(args: &ModelArgs) -> anyhow::Result<()> {
  let Some(dir) = &args.model_dir else {
    anyhow::bail!("`init` needs a model directory");
  };

  let hps = setup_hps(args)?;
  let device = setup_device(args)?;

  let varmap = VarMap::new();
  let net = SegmentationNet::new(&hps, VarBuilder::from_varmap(&varmap, DType::F32, &device))?;

  hps.save_to_dir(dir)?;
  checkpoint::save(dir.join(MODEL_FILE), &varmap, &net)?;

  Ok(())
}

fn inspect(args: &ModelArgs, batch: usize) -> anyhow::Result<()> {
  let hps = setup_hps(args)?;
  let device = setup_device(args)?;

  let mut varmap = VarMap::new();
  let mut net = SegmentationNet::new(&hps, VarBuilder::from_varmap(&varmap, DType::F32, &device))?;

  if let Some(dir) = &args.model_dir {
    let path = dir.join(MODEL_FILE);
    if path.exists() {
      checkpoint::load(&path, &mut varmap, &mut net)?;
    }
  }

  let size = hps.input_size();
  let x = Tensor::rand(0f32, 1f32, (batch, hps.n_channels, size, size), &device)?;
  let y = net.forward_t(&x, false)?;

  let (lo, hi) = y
    .flatten_all()?
    .to_vec1::<f32>()?
    .into_iter()
    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
      (lo.min(v), hi.max(v))
    });
  let n_params: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();

  tracing::info!("Input {:?} -> output {:?}", x.dims(), y.dims());
  tracing::info!("Output range [{lo:.4}, {hi:.4}]");
  tracing::info!(
    "{} with {n_params} parameters at step {}",
    net.architecture(),
    net.global_step()
  );

  Ok(())
}
