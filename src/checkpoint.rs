//! Weights plus the step counter, stored together in one safetensors file.

use std::{collections::HashMap, path::Path};

use candle_core::{Device, Tensor};
use candle_nn::VarMap;

use crate::{
  error::{Error, Result},
  model::SegmentationNet,
};

pub const GLOBAL_STEP_KEY: &str = "global_step";
pub const MODEL_FILE: &str = "model.safetensors";

pub fn save(path: impl AsRef<Path>, varmap: &VarMap, net: &SegmentationNet) -> Result<()> {
  let path = path.as_ref();

  let data = varmap
    .data()
    .lock()
    .map_err(|_| Error::Checkpoint("variable map lock poisoned".to_owned()))?;
  let mut tensors: HashMap<String, Tensor> = data
    .iter()
    .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
    .collect();
  drop(data);

  let step = i64::try_from(net.global_step())
    .map_err(|_| Error::Checkpoint(format!("step {} overflows", net.global_step())))?;
  tensors.insert(
    GLOBAL_STEP_KEY.to_owned(),
    Tensor::new(&[step], &Device::Cpu)?,
  );

  candle_core::safetensors::save(&tensors, path)?;
  tracing::info!(
    "Saved {} tensors at step {step} to {}",
    tensors.len() - 1,
    path.display()
  );

  Ok(())
}

/// Restores every variable of `varmap` and the step counter of `net`.
pub fn load(path: impl AsRef<Path>, varmap: &mut VarMap, net: &mut SegmentationNet) -> Result<()> {
  let path = path.as_ref();

  let step = read_global_step(path)?;
  varmap.load(path)?;
  net.set_global_step(step);

  tracing::info!("Restored {} at step {step} from {}", net.architecture(), path.display());
  Ok(())
}

pub fn read_global_step(path: impl AsRef<Path>) -> Result<u64> {
  let path = path.as_ref();
  let tensors = candle_core::safetensors::load(path, &Device::Cpu)?;

  let Some(step) = tensors.get(GLOBAL_STEP_KEY) else {
    return Err(Error::Checkpoint(format!(
      "{} has no `{GLOBAL_STEP_KEY}` entry",
      path.display()
    )));
  };

  let step = step.flatten_all()?.to_vec1::<i64>()?;
  match step.as_slice() {
    [step] => u64::try_from(*step)
      .map_err(|_| Error::Checkpoint(format!("negative step {step} in {}", path.display()))),
    _ => Err(Error::Checkpoint(format!(
      "`{GLOBAL_STEP_KEY}` in {} is not a scalar",
      path.display()
    ))),
  }
}
