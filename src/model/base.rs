use candle_core::{ModuleT, Tensor};
use candle_nn::{ops::sigmoid, Dropout};

use crate::{hyperparams::HyperParams, utils::TensorExt};

/// Spatial dropout, zeroes whole channels of an `(n, c, h, w)` tensor.
pub struct Dropout2d {
  drop_p: f32,
}

impl Dropout2d {
  pub fn new(drop_p: f32) -> Self {
    Self { drop_p }
  }
}

impl ModuleT for Dropout2d {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    if !train || self.drop_p <= 0. {
      return Ok(x.clone());
    }

    let (n, c, _, _) = x.shape().dims4()?;
    let keep = Tensor::rand(0f32, 1f32, (n, c, 1, 1), x.device())?
      .ge(self.drop_p)?
      .to_dtype(x.dtype())?
      .affine(1. / (1. - f64::from(self.drop_p)), 0.)?;

    x.broadcast_mul(&keep)
  }
}

/// State shared by every architecture: hyperparams, dropout and the step
/// counter that travels with checkpoints.
pub struct BaseNet {
  hps: HyperParams,
  dropout: Option<Dropout>,
  dropout2d: Option<Dropout2d>,
  global_step: u64,
}

impl BaseNet {
  pub fn new(hps: &HyperParams) -> Self {
    // no-op instead of a p=0 dropout, keeps the rng untouched
    let (dropout, dropout2d) = if hps.dropout > 0. {
      let p = hps.dropout as f32;
      (Some(Dropout::new(p)), Some(Dropout2d::new(p)))
    } else {
      (None, None)
    };

    Self {
      hps: hps.clone(),
      dropout,
      dropout2d,
      global_step: 0,
    }
  }

  pub fn hps(&self) -> &HyperParams {
    &self.hps
  }

  pub fn has_dropout(&self) -> bool {
    self.dropout.is_some()
  }

  pub fn dropout(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    match &self.dropout {
      Some(dropout) => dropout.forward_t(x, train),
      None => Ok(x.clone()),
    }
  }

  pub fn dropout2d(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    match &self.dropout2d {
      Some(dropout) => dropout.forward_t(x, train),
      None => Ok(x.clone()),
    }
  }

  /// Independent per-class probabilities over the valid interior.
  pub fn output(&self, logits: &Tensor) -> Result<Tensor, candle_core::Error> {
    sigmoid(&logits.crop_border(self.hps.patch_border)?)
  }

  pub fn global_step(&self) -> u64 {
    self.global_step
  }

  pub fn set_global_step(&mut self, step: u64) {
    self.global_step = step;
  }

  pub fn increment_step(&mut self) -> u64 {
    self.global_step += 1;
    self.global_step
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device};

  use super::*;

  #[test]
  fn zero_dropout_is_identity() {
    let base = BaseNet::new(&HyperParams::default());
    assert!(!base.has_dropout());

    let x = Tensor::ones((1, 2, 3, 3), DType::F32, &Device::Cpu).unwrap();
    let y = base.dropout2d(&x, true).unwrap();
    assert_eq!(
      y.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
      vec![1f32; 18]
    );
  }

  #[test]
  fn dropout2d_drops_whole_channels() {
    let dropout = Dropout2d::new(0.5);
    let x = Tensor::ones((4, 8, 3, 3), DType::F32, &Device::Cpu).unwrap();
    let y = dropout.forward_t(&x, true).unwrap();

    for channel in y.reshape((32, 9)).unwrap().to_vec2::<f32>().unwrap() {
      let first = channel[0];
      assert!(first == 0. || (first - 2.).abs() < 1e-6);
      assert!(channel.iter().all(|&v| v == first));
    }

    let eval = dropout.forward_t(&x, false).unwrap();
    assert_eq!(eval.sum_all().unwrap().to_scalar::<f32>().unwrap(), 288.);
  }

  #[test]
  fn element_dropout_only_in_training() {
    let hps = HyperParams {
      dropout: 0.5,
      ..HyperParams::default()
    };
    let base = BaseNet::new(&hps);
    assert!(base.has_dropout());

    let x = Tensor::ones((2, 4, 8, 8), DType::F32, &Device::Cpu).unwrap();
    let eval = base.dropout(&x, false).unwrap();
    assert_eq!(eval.sum_all().unwrap().to_scalar::<f32>().unwrap(), 512.);

    let train = base.dropout(&x, true).unwrap();
    let values = train.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(values.iter().all(|&v| v == 0. || (v - 2.).abs() < 1e-6));
  }

  #[test]
  fn step_counter_starts_at_zero() {
    let mut base = BaseNet::new(&HyperParams::default());
    assert_eq!(base.global_step(), 0);
    assert_eq!(base.increment_step(), 1);
    base.set_global_step(41);
    assert_eq!(base.increment_step(), 42);
  }

  #[test]
  fn output_crops_and_squashes() {
    let hps = HyperParams {
      patch_inner: 4,
      patch_border: 2,
      ..HyperParams::default()
    };
    let base = BaseNet::new(&hps);
    let logits = Tensor::randn(0f32, 10., (1, 3, 8, 8), &Device::Cpu).unwrap();
    let y = base.output(&logits).unwrap();

    assert_eq!(y.dims(), &[1, 3, 4, 4]);
    let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(values.iter().all(|v| (0. ..=1.).contains(v)));
  }
}
