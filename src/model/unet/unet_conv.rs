use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{batch_norm, conv2d, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, VarBuilder};

use super::UNetBlock;
use crate::{activation::Activation, hyperparams::HyperParams};

/// 3x3 "same" convolution, optional batch norm, configured activation.
pub struct Conv3BN {
  conv: Conv2d,
  bn: Option<BatchNorm>,
  activation: Activation,
}

impl Conv3BN {
  pub fn new(
    hps: &HyperParams,
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let conv = conv2d(
      in_channels,
      out_channels,
      3,
      Conv2dConfig {
        padding: 1,
        ..Default::default()
      },
      vb.pp("conv"),
    )?;

    let bn = if hps.batch_norm() {
      Some(batch_norm(
        out_channels,
        BatchNormConfig::default(),
        vb.pp("bn"),
      )?)
    } else {
      None
    };

    Ok(Self {
      conv,
      bn,
      activation: hps.activation,
    })
  }
}

impl ModuleT for Conv3BN {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let mut z = self.conv.forward(x)?;

    if let Some(bn) = &self.bn {
      z = bn.forward_t(&z, train)?;
    }

    self.activation.forward(&z)
  }
}

/// `DEPTH` stacked [`Conv3BN`] layers, the first one changing the width.
pub struct UNetConv<const DEPTH: usize> {
  layers: Vec<Conv3BN>,
}

pub type DoubleConv = UNetConv<2>;
pub type TripleConv = UNetConv<3>;

impl<const DEPTH: usize> UNetBlock for UNetConv<DEPTH> {
  fn new(
    hps: &HyperParams,
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let layers: Vec<Conv3BN> = (0..DEPTH)
      .map(|i| {
        let in_channels = if i == 0 { in_channels } else { out_channels };
        Conv3BN::new(hps, in_channels, out_channels, vb.pp(i))
      })
      .collect::<Result<_, candle_core::Error>>()?;

    Ok(Self { layers })
  }
}

impl<const DEPTH: usize> ModuleT for UNetConv<DEPTH> {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let mut z = x.clone();

    for layer in &self.layers {
      z = layer.forward_t(&z, train)?;
    }

    Ok(z)
  }
}
