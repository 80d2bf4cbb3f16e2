use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::BaseNet;
use crate::hyperparams::HyperParams;

/// Hidden `(out_channels, kernel_size)` stages of a plain stack plus the kernel
/// of the final class projection.
pub struct StageLayout {
  pub hidden: &'static [(usize, usize)],
  pub final_kernel: usize,
}

pub const MINI_NET: StageLayout = StageLayout {
  hidden: &[(4, 1), (8, 3)],
  final_kernel: 3,
};

pub const OLD_NET: StageLayout = StageLayout {
  hidden: &[(64, 5), (64, 5), (64, 5)],
  final_kernel: 7,
};

pub const SMALL_NET: StageLayout = StageLayout {
  hidden: &[(64, 3), (64, 3), (64, 3), (128, 3)],
  final_kernel: 3,
};

fn same_conv(
  in_channels: usize,
  out_channels: usize,
  kernel_size: usize,
  vb: VarBuilder,
) -> Result<Conv2d, candle_core::Error> {
  conv2d(
    in_channels,
    out_channels,
    kernel_size,
    Conv2dConfig {
      padding: kernel_size / 2,
      ..Default::default()
    },
    vb,
  )
}

/// Straight convolution stack without skips.
pub struct PlainNet {
  base: BaseNet,
  hidden: Vec<Conv2d>,
  conv_final: Conv2d,
}

impl PlainNet {
  pub fn new(
    hps: &HyperParams,
    layout: &StageLayout,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let mut in_channels = hps.n_channels;
    let mut hidden = Vec::with_capacity(layout.hidden.len());

    for (i, &(out_channels, kernel_size)) in layout.hidden.iter().enumerate() {
      hidden.push(same_conv(
        in_channels,
        out_channels,
        kernel_size,
        vb.pp(format!("conv{}", i + 1)),
      )?);
      in_channels = out_channels;
    }

    let conv_final = same_conv(
      in_channels,
      hps.n_classes(),
      layout.final_kernel,
      vb.pp(format!("conv{}", layout.hidden.len() + 1)),
    )?;

    Ok(Self {
      base: BaseNet::new(hps),
      hidden,
      conv_final,
    })
  }

  pub fn base(&self) -> &BaseNet {
    &self.base
  }

  pub fn base_mut(&mut self) -> &mut BaseNet {
    &mut self.base
  }
}

impl ModuleT for PlainNet {
  fn forward_t(&self, x: &Tensor, _train: bool) -> Result<Tensor, candle_core::Error> {
    let mut z = x.clone();

    for conv in &self.hidden {
      z = conv.forward(&z)?.relu()?;
    }

    self.base.output(&self.conv_final.forward(&z)?)
  }
}
