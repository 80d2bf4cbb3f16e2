use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{
  batch_norm, conv2d_no_bias, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, VarBuilder,
};

use super::UNetBlock;
use crate::{activation::Activation, hyperparams::HyperParams};

struct BasicConv2d {
  conv: Conv2d,
  bn: BatchNorm,
}

impl BasicConv2d {
  fn new(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let conv = conv2d_no_bias(
      in_channels,
      out_channels,
      kernel_size,
      Conv2dConfig {
        padding: kernel_size / 2,
        ..Default::default()
      },
      vb.pp("conv"),
    )?;
    let bn = batch_norm(out_channels, BatchNormConfig::default(), vb.pp("bn"))?;

    Ok(Self { conv, bn })
  }
}

impl ModuleT for BasicConv2d {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let z = self.conv.forward(x)?;
    self.bn.forward_t(&z, train)?.relu()
  }
}

/// Widths of the 1x1, 3x3 and 5x5 branches: 3/8, 3/8 and 2/8 of `out_channels`.
pub fn branch_widths(out_channels: usize) -> [usize; 3] {
  let wide = out_channels * 3 / 8;
  [wide, wide, out_channels * 2 / 8]
}

/// Three parallel branches (1x1, 1x1 -> 3x3, 1x1 -> 5x5) concatenated on the
/// channel axis.
pub struct InceptionBlock {
  conv1x1: BasicConv2d,
  conv3x3_pre: BasicConv2d,
  conv3x3: BasicConv2d,
  conv5x5_pre: BasicConv2d,
  conv5x5: BasicConv2d,
}

impl UNetBlock for InceptionBlock {
  fn new(
    hps: &HyperParams,
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    if !hps.batch_norm() {
      return Err(candle_core::Error::Msg("inception blocks require bn=1".to_owned()).bt());
    }

    if hps.activation != Activation::Relu {
      return Err(
        candle_core::Error::Msg(format!(
          "inception blocks require relu activation, got {}",
          hps.activation
        ))
        .bt(),
      );
    }

    let [out_1, out_3, out_5] = branch_widths(out_channels);
    if out_1 + out_3 + out_5 != out_channels {
      return Err(
        candle_core::Error::Msg(format!(
          "inception block width {out_channels} does not split into 3/8 + 3/8 + 2/8"
        ))
        .bt(),
      );
    }

    if in_channels < 4 {
      return Err(
        candle_core::Error::Msg(format!(
          "inception block needs at least 4 input channels, got {in_channels}"
        ))
        .bt(),
      );
    }

    Ok(Self {
      conv1x1: BasicConv2d::new(in_channels, out_1, 1, vb.pp("conv1x1"))?,
      conv3x3_pre: BasicConv2d::new(in_channels, in_channels / 2, 1, vb.pp("conv3x3_pre"))?,
      conv3x3: BasicConv2d::new(in_channels / 2, out_3, 3, vb.pp("conv3x3"))?,
      conv5x5_pre: BasicConv2d::new(in_channels, in_channels / 4, 1, vb.pp("conv5x5_pre"))?,
      conv5x5: BasicConv2d::new(in_channels / 4, out_5, 5, vb.pp("conv5x5"))?,
    })
  }
}

impl ModuleT for InceptionBlock {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let x1 = self.conv1x1.forward_t(x, train)?;

    let x3 = self.conv3x3_pre.forward_t(x, train)?;
    let x3 = self.conv3x3.forward_t(&x3, train)?;

    let x5 = self.conv5x5_pre.forward_t(x, train)?;
    let x5 = self.conv5x5.forward_t(&x5, train)?;

    Tensor::cat(&[x1, x3, x5], 1)
  }
}

/// Two chained inception blocks.
pub struct Inception2Block {
  l1: InceptionBlock,
  l2: InceptionBlock,
}

impl UNetBlock for Inception2Block {
  fn new(
    hps: &HyperParams,
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    Ok(Self {
      l1: InceptionBlock::new(hps, in_channels, out_channels, vb.pp("l1"))?,
      l2: InceptionBlock::new(hps, out_channels, out_channels, vb.pp("l2"))?,
    })
  }
}

impl ModuleT for Inception2Block {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let x = self.l1.forward_t(x, train)?;
    self.l2.forward_t(&x, train)
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device};
  use candle_nn::VarMap;

  use super::*;

  fn vb(varmap: &VarMap) -> VarBuilder<'_> {
    VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
  }

  #[test]
  fn branch_split_for_64() {
    assert_eq!(branch_widths(64), [24, 24, 16]);
    assert_eq!(branch_widths(64).iter().sum::<usize>(), 64);
  }

  #[test]
  fn block_concatenates_to_requested_width() {
    let varmap = VarMap::new();
    let block = InceptionBlock::new(&HyperParams::default(), 12, 64, vb(&varmap)).unwrap();

    let x = Tensor::randn(0f32, 1., (1, 12, 8, 8), &Device::Cpu).unwrap();
    let y = block.forward_t(&x, false).unwrap();
    assert_eq!(y.dims(), &[1, 64, 8, 8]);

    let x1 = block.conv1x1.forward_t(&x, false).unwrap();
    assert_eq!(x1.dim(1).unwrap(), 24);
  }

  #[test]
  fn requires_batch_norm_and_relu() {
    let varmap = VarMap::new();

    let no_bn = HyperParams {
      bn: 0,
      ..HyperParams::default()
    };
    assert!(InceptionBlock::new(&no_bn, 12, 32, vb(&varmap)).is_err());

    let elu = HyperParams {
      activation: Activation::Elu,
      ..HyperParams::default()
    };
    assert!(Inception2Block::new(&elu, 12, 32, vb(&varmap)).is_err());
  }

  #[test]
  fn rejects_uneven_width() {
    let varmap = VarMap::new();
    assert!(InceptionBlock::new(&HyperParams::default(), 12, 12, vb(&varmap)).is_err());
  }
}
