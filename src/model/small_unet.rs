use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::BaseNet;
use crate::{hyperparams::HyperParams, utils::TensorExt};

/// Single-level U-Net with fixed widths.
pub struct SmallUNet {
  base: BaseNet,
  conv1: Conv2d,
  conv2: Conv2d,
  conv3: Conv2d,
  conv4: Conv2d,
  conv5: Conv2d,
  conv6: Conv2d,
  conv7: Conv2d,
}

impl SmallUNet {
  pub fn new(hps: &HyperParams, vb: VarBuilder) -> Result<Self, candle_core::Error> {
    let conf = Conv2dConfig {
      padding: 1,
      ..Default::default()
    };

    Ok(Self {
      base: BaseNet::new(hps),
      conv1: conv2d(hps.n_channels, 32, 3, conf, vb.pp("conv1"))?,
      conv2: conv2d(32, 32, 3, conf, vb.pp("conv2"))?,
      conv3: conv2d(32, 64, 3, conf, vb.pp("conv3"))?,
      conv4: conv2d(64, 64, 3, conf, vb.pp("conv4"))?,
      conv5: conv2d(64, 32, 3, conf, vb.pp("conv5"))?,
      conv6: conv2d(64, 32, 3, conf, vb.pp("conv6"))?,
      conv7: conv2d(32, hps.n_classes(), 3, conf, vb.pp("conv7"))?,
    })
  }

  pub fn base(&self) -> &BaseNet {
    &self.base
  }

  pub fn base_mut(&mut self) -> &mut BaseNet {
    &mut self.base
  }
}

impl ModuleT for SmallUNet {
  fn forward_t(&self, x: &Tensor, _train: bool) -> Result<Tensor, candle_core::Error> {
    let mut x = self.conv1.forward(x)?.relu()?;
    x = self.conv2.forward(&x)?.relu()?;

    let mut x1 = x.max_pool2d(2)?;
    x1 = self.conv3.forward(&x1)?.relu()?;
    x1 = self.conv4.forward(&x1)?.relu()?;
    x1 = self.conv5.forward(&x1)?.relu()?;
    x1 = x1.upsample2d()?;

    x = Tensor::cat(&[&x, &x1], 1)?;
    x = self.conv6.forward(&x)?.relu()?;

    self.base.output(&self.conv7.forward(&x)?)
  }
}
