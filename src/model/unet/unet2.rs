use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::{Conv3BN, DoubleConv, UNetBlock};
use crate::{hyperparams::HyperParams, model::BaseNet, utils::TensorExt};

/// U-Net variant with learned strided downsampling and a conv transform on
/// every skip connection.
pub struct UNet2 {
  base: BaseNet,
  down_pool: Vec<Conv2d>,
  down: Vec<DoubleConv>,
  mid: Vec<Conv3BN>,
  up: Vec<DoubleConv>,
  conv_final: Conv2d,
}

impl UNet2 {
  pub fn filter_sizes(filters_base: usize) -> Vec<usize> {
    let b = filters_base;
    vec![b * 2, b * 2, b * 4, b * 8, b * 16]
  }

  pub fn new(hps: &HyperParams, vb: VarBuilder) -> Result<Self, candle_core::Error> {
    let filters = Self::filter_sizes(hps.filters_base);

    let conf_down = Conv2dConfig {
      padding: 1,
      stride: 2,
      ..Default::default()
    };

    let mut down_pool = Vec::with_capacity(filters.len() - 1);
    let mut down = Vec::with_capacity(filters.len());
    let mut mid = Vec::with_capacity(filters.len() - 1);
    let mut up = Vec::with_capacity(filters.len() - 1);

    for (i, &nf) in filters.iter().enumerate() {
      let low_nf = if i == 0 {
        hps.n_channels
      } else {
        filters[i - 1]
      };

      // the first level sees the input directly, no pooling
      if i != 0 {
        down_pool.push(conv2d(
          low_nf,
          low_nf,
          3,
          conf_down,
          vb.pp(format!("down_pool_{i}")),
        )?);
      }

      down.push(DoubleConv::new(hps, low_nf, nf, vb.pp(format!("down_{i}")))?);

      if i != 0 {
        mid.push(Conv3BN::new(hps, low_nf, low_nf, vb.pp(format!("mid_{i}")))?);
        up.push(DoubleConv::new(
          hps,
          low_nf + nf,
          low_nf,
          vb.pp(format!("up_{i}")),
        )?);
      }
    }

    let conv_final = conv2d(
      filters[0],
      hps.n_classes(),
      1,
      Conv2dConfig::default(),
      vb.pp("conv_final"),
    )?;

    Ok(Self {
      base: BaseNet::new(hps),
      down_pool,
      down,
      mid,
      up,
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

impl ModuleT for UNet2 {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let mut xs: Vec<Tensor> = Vec::with_capacity(self.down.len());

    for (i, down) in self.down.iter().enumerate() {
      let x_out = match xs.last() {
        Some(prev) => down.forward_t(&self.down_pool[i - 1].forward(prev)?, train)?,
        None => down.forward_t(x, train)?,
      };
      xs.push(x_out);
    }

    let Some((x_last, skips)) = xs.split_last() else {
      return Err(candle_core::Error::Msg("UNet2 has no levels".to_owned()).bt());
    };

    let mut x_out = x_last.clone();
    for ((x_skip, up), mid) in skips.iter().zip(&self.up).zip(&self.mid).rev() {
      let x_skip = mid.forward_t(x_skip, train)?;
      x_out = up.forward_t(&Tensor::cat(&[&x_out.upsample2d()?, &x_skip], 1)?, train)?;
    }

    self.base.output(&self.conv_final.forward(&x_out)?)
  }
}
