mod inception;
mod unet2;
mod unet_conv;

use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

pub use inception::*;
pub use unet2::*;
pub use unet_conv::*;

use super::BaseNet;
use crate::{hyperparams::HyperParams, utils::TensorExt};

/// Width multipliers of the encoder levels, relative to `filters_base`.
pub const FILTER_FACTORS: [usize; 5] = [1, 2, 4, 8, 16];

/// A block that can fill one level of the U-Net skeleton.
pub trait UNetBlock: ModuleT + Sized {
  fn new(
    hps: &HyperParams,
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error>;
}

/// Encoder/decoder with skip connections, every level built from `M`.
pub struct UNet<M: UNetBlock> {
  base: BaseNet,
  down: Vec<M>,
  up: Vec<M>,
  conv_final: Conv2d,
}

pub type PlainUNet = UNet<DoubleConv>;
pub type UNet3l = UNet<TripleConv>;
pub type InceptionUNet = UNet<InceptionBlock>;
pub type Inception2UNet = UNet<Inception2Block>;

impl<M: UNetBlock> UNet<M> {
  pub fn new(hps: &HyperParams, vb: VarBuilder) -> Result<Self, candle_core::Error> {
    Self::with_filter_factors(hps, &FILTER_FACTORS, vb)
  }

  pub fn with_filter_factors(
    hps: &HyperParams,
    filter_factors: &[usize],
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let filter_sizes: Vec<usize> = filter_factors
      .iter()
      .map(|f| hps.filters_base * f)
      .collect();

    let Some(&top_filters) = filter_sizes.first() else {
      return Err(candle_core::Error::Msg("U-Net needs at least one level".to_owned()).bt());
    };

    let mut down = Vec::with_capacity(filter_sizes.len());
    let mut up = Vec::with_capacity(filter_sizes.len() - 1);

    for (i, &nf) in filter_sizes.iter().enumerate() {
      let low_nf = if i == 0 {
        hps.n_channels
      } else {
        filter_sizes[i - 1]
      };

      down.push(M::new(hps, low_nf, nf, vb.pp(format!("down_{i}")))?);

      if i != 0 {
        up.push(M::new(hps, low_nf + nf, low_nf, vb.pp(format!("up_{i}")))?);
      }
    }

    let conv_final = conv2d(
      top_filters,
      hps.n_classes(),
      1,
      Conv2dConfig::default(),
      vb.pp("conv_final"),
    )?;

    tracing::debug!("U-Net filter sizes: {filter_sizes:?}");

    Ok(Self {
      base: BaseNet::new(hps),
      down,
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

impl<M: UNetBlock> ModuleT for UNet<M> {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    let mut xs: Vec<Tensor> = Vec::with_capacity(self.down.len());

    for down in &self.down {
      let input = match xs.last() {
        Some(prev) => prev.max_pool2d(2)?,
        None => x.clone(),
      };
      let x_out = down.forward_t(&input, train)?;
      tracing::debug!("encoder level {}: {:?}", xs.len(), x_out.dims());
      xs.push(self.base.dropout2d(&x_out, train)?);
    }

    let Some((x_last, skips)) = xs.split_last() else {
      return Err(candle_core::Error::Msg("U-Net has no levels".to_owned()).bt());
    };

    let mut x_out = x_last.clone();
    for (x_skip, up) in skips.iter().zip(&self.up).rev() {
      let x_cat = Tensor::cat(&[&x_out.upsample2d()?, x_skip], 1)?;
      x_out = self.base.dropout2d(&up.forward_t(&x_cat, train)?, train)?;
    }

    self.base.output(&self.conv_final.forward(&x_out)?)
  }
}
