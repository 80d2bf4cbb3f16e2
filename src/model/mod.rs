mod base;
mod plain;
mod small_unet;
mod unet;

use candle_core::{ModuleT, Tensor};
use candle_nn::VarBuilder;

pub use base::*;
pub use plain::*;
pub use small_unet::*;
pub use unet::*;

use crate::hyperparams::{Architecture, HyperParams};

pub enum SegmentationNet {
  MiniNet(PlainNet),
  OldNet(PlainNet),
  SmallNet(PlainNet),
  SmallUNet(SmallUNet),
  UNet(PlainUNet),
  UNet3l(UNet3l),
  UNet2(UNet2),
  InceptionUNet(InceptionUNet),
  Inception2UNet(Inception2UNet),
}

impl SegmentationNet {
  /// Builds the architecture named by `hps.net`.
  pub fn new(hps: &HyperParams, vb: VarBuilder) -> Result<Self, candle_core::Error> {
    hps
      .validate()
      .map_err(|e| candle_core::Error::Msg(e.to_string()).bt())?;

    tracing::info!(
      "Building {} ({} classes, {} channels, filters_base {})",
      hps.net,
      hps.n_classes(),
      hps.n_channels,
      hps.filters_base
    );

    Ok(match hps.net {
      Architecture::MiniNet => Self::MiniNet(PlainNet::new(hps, &MINI_NET, vb)?),
      Architecture::OldNet => Self::OldNet(PlainNet::new(hps, &OLD_NET, vb)?),
      Architecture::SmallNet => Self::SmallNet(PlainNet::new(hps, &SMALL_NET, vb)?),
      Architecture::SmallUNet => Self::SmallUNet(SmallUNet::new(hps, vb)?),
      Architecture::UNet => Self::UNet(PlainUNet::new(hps, vb)?),
      Architecture::UNet3l => Self::UNet3l(UNet3l::new(hps, vb)?),
      Architecture::UNet2 => Self::UNet2(UNet2::new(hps, vb)?),
      Architecture::InceptionUNet => Self::InceptionUNet(InceptionUNet::new(hps, vb)?),
      Architecture::Inception2UNet => Self::Inception2UNet(Inception2UNet::new(hps, vb)?),
    })
  }

  pub fn architecture(&self) -> Architecture {
    match self {
      Self::MiniNet(_) => Architecture::MiniNet,
      Self::OldNet(_) => Architecture::OldNet,
      Self::SmallNet(_) => Architecture::SmallNet,
      Self::SmallUNet(_) => Architecture::SmallUNet,
      Self::UNet(_) => Architecture::UNet,
      Self::UNet3l(_) => Architecture::UNet3l,
      Self::UNet2(_) => Architecture::UNet2,
      Self::InceptionUNet(_) => Architecture::InceptionUNet,
      Self::Inception2UNet(_) => Architecture::Inception2UNet,
    }
  }

  pub fn base(&self) -> &BaseNet {
    match self {
      Self::MiniNet(m) | Self::OldNet(m) | Self::SmallNet(m) => m.base(),
      Self::SmallUNet(m) => m.base(),
      Self::UNet(m) => m.base(),
      Self::UNet3l(m) => m.base(),
      Self::UNet2(m) => m.base(),
      Self::InceptionUNet(m) => m.base(),
      Self::Inception2UNet(m) => m.base(),
    }
  }

  pub fn base_mut(&mut self) -> &mut BaseNet {
    match self {
      Self::MiniNet(m) | Self::OldNet(m) | Self::SmallNet(m) => m.base_mut(),
      Self::SmallUNet(m) => m.base_mut(),
      Self::UNet(m) => m.base_mut(),
      Self::UNet3l(m) => m.base_mut(),
      Self::UNet2(m) => m.base_mut(),
      Self::InceptionUNet(m) => m.base_mut(),
      Self::Inception2UNet(m) => m.base_mut(),
    }
  }

  pub fn hps(&self) -> &HyperParams {
    self.base().hps()
  }

  pub fn global_step(&self) -> u64 {
    self.base().global_step()
  }

  pub fn set_global_step(&mut self, step: u64) {
    self.base_mut().set_global_step(step);
  }

  /// Called by the training loop once per optimizer step.
  pub fn increment_step(&mut self) -> u64 {
    self.base_mut().increment_step()
  }
}

impl ModuleT for SegmentationNet {
  fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::MiniNet(m) | Self::OldNet(m) | Self::SmallNet(m) => m.forward_t(x, train),
      Self::SmallUNet(m) => m.forward_t(x, train),
      Self::UNet(m) => m.forward_t(x, train),
      Self::UNet3l(m) => m.forward_t(x, train),
      Self::UNet2(m) => m.forward_t(x, train),
      Self::InceptionUNet(m) => m.forward_t(x, train),
      Self::Inception2UNet(m) => m.forward_t(x, train),
    }
  }
}
