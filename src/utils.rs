use candle_core::{Tensor, D};

pub trait TensorExt {
  /// Nearest-neighbour 2x upsampling of an `(n, c, h, w)` tensor, every source
  /// pixel becomes a 2x2 block.
  fn upsample2d(&self) -> Result<Self, candle_core::Error>
  where
    Self: Sized;

  /// Drops `border` pixels from every spatial edge of an `(n, c, h, w)` tensor.
  fn crop_border(&self, border: usize) -> Result<Self, candle_core::Error>
  where
    Self: Sized;
}

fn repeat_index(len: usize, device: &candle_core::Device) -> Result<Tensor, candle_core::Error> {
  let idx: Vec<u32> = (0..len * 2).map(|i| (i / 2) as u32).collect();
  Tensor::from_vec(idx, len * 2, device)
}

impl TensorExt for Tensor {
  fn upsample2d(&self) -> Result<Self, candle_core::Error> {
    let (_, _, h, w) = self.shape().dims4()?;

    let x = self
      .contiguous()?
      .index_select(&repeat_index(h, self.device())?, 2)?;
    x.index_select(&repeat_index(w, self.device())?, D::Minus1)
  }

  fn crop_border(&self, border: usize) -> Result<Self, candle_core::Error> {
    if border == 0 {
      return Ok(self.clone());
    }

    let (_, _, h, w) = self.shape().dims4()?;
    if h <= 2 * border || w <= 2 * border {
      return Err(
        candle_core::Error::Msg(format!(
          "cannot crop a border of {border} from a {h}x{w} feature map"
        ))
        .bt(),
      );
    }

    self
      .narrow(3, border, w - 2 * border)?
      .narrow(2, border, h - 2 * border)
  }
}
