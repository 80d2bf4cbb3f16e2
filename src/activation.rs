use std::{fmt, str::FromStr};

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::Error;

const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;
const LEAKY_RELU_SLOPE: f64 = 0.01;

/// Activations selectable through the `activation` hyperparam.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
  Relu,
  LeakyRelu,
  Elu,
  Selu,
  Gelu,
  Silu,
  Tanh,
}

impl Activation {
  pub const ALL: [Self; 7] = [
    Self::Relu,
    Self::LeakyRelu,
    Self::Elu,
    Self::Selu,
    Self::Gelu,
    Self::Silu,
    Self::Tanh,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::Relu => "relu",
      Self::LeakyRelu => "leaky_relu",
      Self::Elu => "elu",
      Self::Selu => "selu",
      Self::Gelu => "gelu",
      Self::Silu => "silu",
      Self::Tanh => "tanh",
    }
  }

  pub fn forward(self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::Relu => x.relu(),
      Self::LeakyRelu => candle_nn::ops::leaky_relu(x, LEAKY_RELU_SLOPE),
      Self::Elu => x.elu(1.),
      Self::Selu => x.elu(SELU_ALPHA)?.affine(SELU_SCALE, 0.),
      Self::Gelu => x.gelu_erf(),
      Self::Silu => x.silu(),
      Self::Tanh => x.tanh(),
    }
  }
}

impl fmt::Display for Activation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Activation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|a| a.name() == s)
      .ok_or_else(|| Error::InvalidValue {
        name: "activation".to_owned(),
        value: s.to_owned(),
      })
  }
}
