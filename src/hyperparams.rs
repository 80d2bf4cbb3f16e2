use std::{collections::BTreeMap, fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  activation::Activation,
  error::{Error, Result},
};

/// Size of the class universe the labels are drawn from.
pub const TOTAL_CLASSES: usize = 10;
pub const MAX_CHANNELS: usize = 20;
pub const HPS_FILE: &str = "hps.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
  MiniNet,
  OldNet,
  SmallNet,
  SmallUNet,
  UNet,
  UNet3l,
  UNet2,
  InceptionUNet,
  Inception2UNet,
}

impl Architecture {
  pub const ALL: [Self; 9] = [
    Self::MiniNet,
    Self::OldNet,
    Self::SmallNet,
    Self::SmallUNet,
    Self::UNet,
    Self::UNet3l,
    Self::UNet2,
    Self::InceptionUNet,
    Self::Inception2UNet,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::MiniNet => "MiniNet",
      Self::OldNet => "OldNet",
      Self::SmallNet => "SmallNet",
      Self::SmallUNet => "SmallUNet",
      Self::UNet => "UNet",
      Self::UNet3l => "UNet3l",
      Self::UNet2 => "UNet2",
      Self::InceptionUNet => "InceptionUNet",
      Self::Inception2UNet => "Inception2UNet",
    }
  }
}

impl fmt::Display for Architecture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Architecture {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|a| a.name() == s)
      .ok_or_else(|| Error::InvalidValue {
        name: "net".to_owned(),
        value: s.to_owned(),
      })
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperParams {
  pub classes: Vec<usize>,
  pub net: Architecture,
  pub n_channels: usize,
  pub thresholds: Vec<f64>,

  pub patch_inner: usize,
  pub patch_border: usize,

  /// Degrees.
  pub augment_rotations: f64,
  pub augment_flips: u32,
  pub augment_channels: u32,

  pub validation_square: usize,

  pub dropout: f64,
  pub bn: u32,
  pub activation: Activation,
  pub dice_loss: f64,
  pub dist_loss: f64,

  pub filters_base: usize,

  pub n_epochs: usize,
  pub oversample: f64,
  pub lr: f64,
  pub lr_decay: f64,
  pub batch_size: usize,
}

impl Default for HyperParams {
  fn default() -> Self {
    Self {
      classes: (0..TOTAL_CLASSES).collect(),
      net: Architecture::UNet,
      n_channels: 12,
      thresholds: vec![0.5],
      patch_inner: 64,
      patch_border: 16,
      augment_rotations: 10.,
      augment_flips: 0,
      augment_channels: 0,
      validation_square: 400,
      dropout: 0.,
      bn: 1,
      activation: Activation::Relu,
      dice_loss: 0.,
      dist_loss: 0.,
      filters_base: 32,
      n_epochs: 100,
      oversample: 0.,
      lr: 0.0001,
      lr_decay: 0.,
      batch_size: 128,
    }
  }
}

/// How an override string is coerced for a given field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
  Int,
  Float,
  Str,
  IntList,
  FloatList,
  Bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
  Int(i64),
  Float(f64),
  Str(String),
  IntList(Vec<i64>),
  FloatList(Vec<f64>),
}

pub const SCHEMA: &[(&str, FieldKind)] = &[
  ("classes", FieldKind::IntList),
  ("net", FieldKind::Str),
  ("n_channels", FieldKind::Int),
  ("thresholds", FieldKind::FloatList),
  ("patch_inner", FieldKind::Int),
  ("patch_border", FieldKind::Int),
  ("augment_rotations", FieldKind::Float),
  ("augment_flips", FieldKind::Int),
  ("augment_channels", FieldKind::Int),
  ("validation_square", FieldKind::Int),
  ("dropout", FieldKind::Float),
  ("bn", FieldKind::Int),
  ("activation", FieldKind::Str),
  ("dice_loss", FieldKind::Float),
  ("dist_loss", FieldKind::Float),
  ("filters_base", FieldKind::Int),
  ("n_epochs", FieldKind::Int),
  ("oversample", FieldKind::Float),
  ("lr", FieldKind::Float),
  ("lr_decay", FieldKind::Float),
  ("batch_size", FieldKind::Int),
];

pub fn coerce(name: &str, kind: FieldKind, raw: &str) -> Result<FieldValue> {
  let invalid = || Error::InvalidValue {
    name: name.to_owned(),
    value: raw.to_owned(),
  };
  let raw_trimmed = raw.trim();

  match kind {
    FieldKind::Bool => Err(Error::BooleanOverride(name.to_owned())),
    FieldKind::Int => raw_trimmed
      .parse()
      .map(FieldValue::Int)
      .map_err(|_| invalid()),
    FieldKind::Float => raw_trimmed
      .parse()
      .map(FieldValue::Float)
      .map_err(|_| invalid()),
    FieldKind::Str => Ok(FieldValue::Str(raw_trimmed.to_owned())),
    FieldKind::IntList => raw
      .split('-')
      .map(|v| v.trim().parse::<i64>())
      .collect::<std::result::Result<_, _>>()
      .map(FieldValue::IntList)
      .map_err(|_| invalid()),
    FieldKind::FloatList => raw
      .split('-')
      .map(|v| v.trim().parse::<f64>())
      .collect::<std::result::Result<_, _>>()
      .map(FieldValue::FloatList)
      .map_err(|_| invalid()),
  }
}

fn unsigned<T: TryFrom<i64>>(name: &str, v: i64) -> Result<T> {
  T::try_from(v).map_err(|_| Error::InvalidValue {
    name: name.to_owned(),
    value: v.to_string(),
  })
}

impl HyperParams {
  pub fn n_classes(&self) -> usize {
    self.classes.len()
  }

  pub fn has_all_classes(&self) -> bool {
    self.n_classes() == TOTAL_CLASSES
  }

  pub fn batch_norm(&self) -> bool {
    self.bn != 0
  }

  /// Side of the square input patch, inner region plus border on both sides.
  pub fn input_size(&self) -> usize {
    self.patch_inner + 2 * self.patch_border
  }

  pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
    let path = root.as_ref().join(HPS_FILE);
    let hps: Self = serde_json::from_str(&fs::read_to_string(&path)?)?;
    hps.validate()?;
    tracing::info!("Loaded hyperparams from {}", path.display());
    Ok(hps)
  }

  pub fn save_to_dir(&self, root: impl AsRef<Path>) -> Result<()> {
    let root = root.as_ref();
    fs::create_dir_all(root)?;
    fs::write(root.join(HPS_FILE), serde_json::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Applies comma-separated `name=value` overrides. Nothing is changed unless
  /// every name is known and every value coerces.
  pub fn update(&mut self, hps_string: &str) -> Result<()> {
    if hps_string.is_empty() {
      return Ok(());
    }

    let mut values = BTreeMap::new();
    for pair in hps_string.split(',') {
      let mut parts = pair.split('=');
      match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(value), None) => {
          values.insert(name, value);
        }
        _ => return Err(Error::MalformedOverride(pair.to_owned())),
      }
    }

    let mut updated = self.clone();
    for &(name, kind) in SCHEMA {
      if let Some(raw) = values.remove(name) {
        let value = coerce(name, kind, raw)?;
        updated.set(name, value, raw)?;
      }
    }

    if !values.is_empty() {
      return Err(Error::UnknownHyperParams(
        values.into_keys().map(str::to_owned).collect(),
      ));
    }

    updated.validate()?;
    *self = updated;
    Ok(())
  }

  fn set(&mut self, name: &str, value: FieldValue, raw: &str) -> Result<()> {
    match (name, value) {
      ("classes", FieldValue::IntList(v)) => {
        self.classes = v
          .into_iter()
          .map(|c| unsigned(name, c))
          .collect::<Result<_>>()?;
      }
      ("net", FieldValue::Str(v)) => self.net = v.parse()?,
      ("n_channels", FieldValue::Int(v)) => self.n_channels = unsigned(name, v)?,
      ("thresholds", FieldValue::FloatList(v)) => self.thresholds = v,
      ("patch_inner", FieldValue::Int(v)) => self.patch_inner = unsigned(name, v)?,
      ("patch_border", FieldValue::Int(v)) => self.patch_border = unsigned(name, v)?,
      ("augment_rotations", FieldValue::Float(v)) => self.augment_rotations = v,
      ("augment_flips", FieldValue::Int(v)) => self.augment_flips = unsigned(name, v)?,
      ("augment_channels", FieldValue::Int(v)) => self.augment_channels = unsigned(name, v)?,
      ("validation_square", FieldValue::Int(v)) => self.validation_square = unsigned(name, v)?,
      ("dropout", FieldValue::Float(v)) => self.dropout = v,
      ("bn", FieldValue::Int(v)) => self.bn = unsigned(name, v)?,
      ("activation", FieldValue::Str(v)) => self.activation = v.parse()?,
      ("dice_loss", FieldValue::Float(v)) => self.dice_loss = v,
      ("dist_loss", FieldValue::Float(v)) => self.dist_loss = v,
      ("filters_base", FieldValue::Int(v)) => self.filters_base = unsigned(name, v)?,
      ("n_epochs", FieldValue::Int(v)) => self.n_epochs = unsigned(name, v)?,
      ("oversample", FieldValue::Float(v)) => self.oversample = v,
      ("lr", FieldValue::Float(v)) => self.lr = v,
      ("lr_decay", FieldValue::Float(v)) => self.lr_decay = v,
      ("batch_size", FieldValue::Int(v)) => self.batch_size = unsigned(name, v)?,
      _ => {
        return Err(Error::InvalidValue {
          name: name.to_owned(),
          value: raw.to_owned(),
        })
      }
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    let invalid = |msg: String| Err(Error::InvalidHyperParams(msg));

    if self.classes.is_empty() {
      return invalid("at least one class must be selected".to_owned());
    }
    if let Some(c) = self.classes.iter().find(|&&c| c >= TOTAL_CLASSES) {
      return invalid(format!("class {c} is outside 0..{TOTAL_CLASSES}"));
    }
    let mut sorted = self.classes.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != self.classes.len() {
      return invalid("classes must not repeat".to_owned());
    }

    if self.n_channels == 0 || self.n_channels > MAX_CHANNELS {
      return invalid(format!(
        "n_channels must be in 1..={MAX_CHANNELS}, got {}",
        self.n_channels
      ));
    }
    if self.patch_border >= self.patch_inner {
      return invalid(format!(
        "patch_border ({}) must be smaller than patch_inner ({})",
        self.patch_border, self.patch_inner
      ));
    }
    if !(0. ..1.).contains(&self.dropout) {
      return invalid(format!("dropout must be in [0, 1), got {}", self.dropout));
    }
    if self.filters_base == 0 {
      return invalid("filters_base must be positive".to_owned());
    }

    Ok(())
  }
}
