use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Unknown hyperparams: {}", .0.join(", "))]
  UnknownHyperParams(Vec<String>),

  #[error("Malformed hyperparam override `{0}`, expected `name=value`")]
  MalformedOverride(String),

  #[error("Invalid value `{value}` for hyperparam `{name}`")]
  InvalidValue { name: String, value: String },

  /// Boolean fields have no unambiguous string form, a schema entry of this
  /// kind is a bug in the schema itself.
  #[error("Hyperparam `{0}` is boolean and cannot be overridden from a string")]
  BooleanOverride(String),

  #[error("Invalid hyperparams: {0}")]
  InvalidHyperParams(String),

  #[error("Checkpoint error: {0}")]
  Checkpoint(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Csv(#[from] csv::Error),

  #[error(transparent)]
  Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
