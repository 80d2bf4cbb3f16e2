use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(version, author)]
#[command(about = "Segmentation networks for multispectral satellite patches", long_about = None)]
pub struct Cli {
  #[arg(short, long, global = true, help = "Log debug output")]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// Create a model directory with hyperparams and freshly initialized weights
  Init {
    #[command(flatten)]
    model: ModelArgs,
  },

  /// Build a network and run one forward pass on a random patch
  Inspect {
    #[command(flatten)]
    model: ModelArgs,

    #[arg(short, long, help = "Batch size of the probe input")]
    #[arg(value_name = "BATCH", default_value = "1")]
    batch: usize,
  },

  /// Keep two label classes of a polygon table, renumbered to 1 and 2
  RemapLabels {
    #[arg(short, long, help = "Input label table (CSV)")]
    #[arg(value_name = "INPUT")]
    input_path: PathBuf,

    #[arg(short, long, help = "Output label table (CSV)")]
    #[arg(value_name = "OUTPUT")]
    output_path: PathBuf,
  },
}

#[derive(Args)]
pub struct ModelArgs {
  #[arg(short, long, help = "Model directory holding hps.json and model.safetensors")]
  #[arg(value_name = "DIR")]
  pub model_dir: Option<PathBuf>,

  #[arg(long, help = "Hyperparam overrides, e.g. `net=UNet2,filters_base=16`")]
  #[arg(value_name = "HPS", default_value = "")]
  pub hps: String,

  #[arg(short = 'C', long, help = "Use CPU even when a GPU is available")]
  pub use_cpu: bool,
}
