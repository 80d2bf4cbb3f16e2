use candle_core::{DType, Device, ModuleT, Tensor};
use candle_nn::{VarBuilder, VarMap};
use dstl_segnet::{
  checkpoint::{self, MODEL_FILE},
  Architecture, Error, HyperParams, SegmentationNet,
};

fn hps() -> HyperParams {
  HyperParams {
    net: Architecture::SmallUNet,
    classes: vec![6, 7],
    n_channels: 3,
    patch_inner: 8,
    patch_border: 4,
    ..HyperParams::default()
  }
}

fn build(hps: &HyperParams) -> (VarMap, SegmentationNet) {
  let varmap = VarMap::new();
  let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
  let net = SegmentationNet::new(hps, vb).unwrap();
  (varmap, net)
}

#[test]
fn checkpoint_restores_weights_and_step() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(MODEL_FILE);
  let hps = hps();

  let (varmap, mut net) = build(&hps);
  for _ in 0..3 {
    net.increment_step();
  }
  checkpoint::save(&path, &varmap, &net).unwrap();

  let (mut restored_vars, mut restored) = build(&hps);
  assert_eq!(restored.global_step(), 0);
  checkpoint::load(&path, &mut restored_vars, &mut restored).unwrap();
  assert_eq!(restored.global_step(), 3);

  let x = Tensor::randn(0f32, 1., (1, 3, 16, 16), &Device::Cpu).unwrap();
  let expected = net.forward_t(&x, false).unwrap();
  let actual = restored.forward_t(&x, false).unwrap();
  let diff = (expected - actual)
    .unwrap()
    .abs()
    .unwrap()
    .flatten_all()
    .unwrap()
    .max(0)
    .unwrap()
    .to_scalar::<f32>()
    .unwrap();
  assert!(diff < 1e-6);
}

#[test]
fn checkpoint_without_step_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("weights_only.safetensors");

  let (mut varmap, mut net) = build(&hps());
  varmap.save(&path).unwrap();

  assert!(matches!(
    checkpoint::load(&path, &mut varmap, &mut net),
    Err(Error::Checkpoint(_))
  ));
}

#[test]
fn model_dir_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let hps = hps();
  hps.save_to_dir(dir.path()).unwrap();

  let loaded = HyperParams::from_dir(dir.path()).unwrap();
  assert_eq!(loaded, hps);
  assert_eq!(loaded.n_classes(), 2);
}
