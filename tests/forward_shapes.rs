use candle_core::{DType, Device, ModuleT, Tensor};
use candle_nn::{VarBuilder, VarMap};
use dstl_segnet::{Architecture, HyperParams, SegmentationNet};

// Small enough for a CPU run, deep enough for five pooling levels.
fn small_hps(net: Architecture) -> HyperParams {
  HyperParams {
    net,
    classes: vec![1, 4, 6],
    n_channels: 4,
    patch_inner: 16,
    patch_border: 8,
    filters_base: 8,
    ..HyperParams::default()
  }
}

fn build(hps: &HyperParams) -> (VarMap, SegmentationNet) {
  let varmap = VarMap::new();
  let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
  let net = SegmentationNet::new(hps, vb).unwrap();
  (varmap, net)
}

fn assert_probabilities(y: &Tensor) {
  let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
  assert!(values.iter().all(|v| (0. ..=1.).contains(v)));
}

#[test]
fn every_architecture_emits_inner_patch() {
  for arch in Architecture::ALL {
    let hps = small_hps(arch);
    let (_varmap, net) = build(&hps);
    assert_eq!(net.architecture(), arch);

    let size = hps.input_size();
    let x = Tensor::randn(0f32, 1., (1, hps.n_channels, size, size), &Device::Cpu).unwrap();
    let y = net.forward_t(&x, false).unwrap();

    assert_eq!(
      y.dims(),
      &[1, hps.n_classes(), hps.patch_inner, hps.patch_inner],
      "{arch}"
    );
    assert_probabilities(&y);
  }
}

#[test]
fn training_mode_with_dropout() {
  for arch in [Architecture::UNet, Architecture::SmallNet, Architecture::UNet2] {
    let hps = HyperParams {
      dropout: 0.3,
      ..small_hps(arch)
    };
    let (_varmap, net) = build(&hps);
    assert!(net.base().has_dropout());

    let size = hps.input_size();
    let x = Tensor::randn(0f32, 1., (2, hps.n_channels, size, size), &Device::Cpu).unwrap();
    let y = net.forward_t(&x, true).unwrap();

    assert_eq!(y.dims(), &[2, 3, 16, 16], "{arch}");
    assert_probabilities(&y);
  }
}

#[test]
fn plain_stacks_ignore_dropout() {
  for arch in [
    Architecture::MiniNet,
    Architecture::OldNet,
    Architecture::SmallNet,
    Architecture::SmallUNet,
  ] {
    let hps = HyperParams {
      dropout: 0.5,
      ..small_hps(arch)
    };
    let (_varmap, net) = build(&hps);

    let size = hps.input_size();
    let x = Tensor::randn(0f32, 1., (2, hps.n_channels, size, size), &Device::Cpu).unwrap();
    let train = net.forward_t(&x, true).unwrap();
    let eval = net.forward_t(&x, false).unwrap();

    let diff = (train - eval)
      .unwrap()
      .abs()
      .unwrap()
      .max_all()
      .unwrap()
      .to_scalar::<f32>()
      .unwrap();
    assert_eq!(diff, 0., "{arch}");
  }
}

#[test]
fn unet_without_batch_norm() {
  let hps = HyperParams {
    bn: 0,
    activation: dstl_segnet::Activation::Elu,
    ..small_hps(Architecture::UNet3l)
  };
  let (_varmap, net) = build(&hps);

  let x = Tensor::randn(0f32, 1., (1, 4, 32, 32), &Device::Cpu).unwrap();
  let y = net.forward_t(&x, false).unwrap();
  assert_eq!(y.dims(), &[1, 3, 16, 16]);
}

#[test]
fn larger_inputs_keep_the_border_contract() {
  let hps = small_hps(Architecture::UNet);
  let (_varmap, net) = build(&hps);

  let x = Tensor::randn(0f32, 1., (1, 4, 48, 64), &Device::Cpu).unwrap();
  let y = net.forward_t(&x, false).unwrap();
  assert_eq!(y.dims(), &[1, 3, 32, 48]);
}

#[test]
fn inception_needs_batch_norm() {
  let hps = HyperParams {
    bn: 0,
    ..small_hps(Architecture::InceptionUNet)
  };
  let varmap = VarMap::new();
  let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
  assert!(SegmentationNet::new(&hps, vb).is_err());
}

#[test]
fn invalid_hyperparams_are_rejected() {
  let hps = HyperParams {
    classes: vec![],
    ..small_hps(Architecture::MiniNet)
  };
  let varmap = VarMap::new();
  let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
  assert!(SegmentationNet::new(&hps, vb).is_err());
}
