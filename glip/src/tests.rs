//! Crate-level integration tests: registry extension, shipped profiles and
//! full assembly round trips on a small CPU backend.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::backend::NdArray;
use burn::prelude::*;

use crate::config::{ConfigDocument, ProfileCatalog};
use crate::error::{GlipError, GlipResult};
use crate::modeling::{assemble, ModelRegistries, VisualBackbone};

type TestBackend = NdArray<f32>;

fn doc(text: &str) -> ConfigDocument {
    ConfigDocument::from_str(text, Path::new("<test>")).unwrap()
}

static TOY_BACKBONE_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct ToyBackbone {
    channels: usize,
}

impl<B: Backend> VisualBackbone<B> for ToyBackbone {
    fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let [batch, _, _, _] = images.dims();
        vec![Tensor::zeros(
            [batch, self.channels, 4, 4],
            &images.device(),
        )]
    }

    fn out_channels(&self) -> Vec<usize> {
        vec![self.channels]
    }
}

fn build_toy_backbone<B: Backend>(
    _cfg: &ConfigDocument,
    _device: &Device<B>,
) -> GlipResult<Box<dyn VisualBackbone<B>>> {
    TOY_BACKBONE_BUILDS.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(ToyBackbone { channels: 8 }))
}

#[test]
fn custom_backbone_registers_and_resolves() {
    let mut registries = ModelRegistries::<TestBackend>::with_builtins().unwrap();
    registries
        .backbones
        .register("toy-backbone", build_toy_backbone)
        .unwrap();

    let cfg = doc(
        "MODEL:\n  BACKBONE:\n    CONV_BODY: toy-backbone\n  RPN:\n    RPN_HEAD: SingleConvRPNHead\n    ASPECT_RATIOS: [1.0]\n",
    );
    let device = Default::default();

    let before = TOY_BACKBONE_BUILDS.load(Ordering::SeqCst);
    let model = assemble(&cfg, &registries, &device).unwrap();
    assert_eq!(TOY_BACKBONE_BUILDS.load(Ordering::SeqCst), before + 1);
    assert_eq!(model.feature_channels(), vec![8]);

    // The proposal head is sized from the toy backbone's 8-channel maps,
    // not from any document default.
    let images = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
    let out = model.forward(images, None);
    assert_eq!(out.features.len(), 1);
    assert_eq!(out.proposals.objectness[0].dims(), [2, 1, 4, 4]);
    assert_eq!(out.proposals.box_deltas[0].dims(), [2, 4, 4, 4]);
    assert!(out.proposals.grounding.is_none());
}

#[test]
fn misspelled_backbone_lists_known_keys() {
    let mut registries = ModelRegistries::<TestBackend>::with_builtins().unwrap();
    registries
        .backbones
        .register("toy-backbone", build_toy_backbone)
        .unwrap();

    let cfg = doc(
        "MODEL:\n  BACKBONE:\n    CONV_BODY: missing-backbone\n  RPN:\n    RPN_HEAD: SingleConvRPNHead\n",
    );
    let device = Default::default();

    let err = assemble(&cfg, &registries, &device)
        .err()
        .expect("assembly should fail");
    match err {
        GlipError::UnknownKey { key, known, .. } => {
            assert_eq!(key, "missing-backbone");
            assert!(known.contains("toy-backbone"));
            assert!(known.contains("R-50-FPN-RETINANET"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn coco_profile_assembles_without_language_backbone() {
    let catalog = ProfileCatalog::new();
    let cfg = catalog.load("coco").unwrap();

    let registries = ModelRegistries::<TestBackend>::with_builtins().unwrap();
    let device = Default::default();
    let model = assemble(&cfg, &registries, &device).unwrap();

    assert!(!model.has_language_backbone());
    assert_eq!(model.feature_channels(), vec![256; 5]);

    // 9 anchors per location: 3 aspect ratios times 3 scales per octave.
    let images = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
    let out = model.forward(images, None);
    assert_eq!(out.features.len(), 5);
    assert_eq!(out.proposals.objectness[0].dims()[1], 9);
    assert_eq!(out.proposals.box_deltas[0].dims()[1], 36);
    assert!(out.language.is_none());

    let regions = Tensor::<TestBackend, 4>::zeros([4, 256, 7, 7], &device);
    let pooled = model.extract_region_features(regions).unwrap();
    assert_eq!(pooled.dims(), [4, 1024]);
}

#[test]
fn grounding_model_scores_tokens_at_every_level() {
    let cfg = doc(concat!(
        "MODEL:\n",
        "  BACKBONE:\n",
        "    CONV_BODY: R-50-FPN-RETINANET\n",
        "    OUT_CHANNELS: 64\n",
        "  LANGUAGE_BACKBONE:\n",
        "    MODEL_TYPE: bert-base-uncased\n",
        "    LANG_DIM: 32\n",
        "    N_LAYERS: 1\n",
        "    N_HEADS: 2\n",
        "    MAX_QUERY_LEN: 16\n",
        "  RPN:\n",
        "    RPN_HEAD: VLRPNHead\n",
        "    ASPECT_RATIOS: [1.0]\n",
        "    SCALES_PER_OCTAVE: 1\n",
        "    JOINT_EMBEDDING_DIM: 16\n",
    ));

    let registries = ModelRegistries::<TestBackend>::with_builtins().unwrap();
    let device = Default::default();
    let model = assemble(&cfg, &registries, &device).unwrap();
    assert!(model.has_language_backbone());

    let images = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
    let tokens = Tensor::<TestBackend, 2, Int>::zeros([2, 6], &device);
    let mask = Tensor::<TestBackend, 2, Bool>::from_bool(
        [
            [true, true, true, true, true, true],
            [true, true, true, true, false, false],
        ]
        .into(),
        &device,
    );

    let out = model.forward(images, Some((tokens, mask)));

    let language = out.language.as_ref().unwrap();
    assert_eq!(language.hidden.dims(), [2, 6, 32]);
    assert_eq!(language.pooled.dims(), [2, 32]);

    let grounding = out.proposals.grounding.as_ref().unwrap();
    assert_eq!(grounding.len(), out.features.len());
    for (logits, features) in grounding.iter().zip(&out.features) {
        let [_, _, h, w] = features.dims();
        assert_eq!(logits.dims(), [2, 6, h, w]);
    }
}

#[test]
fn shipped_profiles_all_select_registered_components() {
    let catalog = ProfileCatalog::new();
    let registries = ModelRegistries::<TestBackend>::with_builtins().unwrap();

    for name in catalog.names() {
        let cfg = catalog.load(name).unwrap();

        let backbone = cfg.require_str("MODEL.BACKBONE.CONV_BODY").unwrap();
        assert!(registries.backbones.contains(backbone), "{name}: {backbone}");

        let rpn = cfg.require_str("MODEL.RPN.RPN_HEAD").unwrap();
        assert!(registries.rpn_heads.contains(rpn), "{name}: {rpn}");

        if let Some(lang) = cfg.str_at("MODEL.LANGUAGE_BACKBONE.MODEL_TYPE") {
            assert!(registries.language_backbones.contains(lang), "{name}: {lang}");
        }
        if let Some(roi) = cfg.str_at("MODEL.ROI_BOX_HEAD.FEATURE_EXTRACTOR") {
            assert!(
                registries.roi_box_feature_extractors.contains(roi),
                "{name}: {roi}"
            );
        }
    }
}
