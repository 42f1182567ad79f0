//! Region-proposal heads and their registry builders.
//!
//! An RPN head turns the backbone's pyramid into per-level objectness logits
//! and box-delta maps. The vision-language head additionally scores every
//! spatial position against every text token, which is what lets a grounding
//! model propose regions for a free-form phrase.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use super::language::LanguageFeatures;
use crate::config::ConfigDocument;
use crate::error::GlipResult;

/// Per-level outputs of a proposal head.
#[derive(Debug, Clone)]
pub struct RpnOutput<B: Backend> {
    /// Objectness logits, `[batch, anchors, height, width]` per level.
    pub objectness: Vec<Tensor<B, 4>>,
    /// Box regression deltas, `[batch, 4 * anchors, height, width]` per level.
    pub box_deltas: Vec<Tensor<B, 4>>,
    /// Token grounding logits, `[batch, length, height, width]` per level.
    /// Only produced by vision-language heads given language features.
    pub grounding: Option<Vec<Tensor<B, 4>>>,
}

/// Capability interface for proposal heads.
pub trait RpnHead<B: Backend> {
    fn forward(
        &self,
        features: &[Tensor<B, 4>],
        language: Option<&LanguageFeatures<B>>,
    ) -> RpnOutput<B>;
}

/// Anchors per location from the profile's anchor options.
fn anchors_per_location(cfg: &ConfigDocument) -> usize {
    let aspect_ratios = cfg
        .f64_seq_at("MODEL.RPN.ASPECT_RATIOS")
        .map_or(1, |ratios| ratios.len());
    let scales = cfg.usize_at("MODEL.RPN.SCALES_PER_OCTAVE").unwrap_or(1);
    aspect_ratios * scales
}

/// Classic single-conv RPN head: shared 3x3 conv, then 1x1 objectness and
/// box-delta predictors.
#[derive(Config, Debug)]
pub struct SingleConvRpnHeadConfig {
    in_channels: usize,
    num_anchors: usize,
}

impl SingleConvRpnHeadConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SingleConvRpnHead<B> {
        SingleConvRpnHead {
            conv: Conv2dConfig::new([self.in_channels, self.in_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            objectness: Conv2dConfig::new([self.in_channels, self.num_anchors], [1, 1])
                .init(device),
            box_deltas: Conv2dConfig::new([self.in_channels, 4 * self.num_anchors], [1, 1])
                .init(device),
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct SingleConvRpnHead<B: Backend> {
    conv: Conv2d<B>,
    objectness: Conv2d<B>,
    box_deltas: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> RpnHead<B> for SingleConvRpnHead<B> {
    fn forward(
        &self,
        features: &[Tensor<B, 4>],
        _language: Option<&LanguageFeatures<B>>,
    ) -> RpnOutput<B> {
        let mut objectness = Vec::with_capacity(features.len());
        let mut box_deltas = Vec::with_capacity(features.len());
        for feature in features {
            let x = self.relu.forward(self.conv.forward(feature.clone()));
            objectness.push(self.objectness.forward(x.clone()));
            box_deltas.push(self.box_deltas.forward(x));
        }

        RpnOutput {
            objectness,
            box_deltas,
            grounding: None,
        }
    }
}

/// Vision-language proposal head.
///
/// On top of the single-conv tower, every spatial position is projected into
/// a joint embedding space shared with the text tokens; the grounding logits
/// are scaled dot products between the two.
#[derive(Config, Debug)]
pub struct VlRpnHeadConfig {
    in_channels: usize,
    num_anchors: usize,
    #[config(default = "768")]
    lang_dim: usize,
    #[config(default = "256")]
    joint_dim: usize,
}

impl VlRpnHeadConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> VlRpnHead<B> {
        VlRpnHead {
            joint_dim: self.joint_dim,
            base: SingleConvRpnHeadConfig::new(self.in_channels, self.num_anchors).init(device),
            visual_proj: Conv2dConfig::new([self.in_channels, self.joint_dim], [1, 1])
                .init(device),
            lang_proj: LinearConfig::new(self.lang_dim, self.joint_dim).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct VlRpnHead<B: Backend> {
    joint_dim: usize,
    base: SingleConvRpnHead<B>,
    visual_proj: Conv2d<B>,
    lang_proj: Linear<B>,
}

impl<B: Backend> VlRpnHead<B> {
    /// `[batch, length, height, width]` logits for one pyramid level.
    fn grounding_logits(
        &self,
        feature: Tensor<B, 4>,
        tokens: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        let visual = self.visual_proj.forward(feature);
        let [b, c, h, w] = visual.dims();
        let visual = visual.reshape([b, c, h * w]);
        let scale = (self.joint_dim as f64).powf(-0.5);

        // [b, l, c] x [b, c, h*w] -> [b, l, h*w]
        let logits = tokens.matmul(visual) * scale;
        let l = logits.dims()[1];

        logits.reshape([b, l, h, w])
    }
}

impl<B: Backend> RpnHead<B> for VlRpnHead<B> {
    fn forward(
        &self,
        features: &[Tensor<B, 4>],
        language: Option<&LanguageFeatures<B>>,
    ) -> RpnOutput<B> {
        let mut output = self.base.forward(features, language);

        if let Some(language) = language {
            let tokens = self.lang_proj.forward(language.hidden.clone());
            let grounding = features
                .iter()
                .map(|feature| self.grounding_logits(feature.clone(), tokens.clone()))
                .collect();
            output.grounding = Some(grounding);
        }

        output
    }
}

/// Builder for the `SingleConvRPNHead` key.
///
/// `in_channels` is the channel width of the pyramid maps the head will
/// consume, reported by the assembled backbone.
pub fn build_single_conv_rpn_head<B: Backend>(
    cfg: &ConfigDocument,
    in_channels: usize,
    device: &Device<B>,
) -> GlipResult<Box<dyn RpnHead<B>>> {
    let num_anchors = anchors_per_location(cfg);
    Ok(Box::new(
        SingleConvRpnHeadConfig::new(in_channels, num_anchors).init(device),
    ))
}

/// Builder for the `VLRPNHead` key.
pub fn build_vl_rpn_head<B: Backend>(
    cfg: &ConfigDocument,
    in_channels: usize,
    device: &Device<B>,
) -> GlipResult<Box<dyn RpnHead<B>>> {
    let num_anchors = anchors_per_location(cfg);
    let mut config = VlRpnHeadConfig::new(in_channels, num_anchors);
    if let Some(lang_dim) = cfg.usize_at("MODEL.LANGUAGE_BACKBONE.LANG_DIM") {
        config = config.with_lang_dim(lang_dim);
    }
    if let Some(joint_dim) = cfg.usize_at("MODEL.RPN.JOINT_EMBEDDING_DIM") {
        config = config.with_joint_dim(joint_dim);
    }
    Ok(Box::new(config.init(device)))
}
