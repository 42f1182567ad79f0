//! Configuration-driven model assembly.
//!
//! [`assemble`] is the seam the registries exist for: it reads each role's
//! chosen implementation name out of a configuration document, resolves it
//! through the corresponding registry, and invokes the builder exactly once.
//! The assembly code never names a concrete component type.

use burn::prelude::*;

use super::backbone::VisualBackbone;
use super::language::{LanguageBackbone, LanguageFeatures};
use super::registries::ModelRegistries;
use super::roi_heads::RoiFeatureExtractor;
use super::rpn::{RpnHead, RpnOutput};
use crate::config::ConfigDocument;
use crate::error::{GlipError, GlipResult};

/// A model assembled from a configuration document.
///
/// The language backbone and RoI extractor are optional: plain detection
/// profiles carry no language section, and one-stage profiles carry no RoI
/// box head.
pub struct GeneralizedVlrcnn<B: Backend> {
    backbone: Box<dyn VisualBackbone<B>>,
    language_backbone: Option<Box<dyn LanguageBackbone<B>>>,
    rpn_head: Box<dyn RpnHead<B>>,
    roi_feature_extractor: Option<Box<dyn RoiFeatureExtractor<B>>>,
}

/// Outputs of one forward pass.
pub struct DetectionOutput<B: Backend> {
    /// Backbone pyramid, finest level first.
    pub features: Vec<Tensor<B, 4>>,
    /// Encoded text, when the model has a language backbone and was given
    /// tokens.
    pub language: Option<LanguageFeatures<B>>,
    /// Proposal head outputs per pyramid level.
    pub proposals: RpnOutput<B>,
}

impl<B: Backend> GeneralizedVlrcnn<B> {
    /// Runs backbone, optional language encoder and proposal head.
    ///
    /// `text` carries token ids and their attention mask for grounding
    /// profiles; plain detection passes `None`.
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        text: Option<(Tensor<B, 2, Int>, Tensor<B, 2, Bool>)>,
    ) -> DetectionOutput<B> {
        let features = self.backbone.forward(images);

        let language = match (&self.language_backbone, text) {
            (Some(encoder), Some((tokens, mask))) => Some(encoder.forward(tokens, mask)),
            _ => None,
        };

        let proposals = self.rpn_head.forward(&features, language.as_ref());

        DetectionOutput {
            features,
            language,
            proposals,
        }
    }

    /// Extracts per-region features from pooled crops using the configured
    /// RoI box extractor, if the profile selected one.
    pub fn extract_region_features(&self, regions: Tensor<B, 4>) -> Option<Tensor<B, 2>> {
        self.roi_feature_extractor
            .as_ref()
            .map(|extractor| extractor.forward(regions))
    }

    /// Whether the assembled model carries a language backbone.
    pub fn has_language_backbone(&self) -> bool {
        self.language_backbone.is_some()
    }

    /// Channel counts of the backbone pyramid.
    pub fn feature_channels(&self) -> Vec<usize> {
        self.backbone.out_channels()
    }
}

/// Builds a model from a configuration document.
///
/// Role keys are read from the document (`MODEL.BACKBONE.CONV_BODY`,
/// `MODEL.LANGUAGE_BACKBONE.MODEL_TYPE`, `MODEL.RPN.RPN_HEAD`,
/// `MODEL.ROI_BOX_HEAD.FEATURE_EXTRACTOR`) and resolved through the matching
/// registry; a typo fails with the valid alternatives listed. The proposal
/// head and RoI extractor are sized from the channel width the assembled
/// backbone reports, never from the document alone.
pub fn assemble<B: Backend>(
    cfg: &ConfigDocument,
    registries: &ModelRegistries<B>,
    device: &Device<B>,
) -> GlipResult<GeneralizedVlrcnn<B>> {
    let backbone_key = cfg.require_str("MODEL.BACKBONE.CONV_BODY")?;
    let build = registries.backbones.get(backbone_key)?;
    tracing::info!(backbone = %backbone_key, "building visual backbone");
    let backbone = build(cfg, device)?;

    // Heads share one tower across pyramid levels, so the backbone must
    // report a single channel width.
    let mut widths = backbone.out_channels();
    widths.dedup();
    let feature_width = match widths.as_slice() {
        [width] => *width,
        _ => {
            return Err(GlipError::ModelInitializationFailed {
                reason: format!(
                    "backbone '{backbone_key}' must produce a uniform channel width, got {:?}",
                    backbone.out_channels()
                ),
            })
        }
    };

    let language_backbone = match cfg.str_at("MODEL.LANGUAGE_BACKBONE.MODEL_TYPE") {
        Some(key) => {
            let build = registries.language_backbones.get(key)?;
            tracing::info!(language_backbone = %key, "building language backbone");
            Some(build(cfg, device)?)
        }
        None => None,
    };

    let rpn_key = cfg.require_str("MODEL.RPN.RPN_HEAD")?;
    let build = registries.rpn_heads.get(rpn_key)?;
    tracing::info!(rpn_head = %rpn_key, "building region proposal head");
    let rpn_head = build(cfg, feature_width, device)?;

    let roi_feature_extractor = match cfg.str_at("MODEL.ROI_BOX_HEAD.FEATURE_EXTRACTOR") {
        Some(key) => {
            let build = registries.roi_box_feature_extractors.get(key)?;
            tracing::info!(roi_feature_extractor = %key, "building RoI box feature extractor");
            Some(build(cfg, feature_width, device)?)
        }
        None => None,
    };

    Ok(GeneralizedVlrcnn {
        backbone,
        language_backbone,
        rpn_head,
        roi_feature_extractor,
    })
}
