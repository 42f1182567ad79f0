//! The four role-group registries.
//!
//! Each architectural role owns an independent registry, so a visual-backbone
//! name can never collide with a language-backbone name and each family keeps
//! its own construction contract. Instead of components registering
//! themselves as an import side effect, [`ModelRegistries::with_builtins`] is
//! the single bootstrap that announces every built-in component before
//! assembly runs; callers extend the returned set with their own entries.

use burn::prelude::*;

use super::backbone::{self, VisualBackbone};
use super::language::{self, LanguageBackbone};
use super::roi_heads::{self, RoiFeatureExtractor};
use super::rpn::{self, RpnHead};
use crate::config::ConfigDocument;
use crate::error::GlipResult;
use crate::registry::Registry;

/// Factory for visual backbones.
pub type BackboneBuilder<B> =
    fn(&ConfigDocument, &Device<B>) -> GlipResult<Box<dyn VisualBackbone<B>>>;

/// Factory for language backbones.
pub type LanguageBackboneBuilder<B> =
    fn(&ConfigDocument, &Device<B>) -> GlipResult<Box<dyn LanguageBackbone<B>>>;

/// Factory for RoI box feature extractors. The `usize` is the channel width
/// of the pooled region crops, taken from the assembled backbone.
pub type RoiFeatureExtractorBuilder<B> =
    fn(&ConfigDocument, usize, &Device<B>) -> GlipResult<Box<dyn RoiFeatureExtractor<B>>>;

/// Factory for region-proposal heads. The `usize` is the channel width of
/// the pyramid maps, taken from the assembled backbone.
pub type RpnHeadBuilder<B> =
    fn(&ConfigDocument, usize, &Device<B>) -> GlipResult<Box<dyn RpnHead<B>>>;

/// The four role-group registries the assembler resolves against.
pub struct ModelRegistries<B: Backend> {
    pub backbones: Registry<BackboneBuilder<B>>,
    pub language_backbones: Registry<LanguageBackboneBuilder<B>>,
    pub roi_box_feature_extractors: Registry<RoiFeatureExtractorBuilder<B>>,
    pub rpn_heads: Registry<RpnHeadBuilder<B>>,
}

impl<B: Backend> ModelRegistries<B> {
    /// Four empty registries, for tests and fully custom component sets.
    pub fn empty() -> Self {
        Self {
            backbones: Registry::new("visual backbone"),
            language_backbones: Registry::new("language backbone"),
            roi_box_feature_extractors: Registry::new("RoI box feature extractor"),
            rpn_heads: Registry::new("RPN head"),
        }
    }

    /// Bootstraps the registries with every built-in component.
    pub fn with_builtins() -> GlipResult<Self> {
        let mut registries = Self::empty();

        registries
            .backbones
            .register("SWINT-FPN-RETINANET", backbone::build_swint_fpn_retinanet)?;
        registries
            .backbones
            .register("SWINL-FPN-RETINANET", backbone::build_swinl_fpn_retinanet)?;
        registries
            .backbones
            .register("R-50-FPN-RETINANET", backbone::build_r50_fpn_retinanet)?;
        registries
            .backbones
            .register("R-101-FPN-RETINANET", backbone::build_r101_fpn_retinanet)?;

        registries
            .language_backbones
            .register("bert-base-uncased", language::build_bert_base_uncased)?;
        registries
            .language_backbones
            .register("roberta-base", language::build_roberta_base)?;

        registries.roi_box_feature_extractors.register(
            "FPN2MLPFeatureExtractor",
            roi_heads::build_fpn_2mlp_feature_extractor,
        )?;
        registries.roi_box_feature_extractors.register(
            "FPNXconv1fcFeatureExtractor",
            roi_heads::build_fpn_xconv1fc_feature_extractor,
        )?;

        registries
            .rpn_heads
            .register("SingleConvRPNHead", rpn::build_single_conv_rpn_head)?;
        registries
            .rpn_heads
            .register("VLRPNHead", rpn::build_vl_rpn_head)?;

        tracing::debug!(
            backbones = registries.backbones.len(),
            language_backbones = registries.language_backbones.len(),
            roi_box_feature_extractors = registries.roi_box_feature_extractors.len(),
            rpn_heads = registries.rpn_heads.len(),
            "registered built-in components"
        );
        Ok(registries)
    }
}
