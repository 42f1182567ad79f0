//! Model components and the registries that assemble them.

pub mod backbone;
pub mod language;
pub mod model;
pub mod registries;
pub mod roi_heads;
pub mod rpn;

pub use backbone::VisualBackbone;
pub use language::{LanguageBackbone, LanguageFeatures};
pub use model::{assemble, DetectionOutput, GeneralizedVlrcnn};
pub use registries::{
    BackboneBuilder, LanguageBackboneBuilder, ModelRegistries, RoiFeatureExtractorBuilder,
    RpnHeadBuilder,
};
pub use roi_heads::RoiFeatureExtractor;
pub use rpn::{RpnHead, RpnOutput};
