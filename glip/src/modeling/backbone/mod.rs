//! Visual backbones and their registry builders.
//!
//! A visual backbone maps batched images to a list of feature maps, finest
//! first. The concrete trunks (Swin, ResNet) are composed with a feature
//! pyramid by the builder functions registered under the keys the profiles
//! select (`SWINT-FPN-RETINANET`, `SWINL-FPN-RETINANET`,
//! `R-50-FPN-RETINANET`, `R-101-FPN-RETINANET`).

mod fpn;
mod resnet;
mod swin;

pub use fpn::{Fpn, FpnConfig};
pub use resnet::ResNet;
pub use swin::{SwinTransformer, SwinTransformerConfig};

use burn::prelude::*;

use crate::config::ConfigDocument;
use crate::error::GlipResult;

/// Capability interface for visual backbones.
pub trait VisualBackbone<B: Backend> {
    /// Maps `[batch, 3, height, width]` images to feature maps, finest first.
    fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// Channel count of each returned feature map.
    fn out_channels(&self) -> Vec<usize>;
}

/// A trunk with a feature pyramid on top.
pub struct PyramidBackbone<B: Backend, T> {
    trunk: T,
    fpn: Fpn<B>,
}

impl<B: Backend, T: VisualBackbone<B>> PyramidBackbone<B, T> {
    pub fn new(trunk: T, fpn: Fpn<B>) -> Self {
        Self { trunk, fpn }
    }
}

impl<B: Backend, T: VisualBackbone<B>> VisualBackbone<B> for PyramidBackbone<B, T> {
    fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let features = self.trunk.forward(images);
        self.fpn.forward(&features)
    }

    fn out_channels(&self) -> Vec<usize> {
        vec![self.fpn.out_channels(); self.fpn.num_levels()]
    }
}

fn fpn_for<B: Backend>(
    trunk: &dyn VisualBackbone<B>,
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> Fpn<B> {
    let out_channels = cfg.usize_at("MODEL.BACKBONE.OUT_CHANNELS").unwrap_or(256);
    let trunk_channels = trunk.out_channels();
    // RetinaNet pyramids start at 1/8 resolution: skip the finest trunk map.
    let in_channels = trunk_channels[1..].to_vec();

    FpnConfig::new(in_channels)
        .with_out_channels(out_channels)
        .with_extra_levels(2)
        .init(device)
}

/// Builder for the `SWINT-FPN-RETINANET` key.
pub fn build_swint_fpn_retinanet<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn VisualBackbone<B>>> {
    let trunk = SwinTransformerConfig::swin_t().init(device);
    let fpn = fpn_for(&trunk, cfg, device);
    Ok(Box::new(PyramidBackbone::new(trunk, fpn)))
}

/// Builder for the `SWINL-FPN-RETINANET` key.
pub fn build_swinl_fpn_retinanet<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn VisualBackbone<B>>> {
    let trunk = SwinTransformerConfig::swin_l().init(device);
    let fpn = fpn_for(&trunk, cfg, device);
    Ok(Box::new(PyramidBackbone::new(trunk, fpn)))
}

/// Builder for the `R-50-FPN-RETINANET` key.
pub fn build_r50_fpn_retinanet<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn VisualBackbone<B>>> {
    let trunk = ResNet::resnet50(device);
    let fpn = fpn_for(&trunk, cfg, device);
    Ok(Box::new(PyramidBackbone::new(trunk, fpn)))
}

/// Builder for the `R-101-FPN-RETINANET` key.
pub fn build_r101_fpn_retinanet<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn VisualBackbone<B>>> {
    let trunk = ResNet::resnet101(device);
    let fpn = fpn_for(&trunk, cfg, device);
    Ok(Box::new(PyramidBackbone::new(trunk, fpn)))
}
