//! RoI box feature extractors and their registry builders.
//!
//! Extractors consume region crops that the external pooling kernel
//! (RoIAlign, supplied by the native compute extension) has already reduced
//! to a fixed `[num_rois, channels, resolution, resolution]` shape, and
//! produce one flat feature vector per region for the box predictor.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::config::ConfigDocument;
use crate::error::GlipResult;

/// Capability interface for RoI box feature extractors.
pub trait RoiFeatureExtractor<B: Backend> {
    /// Maps pooled regions `[num_rois, channels, resolution, resolution]`
    /// to `[num_rois, out_features]`.
    fn forward(&self, regions: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Width of the produced feature vectors.
    fn out_features(&self) -> usize;
}

/// Two-layer MLP head over flattened region crops.
#[derive(Config, Debug)]
pub struct Fpn2MlpFeatureExtractorConfig {
    in_channels: usize,
    #[config(default = "7")]
    resolution: usize,
    #[config(default = "1024")]
    representation_size: usize,
}

impl Fpn2MlpFeatureExtractorConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Fpn2MlpFeatureExtractor<B> {
        let flat = self.in_channels * self.resolution * self.resolution;
        Fpn2MlpFeatureExtractor {
            representation_size: self.representation_size,
            fc6: LinearConfig::new(flat, self.representation_size).init(device),
            fc7: LinearConfig::new(self.representation_size, self.representation_size)
                .init(device),
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Fpn2MlpFeatureExtractor<B: Backend> {
    representation_size: usize,
    fc6: Linear<B>,
    fc7: Linear<B>,
    relu: Relu,
}

impl<B: Backend> RoiFeatureExtractor<B> for Fpn2MlpFeatureExtractor<B> {
    fn forward(&self, regions: Tensor<B, 4>) -> Tensor<B, 2> {
        let [n, c, h, w] = regions.dims();
        let x = regions.reshape([n, c * h * w]);
        let x = self.relu.forward(self.fc6.forward(x));
        self.relu.forward(self.fc7.forward(x))
    }

    fn out_features(&self) -> usize {
        self.representation_size
    }
}

/// Conv-tower head: four 3x3 convs followed by one linear layer.
#[derive(Config, Debug)]
pub struct FpnXconv1FcFeatureExtractorConfig {
    in_channels: usize,
    #[config(default = "7")]
    resolution: usize,
    #[config(default = "4")]
    num_convs: usize,
    #[config(default = "1024")]
    representation_size: usize,
}

impl FpnXconv1FcFeatureExtractorConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> FpnXconv1FcFeatureExtractor<B> {
        let convs = (0..self.num_convs)
            .map(|_| {
                Conv2dConfig::new([self.in_channels, self.in_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device)
            })
            .collect();
        let flat = self.in_channels * self.resolution * self.resolution;

        FpnXconv1FcFeatureExtractor {
            representation_size: self.representation_size,
            convs,
            fc: LinearConfig::new(flat, self.representation_size).init(device),
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FpnXconv1FcFeatureExtractor<B: Backend> {
    representation_size: usize,
    convs: Vec<Conv2d<B>>,
    fc: Linear<B>,
    relu: Relu,
}

impl<B: Backend> RoiFeatureExtractor<B> for FpnXconv1FcFeatureExtractor<B> {
    fn forward(&self, regions: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = regions;
        for conv in &self.convs {
            x = self.relu.forward(conv.forward(x));
        }
        let [n, c, h, w] = x.dims();
        let x = x.reshape([n, c * h * w]);
        self.relu.forward(self.fc.forward(x))
    }

    fn out_features(&self) -> usize {
        self.representation_size
    }
}

fn extractor_options(cfg: &ConfigDocument) -> (usize, usize) {
    let resolution = cfg
        .usize_at("MODEL.ROI_BOX_HEAD.POOLER_RESOLUTION")
        .unwrap_or(7);
    let representation_size = cfg
        .usize_at("MODEL.ROI_BOX_HEAD.MLP_HEAD_DIM")
        .unwrap_or(1024);
    (resolution, representation_size)
}

/// Builder for the `FPN2MLPFeatureExtractor` key.
///
/// `in_channels` is the channel width of the pooled region crops, reported
/// by the assembled backbone.
pub fn build_fpn_2mlp_feature_extractor<B: Backend>(
    cfg: &ConfigDocument,
    in_channels: usize,
    device: &Device<B>,
) -> GlipResult<Box<dyn RoiFeatureExtractor<B>>> {
    let (resolution, representation_size) = extractor_options(cfg);
    Ok(Box::new(
        Fpn2MlpFeatureExtractorConfig::new(in_channels)
            .with_resolution(resolution)
            .with_representation_size(representation_size)
            .init(device),
    ))
}

/// Builder for the `FPNXconv1fcFeatureExtractor` key.
pub fn build_fpn_xconv1fc_feature_extractor<B: Backend>(
    cfg: &ConfigDocument,
    in_channels: usize,
    device: &Device<B>,
) -> GlipResult<Box<dyn RoiFeatureExtractor<B>>> {
    let (resolution, representation_size) = extractor_options(cfg);
    Ok(Box::new(
        FpnXconv1FcFeatureExtractorConfig::new(in_channels)
            .with_resolution(resolution)
            .with_representation_size(representation_size)
            .init(device),
    ))
}
