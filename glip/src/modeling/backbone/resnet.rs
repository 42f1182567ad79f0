//! ResNet trunk for the visual backbones.
//!
//! Bottleneck ResNet in the torchvision layout: 7x7 stem, four residual
//! stages producing feature maps at 1/4 to 1/32 of the input resolution.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;

use super::VisualBackbone;

const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];

/// Bottleneck expansion factor.
const EXPANSION: usize = 4;

/// Stem: conv7x7/2 + batch norm + relu + maxpool3x3/2.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    fn new(in_channels: usize, out_channels: usize, device: &Device<B>) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.maxpool.forward(x)
    }
}

/// 1x1 conv + bn projection used when a block changes shape.
#[derive(Module, Debug)]
struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3, 1x1 expand.
#[derive(Module, Debug)]
struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    relu: Relu,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(in_channels: usize, width: usize, stride: usize, device: &Device<B>) -> Self {
        let out_channels = width * EXPANSION;
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));

        Self {
            conv1: Conv2dConfig::new([in_channels, width], [1, 1])
                .with_bias(false)
                .init(device),
            bn1: BatchNormConfig::new(width).init(device),
            conv2: Conv2dConfig::new([width, width], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: Conv2dConfig::new([width, out_channels], [1, 1])
                .with_bias(false)
                .init(device),
            bn3: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            downsample,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + identity)
    }
}

/// One residual stage: a run of bottleneck blocks, the first carrying the
/// stride and projection.
#[derive(Module, Debug)]
struct ResidualStage<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> ResidualStage<B> {
    fn new(
        depth: usize,
        in_channels: usize,
        width: usize,
        stride: usize,
        device: &Device<B>,
    ) -> Self {
        let mut blocks = Vec::with_capacity(depth);
        blocks.push(Bottleneck::new(in_channels, width, stride, device));
        for _ in 1..depth {
            blocks.push(Bottleneck::new(width * EXPANSION, width, 1, device));
        }
        Self { blocks }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }
        x
    }
}

/// Bottleneck ResNet producing the four stage outputs.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    stem: Stem<B>,
    layer1: ResidualStage<B>,
    layer2: ResidualStage<B>,
    layer3: ResidualStage<B>,
    layer4: ResidualStage<B>,
}

impl<B: Backend> ResNet<B> {
    /// ResNet-50.
    pub fn resnet50(device: &Device<B>) -> Self {
        Self::new(RESNET50_BLOCKS, device)
    }

    /// ResNet-101.
    pub fn resnet101(device: &Device<B>) -> Self {
        Self::new(RESNET101_BLOCKS, device)
    }

    fn new(blocks: [usize; 4], device: &Device<B>) -> Self {
        Self {
            stem: Stem::new(3, 64, device),
            layer1: ResidualStage::new(blocks[0], 64, 64, 1, device),
            layer2: ResidualStage::new(blocks[1], 64 * EXPANSION, 128, 2, device),
            layer3: ResidualStage::new(blocks[2], 128 * EXPANSION, 256, 2, device),
            layer4: ResidualStage::new(blocks[3], 256 * EXPANSION, 512, 2, device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let stem = self.stem.forward(input);
        let c2 = self.layer1.forward(stem);
        let c3 = self.layer2.forward(c2.clone());
        let c4 = self.layer3.forward(c3.clone());
        let c5 = self.layer4.forward(c4.clone());

        vec![c2, c3, c4, c5]
    }
}

impl<B: Backend> VisualBackbone<B> for ResNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        Self::forward(self, images)
    }

    fn out_channels(&self) -> Vec<usize> {
        vec![256, 512, 1024, 2048]
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn bottleneck_projects_on_shape_change() {
        let device = Default::default();
        let block = Bottleneck::<TestBackend>::new(64, 64, 1, &device);
        assert!(block.downsample.is_some()); // 64 -> 256

        let input =
            Tensor::<TestBackend, 4>::random([1, 64, 16, 16], Distribution::Default, &device);
        assert_eq!(block.forward(input).dims(), [1, 256, 16, 16]);
    }

    #[test]
    fn resnet50_emits_four_scales() {
        let device = Default::default();
        let trunk = ResNet::<TestBackend>::resnet50(&device);

        let input =
            Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        let outs = ResNet::forward(&trunk, input);

        assert_eq!(outs.len(), 4);
        assert_eq!(outs[0].dims(), [1, 256, 16, 16]);
        assert_eq!(outs[1].dims(), [1, 512, 8, 8]);
        assert_eq!(outs[2].dims(), [1, 1024, 4, 4]);
        assert_eq!(outs[3].dims(), [1, 2048, 2, 2]);
    }

    #[test]
    fn resnet101_carries_the_deeper_third_stage() {
        let device = Default::default();
        let trunk = ResNet::<TestBackend>::resnet101(&device);
        assert_eq!(trunk.layer3.blocks.len(), 23);

        let input =
            Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let outs = ResNet::forward(&trunk, input);
        assert_eq!(outs.len(), 4);
        assert_eq!(outs[3].dims(), [1, 2048, 1, 1]);
    }
}
