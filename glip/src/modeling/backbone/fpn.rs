//! Feature pyramid on top of a trunk.
//!
//! Standard FPN: 1x1 lateral projections, nearest-neighbour top-down merge,
//! 3x3 output convs, plus RetinaNet-style P6/P7 extra levels produced by
//! strided convs from the coarsest output.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Configuration for [`Fpn`].
///
/// `in_channels` lists the trunk levels the pyramid consumes, finest first;
/// the pyramid reads that many maps from the tail of the trunk output.
#[derive(Config, Debug)]
pub struct FpnConfig {
    in_channels: Vec<usize>,
    #[config(default = "256")]
    out_channels: usize,
    #[config(default = "2")]
    extra_levels: usize,
}

impl FpnConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Fpn<B> {
        let laterals = self
            .in_channels
            .iter()
            .map(|&c| {
                Conv2dConfig::new([c, self.out_channels], [1, 1]).init(device)
            })
            .collect();
        let outputs = self
            .in_channels
            .iter()
            .map(|_| {
                Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device)
            })
            .collect();
        let extras = (0..self.extra_levels)
            .map(|_| {
                Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device)
            })
            .collect();

        Fpn {
            out_channels: self.out_channels,
            laterals,
            outputs,
            extras,
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Fpn<B: Backend> {
    out_channels: usize,
    laterals: Vec<Conv2d<B>>,
    outputs: Vec<Conv2d<B>>,
    extras: Vec<Conv2d<B>>,
    relu: Relu,
}

impl<B: Backend> Fpn<B> {
    /// Number of pyramid levels produced.
    pub fn num_levels(&self) -> usize {
        self.laterals.len() + self.extras.len()
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Builds the pyramid from trunk features (finest first). Consumes the
    /// last `laterals.len()` maps; earlier maps are ignored.
    pub fn forward(&self, features: &[Tensor<B, 4>]) -> Vec<Tensor<B, 4>> {
        let used = &features[features.len() - self.laterals.len()..];

        let mut merged: Vec<Tensor<B, 4>> = Vec::with_capacity(used.len());
        let mut carry: Option<Tensor<B, 4>> = None;
        for (feature, lateral) in used.iter().zip(&self.laterals).rev() {
            let mut x = lateral.forward(feature.clone());
            if let Some(coarser) = carry {
                let [_, _, h, w] = x.dims();
                x = x + interpolate(
                    coarser,
                    [h, w],
                    InterpolateOptions::new(InterpolateMode::Nearest),
                );
            }
            carry = Some(x.clone());
            merged.push(x);
        }
        merged.reverse();

        let mut outs: Vec<Tensor<B, 4>> = merged
            .into_iter()
            .zip(&self.outputs)
            .map(|(x, conv)| conv.forward(x))
            .collect();

        // Extra levels hang off the coarsest pyramid output.
        if let Some(mut prev) = outs.last().cloned() {
            for (i, extra) in self.extras.iter().enumerate() {
                let next = if i == 0 {
                    extra.forward(prev)
                } else {
                    extra.forward(self.relu.forward(prev))
                };
                outs.push(next.clone());
                prev = next;
            }
        }

        outs
    }
}
