//! Swin Transformer trunk for the visual backbones.
//!
//! Hierarchical shifted-window transformer producing feature maps at 1/4,
//! 1/8, 1/16 and 1/32 of the input resolution. Only the pieces the detection
//! pipeline needs are implemented: no absolute position embedding, no frozen
//! stages, fixed four-stage layout.
//!
//! Reference: "Swin Transformer: Hierarchical Vision Transformer using
//! Shifted Windows", https://arxiv.org/pdf/2103.14030

use burn::{
    module::{Param, ParamId},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, Gelu, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::softmax, Distribution},
};

use super::VisualBackbone;
use crate::ops::{roll2, DropPath, DropPathConfig};

/// Splits a `[batch, height, width, channels]` map into non-overlapping
/// `window_size` x `window_size` windows.
///
/// Height and width must be divisible by `window_size`; callers pad first.
fn window_partition<B: Backend>(x: Tensor<B, 4>, window_size: usize) -> Tensor<B, 4> {
    let [b, h, w, c] = x.dims();
    let x = x.reshape([
        b,
        h / window_size,
        window_size,
        w / window_size,
        window_size,
        c,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([
        b * (h / window_size) * (w / window_size),
        window_size,
        window_size,
        c,
    ])
}

/// Inverse of [`window_partition`].
fn window_reverse<B: Backend>(
    windows: Tensor<B, 4>,
    window_size: usize,
    h: usize,
    w: usize,
) -> Tensor<B, 4> {
    let [total_windows, _, _, c] = windows.dims();
    let b = total_windows / (h * w / window_size / window_size);
    let x = windows.reshape([
        b,
        h / window_size,
        w / window_size,
        window_size,
        window_size,
        c,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([b, h, w, c])
}

/// Transformer feed-forward network: Linear -> GELU -> Dropout -> Linear.
#[derive(Config, Debug)]
pub struct MlpConfig {
    in_features: usize,
    hidden_features: usize,
    #[config(default = "0.0")]
    drop: f64,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Mlp<B> {
        Mlp {
            fc1: LinearConfig::new(self.in_features, self.hidden_features).init(device),
            act: Gelu::new(),
            fc2: LinearConfig::new(self.hidden_features, self.in_features).init(device),
            drop: DropoutConfig::new(self.drop).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    fc1: Linear<B>,
    act: Gelu,
    fc2: Linear<B>,
    drop: Dropout,
}

impl<B: Backend> Mlp<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.fc1.forward(x);
        let x = self.act.forward(x);
        let x = self.drop.forward(x);
        let x = self.fc2.forward(x);

        self.drop.forward(x)
    }
}

/// Window-based multi-head self-attention with relative position bias.
#[derive(Config, Debug)]
pub struct WindowAttentionConfig {
    dim: usize,
    window_size: usize,
    num_heads: usize,
    #[config(default = "true")]
    qkv_bias: bool,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "0.0")]
    proj_drop: f64,
}

impl WindowAttentionConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> WindowAttention<B> {
        let head_dim = self.dim / self.num_heads;
        let table_len = (2 * self.window_size - 1) * (2 * self.window_size - 1);
        let relative_position_bias_table = Param::from_tensor(Tensor::random(
            [table_len, self.num_heads],
            Distribution::Normal(0.0, 0.02),
            device,
        ));

        // Flat [area * area] index into the bias table, one entry per pair
        // of positions inside a window. Fixed by the window geometry, so
        // computed once here.
        let ws = self.window_size;
        let area = ws * ws;
        let mut index = Vec::with_capacity(area * area);
        for i in 0..area {
            let (ih, iw) = (i / ws, i % ws);
            for j in 0..area {
                let (jh, jw) = (j / ws, j % ws);
                let dh = ih as i64 - jh as i64 + ws as i64 - 1;
                let dw = iw as i64 - jw as i64 + ws as i64 - 1;
                index.push((dh * (2 * ws as i64 - 1) + dw) as i32);
            }
        }
        let relative_position_index = Param::initialized(
            ParamId::new(),
            Tensor::from_ints(index.as_slice(), device),
        );

        WindowAttention {
            num_heads: self.num_heads,
            scale: (head_dim as f64).powf(-0.5),
            relative_position_bias_table,
            relative_position_index,
            qkv: LinearConfig::new(self.dim, self.dim * 3)
                .with_bias(self.qkv_bias)
                .init(device),
            attn_drop: DropoutConfig::new(self.attn_drop).init(),
            proj: LinearConfig::new(self.dim, self.dim).init(device),
            proj_drop: DropoutConfig::new(self.proj_drop).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct WindowAttention<B: Backend> {
    num_heads: usize,
    scale: f64,
    relative_position_bias_table: Param<Tensor<B, 2>>,
    relative_position_index: Param<Tensor<B, 1, Int>>,
    qkv: Linear<B>,
    attn_drop: Dropout,
    proj: Linear<B>,
    proj_drop: Dropout,
}

impl<B: Backend> WindowAttention<B> {
    /// Attends within windows.
    ///
    /// `x` has shape `[num_windows * batch, window_area, channels]`; `mask`
    /// (for shifted windows) has shape `[num_windows, window_area,
    /// window_area]`.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        let [b, n, c] = x.dims();
        let head_dim = c / self.num_heads;
        let qkv = self
            .qkv
            .forward(x)
            .reshape([b, n, 3, self.num_heads, head_dim])
            .permute([2, 0, 3, 1, 4]);
        let q: Tensor<B, 4> = qkv
            .clone()
            .slice([0..1, 0..b, 0..self.num_heads, 0..n, 0..head_dim])
            .reshape([b, self.num_heads, n, head_dim]);
        let k: Tensor<B, 4> = qkv
            .clone()
            .slice([1..2, 0..b, 0..self.num_heads, 0..n, 0..head_dim])
            .reshape([b, self.num_heads, n, head_dim]);
        let v: Tensor<B, 4> = qkv
            .slice([2..3, 0..b, 0..self.num_heads, 0..n, 0..head_dim])
            .reshape([b, self.num_heads, n, head_dim]);

        let attn = (q * self.scale).matmul(k.swap_dims(2, 3));

        let bias = self
            .relative_position_bias_table
            .val()
            .select(0, self.relative_position_index.val())
            .reshape([n, n, self.num_heads])
            .permute([2, 0, 1])
            .reshape([1, self.num_heads, n, n]);
        let attn = attn + bias;

        let attn = match mask {
            Some(mask) => {
                let [nw, mh, mw] = mask.dims();
                let attn = attn.reshape([b / nw, nw, self.num_heads, n, n]);
                let mask = mask.reshape([1, nw, 1, mh, mw]);
                (attn + mask).reshape([b, self.num_heads, n, n])
            }
            None => attn,
        };

        let attn = softmax(attn, 3);
        let attn = self.attn_drop.forward(attn);
        let x = attn.matmul(v).swap_dims(1, 2).reshape([b, n, c]);
        let x = self.proj.forward(x);

        self.proj_drop.forward(x)
    }
}

/// One Swin block: window attention (shifted on odd blocks) plus MLP, both
/// with residual connections and stochastic depth.
#[derive(Config, Debug)]
pub struct SwinBlockConfig {
    dim: usize,
    num_heads: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "0")]
    shift_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "0.0")]
    drop: f64,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "0.0")]
    drop_path: f64,
}

impl SwinBlockConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinBlock<B> {
        let hidden = (self.dim as f64 * self.mlp_ratio) as usize;

        SwinBlock {
            window_size: self.window_size,
            shift_size: self.shift_size,
            norm1: LayerNormConfig::new(self.dim).init(device),
            attn: WindowAttentionConfig::new(self.dim, self.window_size, self.num_heads)
                .with_attn_drop(self.attn_drop)
                .with_proj_drop(self.drop)
                .init(device),
            norm2: LayerNormConfig::new(self.dim).init(device),
            mlp: MlpConfig::new(self.dim, hidden).with_drop(self.drop).init(device),
            drop_path: DropPathConfig::new().with_drop_prob(self.drop_path).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct SwinBlock<B: Backend> {
    window_size: usize,
    shift_size: usize,
    norm1: LayerNorm<B>,
    attn: WindowAttention<B>,
    norm2: LayerNorm<B>,
    mlp: Mlp<B>,
    drop_path: DropPath,
}

impl<B: Backend> SwinBlock<B> {
    /// `x` is `[batch, h * w, channels]`; `attn_mask` is the stage's shifted
    /// window mask, used only when this block shifts.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        h: usize,
        w: usize,
        attn_mask: Option<&Tensor<B, 3>>,
    ) -> Tensor<B, 3> {
        let [b, _, c] = x.dims();

        let shortcut = x.clone();
        let x = self.norm1.forward(x).reshape([b, h, w, c]);

        // Pad to a multiple of the window size.
        let pad_r = (self.window_size - w % self.window_size) % self.window_size;
        let pad_b = (self.window_size - h % self.window_size) % self.window_size;
        let x = x
            .permute([0, 3, 1, 2])
            .pad((0, pad_r, 0, pad_b), B::FloatElem::from_elem(0.0))
            .permute([0, 2, 3, 1]);
        let [_, hp, wp, _] = x.dims();

        let (shifted, mask) = if self.shift_size > 0 {
            let shift = self.shift_size as i64;
            (roll2(x, [-shift, -shift], [1, 2]), attn_mask.cloned())
        } else {
            (x, None)
        };

        let windows = window_partition(shifted, self.window_size);
        let num_windows = windows.dims()[0];
        let windows = windows.reshape([num_windows, self.window_size * self.window_size, c]);
        let attended = self.attn.forward(windows, mask);
        let attended = attended.reshape([num_windows, self.window_size, self.window_size, c]);
        let shifted = window_reverse(attended, self.window_size, hp, wp);

        let x = if self.shift_size > 0 {
            let shift = self.shift_size as i64;
            roll2(shifted, [shift, shift], [1, 2])
        } else {
            shifted
        };
        let x = if pad_r > 0 || pad_b > 0 {
            x.slice([0..b, 0..h, 0..w, 0..c])
        } else {
            x
        };
        let x = x.reshape([b, h * w, c]);

        let x = shortcut + self.drop_path.forward(x);

        x.clone()
            + self
                .drop_path
                .forward(self.mlp.forward(self.norm2.forward(x)))
    }
}

/// Merges 2x2 neighbouring patches, halving resolution and doubling channels.
#[derive(Config, Debug)]
pub struct PatchMergingConfig {
    dim: usize,
}

impl PatchMergingConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PatchMerging<B> {
        PatchMerging {
            norm: LayerNormConfig::new(4 * self.dim).init(device),
            reduction: LinearConfig::new(4 * self.dim, 2 * self.dim)
                .with_bias(false)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct PatchMerging<B: Backend> {
    norm: LayerNorm<B>,
    reduction: Linear<B>,
}

impl<B: Backend> PatchMerging<B> {
    pub fn forward(&self, x: Tensor<B, 3>, h: usize, w: usize) -> Tensor<B, 3> {
        let device = x.device();
        let [b, _, c] = x.dims();

        let x = x.reshape([b, h, w, c]);
        let hp = h + h % 2;
        let wp = w + w % 2;
        let x = if hp != h || wp != w {
            x.permute([0, 3, 1, 2])
                .pad((0, wp - w, 0, hp - h), B::FloatElem::from_elem(0.0))
                .permute([0, 2, 3, 1])
        } else {
            x
        };

        let top = Tensor::arange_step(0..hp as i64, 2, &device);
        let bottom = Tensor::arange_step(1..hp as i64, 2, &device);
        let left = Tensor::arange_step(0..wp as i64, 2, &device);
        let right = Tensor::arange_step(1..wp as i64, 2, &device);

        let x0 = x.clone().select(1, top.clone()).select(2, left.clone());
        let x1 = x.clone().select(1, bottom.clone()).select(2, left);
        let x2 = x.clone().select(1, top).select(2, right.clone());
        let x3 = x.select(1, bottom).select(2, right);

        let x = Tensor::cat(vec![x0, x1, x2, x3], 3);
        let x = x.reshape([b, (hp / 2) * (wp / 2), 4 * c]);
        let x = self.norm.forward(x);

        self.reduction.forward(x)
    }
}

/// One resolution stage: alternating regular/shifted blocks plus an optional
/// patch-merging downsample.
#[derive(Config, Debug)]
pub struct SwinStageConfig {
    dim: usize,
    depth: usize,
    num_heads: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "0.0")]
    drop: f64,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "Vec::new()")]
    drop_path: Vec<f64>,
    #[config(default = "false")]
    downsample: bool,
}

impl SwinStageConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinStage<B> {
        let blocks = (0..self.depth)
            .map(|i| {
                SwinBlockConfig::new(self.dim, self.num_heads)
                    .with_window_size(self.window_size)
                    .with_shift_size(if i % 2 == 0 { 0 } else { self.window_size / 2 })
                    .with_mlp_ratio(self.mlp_ratio)
                    .with_drop(self.drop)
                    .with_attn_drop(self.attn_drop)
                    .with_drop_path(self.drop_path.get(i).copied().unwrap_or(0.0))
                    .init(device)
            })
            .collect();
        let downsample = self
            .downsample
            .then(|| PatchMergingConfig::new(self.dim).init(device));

        SwinStage {
            window_size: self.window_size,
            shift_size: self.window_size / 2,
            blocks,
            downsample,
        }
    }
}

#[derive(Module, Debug)]
pub struct SwinStage<B: Backend> {
    window_size: usize,
    shift_size: usize,
    blocks: Vec<SwinBlock<B>>,
    downsample: Option<PatchMerging<B>>,
}

impl<B: Backend> SwinStage<B> {
    /// Mask for shifted window attention at padded resolution `hp` x `wp`:
    /// positions from different spatial regions get an additive -100 so the
    /// softmax ignores cross-region pairs.
    fn attention_mask(&self, hp: usize, wp: usize, device: &Device<B>) -> Tensor<B, 3> {
        let ws = self.window_size;
        let ss = self.shift_size;
        let mut img_mask: Tensor<B, 4> = Tensor::zeros([1, hp, wp, 1], device);
        let h_bounds = [0, hp - ws, hp - ss, hp];
        let w_bounds = [0, wp - ws, wp - ss, wp];
        let mut region = 0.0;
        for hi in 0..3 {
            for wi in 0..3 {
                let (h0, h1) = (h_bounds[hi], h_bounds[hi + 1]);
                let (w0, w1) = (w_bounds[wi], w_bounds[wi + 1]);
                if h1 > h0 && w1 > w0 {
                    img_mask = img_mask.slice_assign(
                        [0..1, h0..h1, w0..w1, 0..1],
                        Tensor::full([1, h1 - h0, w1 - w0, 1], region, device),
                    );
                }
                region += 1.0;
            }
        }

        let windows = window_partition(img_mask, ws);
        let num_windows = windows.dims()[0];
        let windows = windows.reshape([num_windows, ws * ws]);
        let diff: Tensor<B, 3> =
            windows.clone().unsqueeze_dim(1) - windows.unsqueeze_dim(2);

        diff.not_equal_elem(0.0).float() * (-100.0)
    }

    /// Returns the stage output at the input resolution plus the downsampled
    /// carry for the next stage.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        h: usize,
        w: usize,
    ) -> (Tensor<B, 3>, Tensor<B, 3>, usize, usize) {
        let device = x.device();
        let hp = h.div_ceil(self.window_size) * self.window_size;
        let wp = w.div_ceil(self.window_size) * self.window_size;
        let attn_mask = self.attention_mask(hp, wp, &device);

        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x, h, w, Some(&attn_mask));
        }

        match &self.downsample {
            Some(downsample) => {
                let down = downsample.forward(x.clone(), h, w);
                (x, down, h.div_ceil(2), w.div_ceil(2))
            }
            None => (x.clone(), x, h, w),
        }
    }
}

/// Projects image patches to the embedding dimension with a strided conv.
#[derive(Config, Debug)]
pub struct PatchEmbedConfig {
    #[config(default = "4")]
    patch_size: usize,
    #[config(default = "3")]
    in_channels: usize,
    #[config(default = "96")]
    embed_dim: usize,
}

impl PatchEmbedConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PatchEmbed<B> {
        PatchEmbed {
            patch_size: self.patch_size,
            embed_dim: self.embed_dim,
            proj: Conv2dConfig::new(
                [self.in_channels, self.embed_dim],
                [self.patch_size, self.patch_size],
            )
            .with_stride([self.patch_size, self.patch_size])
            .init(device),
            norm: LayerNormConfig::new(self.embed_dim).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct PatchEmbed<B: Backend> {
    patch_size: usize,
    embed_dim: usize,
    proj: Conv2d<B>,
    norm: LayerNorm<B>,
}

impl<B: Backend> PatchEmbed<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let pad_r = (self.patch_size - w % self.patch_size) % self.patch_size;
        let pad_b = (self.patch_size - h % self.patch_size) % self.patch_size;
        let x = if pad_r > 0 || pad_b > 0 {
            x.pad((0, pad_r, 0, pad_b), B::FloatElem::from_elem(0.0))
        } else {
            x
        };
        let x = self.proj.forward(x);

        let [b, _, wh, ww] = x.dims();
        let x: Tensor<B, 3> = x.flatten(2, 3).swap_dims(1, 2);
        let x = self.norm.forward(x);

        x.swap_dims(1, 2).reshape([b, self.embed_dim, wh, ww])
    }
}

/// Configuration for the full four-stage Swin trunk.
#[derive(Config, Debug)]
pub struct SwinTransformerConfig {
    #[config(default = "4")]
    patch_size: usize,
    #[config(default = "3")]
    in_channels: usize,
    #[config(default = "96")]
    embed_dim: usize,
    #[config(default = "[2, 2, 6, 2]")]
    depths: [usize; 4],
    #[config(default = "[3, 6, 12, 24]")]
    num_heads: [usize; 4],
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "0.0")]
    drop_rate: f64,
    #[config(default = "0.0")]
    attn_drop_rate: f64,
    #[config(default = "0.2")]
    drop_path_rate: f64,
}

impl SwinTransformerConfig {
    /// Swin-T: 96-dim embedding, depths [2, 2, 6, 2].
    pub fn swin_t() -> Self {
        Self::new()
    }

    /// Swin-L: 192-dim embedding, depths [2, 2, 18, 2], 12x12 windows.
    pub fn swin_l() -> Self {
        Self::new()
            .with_embed_dim(192)
            .with_depths([2, 2, 18, 2])
            .with_num_heads([6, 12, 24, 48])
            .with_window_size(12)
    }

    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinTransformer<B> {
        let num_stages = self.depths.len();
        let total_depth: usize = self.depths.iter().sum();

        let patch_embed = PatchEmbedConfig::new()
            .with_patch_size(self.patch_size)
            .with_in_channels(self.in_channels)
            .with_embed_dim(self.embed_dim)
            .init(device);

        // Stochastic depth decays linearly over the whole trunk.
        let dpr: Vec<f64> = (0..total_depth)
            .map(|i| self.drop_path_rate * i as f64 / (total_depth.max(2) - 1) as f64)
            .collect();

        let mut stages = Vec::new();
        let mut offset = 0;
        for i in 0..num_stages {
            let dim = self.embed_dim << i;
            stages.push(
                SwinStageConfig::new(dim, self.depths[i], self.num_heads[i])
                    .with_window_size(self.window_size)
                    .with_mlp_ratio(self.mlp_ratio)
                    .with_drop(self.drop_rate)
                    .with_attn_drop(self.attn_drop_rate)
                    .with_drop_path(dpr[offset..offset + self.depths[i]].to_vec())
                    .with_downsample(i < num_stages - 1)
                    .init(device),
            );
            offset += self.depths[i];
        }

        let num_features = [
            self.embed_dim,
            self.embed_dim * 2,
            self.embed_dim * 4,
            self.embed_dim * 8,
        ];
        let norms = num_features
            .iter()
            .map(|&dim| LayerNormConfig::new(dim).init(device))
            .collect();

        SwinTransformer {
            patch_embed,
            pos_drop: DropoutConfig::new(self.drop_rate).init(),
            stages,
            norms,
            num_features,
        }
    }
}

/// Four-stage Swin trunk producing one feature map per stage.
#[derive(Module, Debug)]
pub struct SwinTransformer<B: Backend> {
    patch_embed: PatchEmbed<B>,
    pos_drop: Dropout,
    stages: Vec<SwinStage<B>>,
    norms: Vec<LayerNorm<B>>,
    num_features: [usize; 4],
}

impl<B: Backend> SwinTransformer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let x = self.patch_embed.forward(x);
        let [b, _, mut h, mut w] = x.dims();

        let x: Tensor<B, 3> = x.flatten(2, 3).swap_dims(1, 2);
        let mut x = self.pos_drop.forward(x);

        let mut outs = Vec::with_capacity(self.stages.len());
        for (i, stage) in self.stages.iter().enumerate() {
            let (out, down, dh, dw) = stage.forward(x, h, w);
            let out = self.norms[i].forward(out);
            outs.push(
                out.reshape([b, h, w, self.num_features[i]])
                    .permute([0, 3, 1, 2]),
            );
            x = down;
            h = dh;
            w = dw;
        }

        outs
    }
}

impl<B: Backend> VisualBackbone<B> for SwinTransformer<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        Self::forward(self, images)
    }

    fn out_channels(&self) -> Vec<usize> {
        self.num_features.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn window_partition_roundtrips() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::random(
            [2, 14, 14, 32],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let windows = window_partition(input.clone(), 7);
        assert_eq!(windows.dims(), [2 * 4, 7, 7, 32]);

        let reversed = window_reverse(windows, 7, 14, 14);
        reversed.into_data().assert_eq(&input.into_data(), true);
    }

    #[test]
    fn window_attention_keeps_shape() {
        let device = Default::default();
        let attn = WindowAttentionConfig::new(32, 7, 4).init::<TestBackend>(&device);
        let input =
            Tensor::<TestBackend, 3>::random([4, 49, 32], Distribution::Normal(0.0, 1.0), &device);

        assert_eq!(attn.forward(input, None).dims(), [4, 49, 32]);
    }

    #[test]
    fn patch_merging_halves_resolution_and_doubles_channels() {
        let device = Default::default();
        let merging = PatchMergingConfig::new(32).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 3>::random(
            [2, 28 * 28, 32],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        assert_eq!(merging.forward(input, 28, 28).dims(), [2, 14 * 14, 64]);
    }

    #[test]
    fn tiny_trunk_emits_four_scales() {
        let device = Default::default();
        let trunk = SwinTransformerConfig::new()
            .with_embed_dim(32)
            .with_depths([1, 1, 1, 1])
            .with_num_heads([1, 2, 4, 8])
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let outs = SwinTransformer::forward(&trunk, input);

        assert_eq!(outs.len(), 4);
        assert_eq!(outs[0].dims(), [1, 32, 16, 16]);
        assert_eq!(outs[1].dims(), [1, 64, 8, 8]);
        assert_eq!(outs[2].dims(), [1, 128, 4, 4]);
        assert_eq!(outs[3].dims(), [1, 256, 2, 2]);
    }

    #[test]
    fn trunk_forward_is_deterministic() {
        let device = Default::default();
        // Default config carries a nonzero stochastic-depth rate; it must
        // stay inert for a trunk built outside training.
        let trunk = SwinTransformerConfig::new()
            .with_embed_dim(32)
            .with_depths([1, 1, 1, 1])
            .with_num_heads([1, 2, 4, 8])
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let first = SwinTransformer::forward(&trunk, input.clone());
        let second = SwinTransformer::forward(&trunk, input);

        for (a, b) in first.into_iter().zip(second) {
            a.into_data().assert_eq(&b.into_data(), true);
        }
    }
}
