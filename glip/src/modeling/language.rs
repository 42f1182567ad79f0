//! Language backbones and their registry builders.
//!
//! A language backbone turns tokenized text (ids plus attention mask) into
//! per-token hidden states and a pooled sentence embedding. Tokenization
//! itself happens upstream; this module starts at token ids.

use burn::{
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig,
    },
    prelude::*,
};

use crate::config::ConfigDocument;
use crate::error::GlipResult;

/// Encoded text: per-token hidden states plus a pooled sentence embedding.
#[derive(Debug, Clone)]
pub struct LanguageFeatures<B: Backend> {
    /// Hidden states, `[batch, length, hidden]`.
    pub hidden: Tensor<B, 3>,
    /// Masked mean pooling over real tokens, `[batch, hidden]`.
    pub pooled: Tensor<B, 2>,
    /// The attention mask that was applied, true for real tokens.
    pub mask: Tensor<B, 2, Bool>,
}

/// Capability interface for language backbones.
pub trait LanguageBackbone<B: Backend> {
    /// Encodes `[batch, length]` token ids under the given attention mask.
    fn forward(&self, tokens: Tensor<B, 2, Int>, mask: Tensor<B, 2, Bool>)
        -> LanguageFeatures<B>;

    /// Dimension of the hidden states.
    fn hidden_size(&self) -> usize;
}

/// BERT-style transformer text encoder.
#[derive(Config, Debug)]
pub struct TextEncoderConfig {
    vocab_size: usize,
    #[config(default = "768")]
    hidden_size: usize,
    #[config(default = "12")]
    num_layers: usize,
    #[config(default = "12")]
    num_heads: usize,
    #[config(default = "3072")]
    ff_size: usize,
    #[config(default = "512")]
    max_positions: usize,
    #[config(default = "0.1")]
    dropout: f64,
}

impl TextEncoderConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> TextEncoder<B> {
        TextEncoder {
            hidden_size: self.hidden_size,
            token_embedding: EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embedding: EmbeddingConfig::new(self.max_positions, self.hidden_size)
                .init(device),
            embedding_norm: LayerNormConfig::new(self.hidden_size).init(device),
            encoder: TransformerEncoderConfig::new(
                self.hidden_size,
                self.ff_size,
                self.num_heads,
                self.num_layers,
            )
            .with_dropout(self.dropout)
            .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    hidden_size: usize,
    token_embedding: Embedding<B>,
    position_embedding: Embedding<B>,
    embedding_norm: LayerNorm<B>,
    encoder: TransformerEncoder<B>,
}

impl<B: Backend> TextEncoder<B> {
    pub fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        mask: Tensor<B, 2, Bool>,
    ) -> LanguageFeatures<B> {
        let device = tokens.device();
        let [b, l] = tokens.dims();

        let positions = Tensor::arange(0..l as i64, &device)
            .reshape([1, l])
            .repeat_dim(0, b);
        let embedded = self.token_embedding.forward(tokens)
            + self.position_embedding.forward(positions);
        let embedded = self.embedding_norm.forward(embedded);

        let hidden = self.encoder.forward(
            TransformerEncoderInput::new(embedded).mask_pad(mask.clone().bool_not()),
        );

        // Masked mean over real tokens.
        let weights = mask.clone().float();
        let counts = weights.clone().sum_dim(1).reshape([b, 1]).clamp_min(1.0);
        let pooled = (hidden.clone() * weights.unsqueeze_dim(2))
            .sum_dim(1)
            .reshape([b, self.hidden_size])
            / counts;

        LanguageFeatures {
            hidden,
            pooled,
            mask,
        }
    }
}

impl<B: Backend> LanguageBackbone<B> for TextEncoder<B> {
    fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        mask: Tensor<B, 2, Bool>,
    ) -> LanguageFeatures<B> {
        Self::forward(self, tokens, mask)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

fn text_encoder_config(cfg: &ConfigDocument, vocab_size: usize) -> TextEncoderConfig {
    let mut config = TextEncoderConfig::new(vocab_size);
    if let Some(hidden) = cfg.usize_at("MODEL.LANGUAGE_BACKBONE.LANG_DIM") {
        config = config.with_hidden_size(hidden).with_ff_size(hidden * 4);
    }
    if let Some(layers) = cfg.usize_at("MODEL.LANGUAGE_BACKBONE.N_LAYERS") {
        config = config.with_num_layers(layers);
    }
    if let Some(heads) = cfg.usize_at("MODEL.LANGUAGE_BACKBONE.N_HEADS") {
        config = config.with_num_heads(heads);
    }
    if let Some(max_len) = cfg.usize_at("MODEL.LANGUAGE_BACKBONE.MAX_QUERY_LEN") {
        config = config.with_max_positions(max_len);
    }
    config
}

/// Builder for the `bert-base-uncased` key.
pub fn build_bert_base_uncased<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn LanguageBackbone<B>>> {
    Ok(Box::new(text_encoder_config(cfg, 30522).init(device)))
}

/// Builder for the `roberta-base` key.
pub fn build_roberta_base<B: Backend>(
    cfg: &ConfigDocument,
    device: &Device<B>,
) -> GlipResult<Box<dyn LanguageBackbone<B>>> {
    Ok(Box::new(text_encoder_config(cfg, 50265).init(device)))
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn encoder_emits_hidden_states_and_pooled_embedding() {
        let device = Default::default();
        let encoder = TextEncoderConfig::new(100)
            .with_hidden_size(16)
            .with_ff_size(32)
            .with_num_layers(1)
            .with_num_heads(2)
            .with_max_positions(8)
            .init::<TestBackend>(&device);

        let tokens = Tensor::<TestBackend, 2, Int>::from_ints([[5, 9, 2, 0], [7, 1, 0, 0]], &device);
        let mask = Tensor::<TestBackend, 2, Bool>::from_bool(
            [[true, true, true, false], [true, true, false, false]].into(),
            &device,
        );

        let features = TextEncoder::forward(&encoder, tokens, mask);
        assert_eq!(features.hidden.dims(), [2, 4, 16]);
        assert_eq!(features.pooled.dims(), [2, 16]);
        assert_eq!(LanguageBackbone::hidden_size(&encoder), 16);
    }
}
