//! Tensor helpers the backbones need that Burn does not provide.

use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Distribution, Tensor},
};

/// Cyclically shifts `input` by `shift` along `dim`.
///
/// Negative shifts move elements toward the front, matching the shifted
/// window scheme of the Swin backbone.
pub fn roll_dim<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    shift: i64,
    dim: usize,
) -> Tensor<B, D> {
    let size = input.dims()[dim] as i64;
    let split = (size - shift).rem_euclid(size) as usize;
    if split == 0 {
        return input;
    }
    let tail = input
        .clone()
        .narrow(dim, split, size as usize - split);
    let head = input.narrow(dim, 0, split);
    Tensor::cat(vec![tail, head], dim)
}

/// Cyclic shift along two dimensions, applied in order.
pub fn roll2<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    shifts: [i64; 2],
    dims: [usize; 2],
) -> Tensor<B, D> {
    let rolled = roll_dim(input, shifts[0], dims[0]);
    roll_dim(rolled, shifts[1], dims[1])
}

/// Configuration for [`DropPath`] stochastic depth.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    #[config(default = "0.0")]
    drop_prob: f64,
    #[config(default = "false")]
    training: bool,
}

impl DropPathConfig {
    pub fn init(&self) -> DropPath {
        DropPath {
            drop_prob: self.drop_prob,
            training: self.training,
        }
    }
}

/// Drops whole residual branches per sample with probability `drop_prob`
/// during training. Outside training the module is an identity map.
#[derive(Module, Clone, Debug, Default)]
pub struct DropPath {
    drop_prob: f64,
    training: bool,
}

impl DropPath {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if !self.training || self.drop_prob == 0.0 {
            return x;
        }
        let keep_prob = 1.0 - self.drop_prob;
        let mut shape = [1; D];
        shape[0] = x.dims()[0];
        let mask = Tensor::random(shape, Distribution::Bernoulli(keep_prob), &x.device());
        x * mask / keep_prob
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn roll_shifts_elements_cyclically() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 2.0, 3.0], &device);

        let rolled = roll_dim(input.clone(), 1, 0);
        let expected = Tensor::<TestBackend, 1>::from_floats([3.0, 0.0, 1.0, 2.0], &device);
        rolled.into_data().assert_eq(&expected.into_data(), true);

        let rolled = roll_dim(input, -1, 0);
        let expected = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 0.0], &device);
        rolled.into_data().assert_eq(&expected.into_data(), true);
    }

    #[test]
    fn roll_by_zero_is_identity() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 2.0], &device);
        let rolled = roll_dim(input.clone(), 0, 0);
        rolled.into_data().assert_eq(&input.into_data(), true);
    }

    #[test]
    fn drop_path_is_identity_without_drop_prob() {
        let device = Default::default();
        let drop_path = DropPathConfig::new().init();
        let input = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let output = drop_path.forward(input.clone());
        output.into_data().assert_eq(&input.into_data(), true);
    }

    #[test]
    fn drop_path_is_identity_outside_training() {
        let device = Default::default();
        let drop_path = DropPathConfig::new().with_drop_prob(0.5).init();
        let input = Tensor::<TestBackend, 2>::ones([8, 4], &device);
        let output = drop_path.forward(input.clone());
        output.into_data().assert_eq(&input.into_data(), true);
    }

    #[test]
    fn drop_path_scales_surviving_samples_in_training() {
        let device = Default::default();
        let drop_path = DropPathConfig::new()
            .with_drop_prob(0.5)
            .with_training(true)
            .init();
        let input = Tensor::<TestBackend, 2>::ones([16, 4], &device);
        let output = drop_path.forward(input);

        // Each sample either survives rescaled by 1 / keep_prob or is zeroed.
        for value in output.into_data().iter::<f32>() {
            assert!(value == 0.0 || value == 2.0, "unexpected value {value}");
        }
    }
}
