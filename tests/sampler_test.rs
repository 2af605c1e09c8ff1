mod common;

use approx::assert_abs_diff_eq;
use burn::tensor::{Tensor, TensorData};
use common::{TestBackend, to_vec};
use vae_gen::{LatentSampler, NoiseSource, SeededNoise, VaeError, reparameterize};

fn filled(batch: usize, dim: usize, value: f32) -> Tensor<TestBackend, 2> {
    Tensor::from_floats(
        TensorData::new(vec![value; batch * dim], vec![batch, dim]),
        &Default::default(),
    )
}

#[test]
fn output_shape_matches_input_for_any_batch() {
    let sampler = LatentSampler::new();
    let mut noise = SeededNoise::new(1);
    for (batch, dim) in [(1, 1), (16, 2), (3, 7), (225, 2)] {
        let z = sampler
            .sample(filled(batch, dim, 0.0), filled(batch, dim, 0.0), &mut noise)
            .unwrap();
        assert_eq!(z.dims(), [batch, dim]);
    }
}

#[test]
fn consecutive_draws_differ() {
    let sampler = LatentSampler::new();
    let mut noise = SeededNoise::new(3);
    let a = to_vec(sampler.sample(filled(8, 2, 0.5), filled(8, 2, -1.0), &mut noise).unwrap());
    let b = to_vec(sampler.sample(filled(8, 2, 0.5), filled(8, 2, -1.0), &mut noise).unwrap());
    assert_ne!(a, b);
}

#[test]
fn same_seed_replays_same_sample() {
    let sampler = LatentSampler::new();
    let a = to_vec(
        sampler
            .sample(filled(8, 2, 0.5), filled(8, 2, -1.0), &mut SeededNoise::new(11))
            .unwrap(),
    );
    let b = to_vec(
        sampler
            .sample(filled(8, 2, 0.5), filled(8, 2, -1.0), &mut SeededNoise::new(11))
            .unwrap(),
    );
    assert_eq!(a, b);
}

#[test]
fn elements_within_a_call_get_independent_noise() {
    let mut noise = SeededNoise::new(5);
    let z = to_vec(
        LatentSampler::new()
            .sample(filled(4, 4, 0.0), filled(4, 4, 0.0), &mut noise)
            .unwrap(),
    );
    let first = z[0];
    assert!(z.iter().skip(1).any(|&v| v != first));
}

#[test]
fn standard_prior_returns_the_noise_itself() {
    let eps = SeededNoise::new(21).standard_normal(6);
    let z = to_vec(
        LatentSampler::new()
            .sample(filled(3, 2, 0.0), filled(3, 2, 0.0), &mut SeededNoise::new(21))
            .unwrap(),
    );
    assert_eq!(z, eps);
}

#[test]
fn log_variance_scales_noise_by_its_exponential() {
    let device = Default::default();
    let mean = Tensor::<TestBackend, 2>::from_floats(
        TensorData::new(vec![1.0_f32, -2.0], vec![1, 2]),
        &device,
    );
    let log_var = Tensor::<TestBackend, 2>::from_floats(
        TensorData::new(vec![2.0_f32.ln(), 0.0], vec![1, 2]),
        &device,
    );
    let eps = Tensor::<TestBackend, 2>::from_floats(
        TensorData::new(vec![1.0_f32, 0.5], vec![1, 2]),
        &device,
    );

    let z = to_vec(reparameterize(mean, log_var, eps));
    // 1 + exp(ln 2) * 1 and -2 + exp(0) * 0.5
    assert_abs_diff_eq!(z[0], 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(z[1], -1.5, epsilon = 1e-6);
}

#[test]
fn mismatched_parameters_are_a_shape_error() {
    let err = LatentSampler::new()
        .sample(filled(4, 2, 0.0), filled(4, 3, 0.0), &mut SeededNoise::new(0))
        .unwrap_err();
    assert!(matches!(err, VaeError::Shape(_)));
}
