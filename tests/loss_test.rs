mod common;

use approx::assert_abs_diff_eq;
use burn::prelude::ElementConversion;
use burn::tensor::{Tensor, TensorData};
use common::{TestBackend, to_vec};
use vae_gen::loss::{ensure_finite, kl_term, reconstruction_term};
use vae_gen::{NoiseSource, SeededNoise, VaeError, vae_loss};

const KL_WEIGHT: f64 = 5e-4;

fn latent(values: Vec<f32>, batch: usize) -> Tensor<TestBackend, 2> {
    let dim = values.len() / batch;
    Tensor::from_floats(TensorData::new(values, vec![batch, dim]), &Default::default())
}

fn images(values: Vec<f32>, batch: usize, side: usize) -> Tensor<TestBackend, 4> {
    Tensor::from_floats(
        TensorData::new(values, vec![batch, 1, side, side]),
        &Default::default(),
    )
}

fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

#[test]
fn kl_is_exactly_zero_at_the_prior() {
    let kl = to_vec(kl_term(latent(vec![0.0; 32], 16), latent(vec![0.0; 32], 16), KL_WEIGHT));
    assert_eq!(kl.len(), 16);
    assert!(kl.iter().all(|&v| v == 0.0));
}

#[test]
fn kl_matches_closed_form() {
    // mean 1, log-var 0: bracket = 1 + 0 - 1 - 1 = -1 per dim
    let kl = to_vec(kl_term(latent(vec![1.0, 1.0], 1), latent(vec![0.0, 0.0], 1), KL_WEIGHT));
    assert_abs_diff_eq!(kl[0], KL_WEIGHT as f32, epsilon = 1e-9);
}

#[test]
fn reconstruction_of_uniform_half_is_ln_two() {
    let recon = to_vec(reconstruction_term(
        images(vec![0.5; 2 * 16], 2, 4),
        images(vec![0.5; 2 * 16], 2, 4),
    ));
    assert_eq!(recon.len(), 2);
    for v in recon {
        assert_abs_diff_eq!(v, std::f32::consts::LN_2, epsilon = 1e-5);
    }
}

#[test]
fn perfect_binary_reconstruction_is_near_zero() {
    let pixels: Vec<f32> = (0..16).map(|i| (i % 2) as f32).collect();
    let recon = to_vec(reconstruction_term(images(pixels.clone(), 1, 4), images(pixels, 1, 4)));
    assert!(recon[0] >= 0.0 && recon[0] < 1e-5, "got {}", recon[0]);
}

#[test]
fn composite_loss_adds_batch_means() {
    let loss = vae_loss(
        images(vec![0.5; 2 * 16], 2, 4),
        images(vec![0.5; 2 * 16], 2, 4),
        latent(vec![1.0, 1.0, 0.0, 0.0], 2),
        latent(vec![0.0; 4], 2),
        KL_WEIGHT,
    )
    .unwrap();

    // one sample carries the full KL, the other none
    let expected_kl = KL_WEIGHT / 2.0;
    assert_abs_diff_eq!(scalar(loss.kl.clone()), expected_kl, epsilon = 1e-8);
    assert_abs_diff_eq!(
        scalar(loss.reconstruction.clone()),
        std::f64::consts::LN_2,
        epsilon = 1e-5
    );
    assert_abs_diff_eq!(
        scalar(loss.total),
        std::f64::consts::LN_2 + expected_kl,
        epsilon = 1e-5
    );
}

#[test]
fn loss_is_non_negative_for_valid_inputs() {
    let mut noise = SeededNoise::new(99);
    for _ in 0..10 {
        let sigmoid = |v: f32| 1.0 / (1.0 + (-v).exp());
        let x: Vec<f32> = noise.standard_normal(3 * 16).into_iter().map(sigmoid).collect();
        let recon: Vec<f32> = noise.standard_normal(3 * 16).into_iter().map(sigmoid).collect();
        let mean = noise.standard_normal(6);
        let log_var = noise.standard_normal(6);

        let loss = vae_loss(
            images(x, 3, 4),
            images(recon, 3, 4),
            latent(mean, 3),
            latent(log_var, 3),
            KL_WEIGHT,
        )
        .unwrap();

        assert!(scalar(loss.kl) >= 0.0);
        assert!(scalar(loss.reconstruction) >= 0.0);
        let total = ensure_finite(loss.total, "test").unwrap();
        assert!(total >= 0.0);
    }
}

#[test]
fn diverging_log_variance_is_reported() {
    let loss = vae_loss(
        images(vec![0.5; 16], 1, 4),
        images(vec![0.5; 16], 1, 4),
        latent(vec![0.0, 0.0], 1),
        latent(vec![200.0, 0.0], 1),
        KL_WEIGHT,
    )
    .unwrap();

    match ensure_finite(loss.total, "training loss") {
        Err(VaeError::NumericInstability { context, value }) => {
            assert_eq!(context, "training loss");
            assert!(!value.is_finite());
        }
        other => panic!("expected numeric instability, got {other:?}"),
    }
}

#[test]
fn mismatched_reconstruction_is_a_shape_error() {
    let err = vae_loss(
        images(vec![0.5; 16], 1, 4),
        images(vec![0.5; 4], 1, 2),
        latent(vec![0.0, 0.0], 1),
        latent(vec![0.0, 0.0], 1),
        KL_WEIGHT,
    )
    .unwrap_err();
    assert!(matches!(err, VaeError::Shape(_)));
}

#[test]
fn mismatched_batch_sizes_are_a_shape_error() {
    let err = vae_loss(
        images(vec![0.5; 32], 2, 4),
        images(vec![0.5; 32], 2, 4),
        latent(vec![0.0; 6], 3),
        latent(vec![0.0; 6], 3),
        KL_WEIGHT,
    )
    .unwrap_err();
    assert!(matches!(err, VaeError::Shape(_)));
}
