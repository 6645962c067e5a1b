//! Shared test utilities for the forget-mult engines.

use burn::tensor::{Distribution, Tensor, TensorData, backend::Backend};

use crate::error::SeqDims;

#[cfg(feature = "rocm")]
pub type GpuBackend = burn::backend::Rocm<f32>;

#[cfg(all(feature = "cuda", not(feature = "rocm")))]
pub type GpuBackend = burn::backend::Cuda<f32>;

#[cfg(all(feature = "wgpu", not(any(feature = "rocm", feature = "cuda"))))]
pub type GpuBackend = burn::backend::Wgpu<f32>;

#[cfg(all(
    feature = "cpu",
    not(any(feature = "rocm", feature = "cuda", feature = "wgpu"))
))]
pub type GpuBackend = burn::backend::Cpu<f32>;

#[cfg(any(feature = "rocm", feature = "cuda", feature = "wgpu", feature = "cpu"))]
pub type GpuAutodiffBackend = burn::backend::Autodiff<GpuBackend>;

/// Host backend, always available.
pub type CpuBackend = burn::backend::NdArray<f32>;
pub type CpuAutodiffBackend = burn::backend::Autodiff<CpuBackend>;

/// Host backend without fused support.
pub type CpuF64Backend = burn::backend::NdArray<f64>;

/// The T=4, batch=1, hidden=1 sequence from the QRNN write-up.
///
/// Returns `(gates, features, initial, dims)`.
#[must_use]
pub fn paper_example() -> (Vec<f32>, Vec<f32>, Vec<f32>, SeqDims) {
    (
        vec![0.25, 0.25, 0.5, 0.4],
        vec![0.75, 0.5, 0.9, 0.8],
        vec![0.0],
        SeqDims::new(4, 1, 1),
    )
}

/// Deterministic pseudo-random host inputs: gates in [0, 1), features and
/// initial state in [-1, 1).
#[must_use]
pub fn random_inputs(dims: SeqDims, seed: u64) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    let mut next = move || {
        // xorshift64*
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let bits = state.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 40;
        bits as f32 / (1u64 << 24) as f32
    };

    let gates = (0..dims.len()).map(|_| next()).collect();
    let features = (0..dims.len()).map(|_| next() * 2.0 - 1.0).collect();
    let initial = (0..dims.lanes()).map(|_| next() * 2.0 - 1.0).collect();
    (gates, features, initial)
}

/// Random gate/feature/initial tensors on `device`.
pub fn random_tensors<B: Backend>(
    dims: SeqDims,
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 3>, Tensor<B, 2>) {
    let gates = Tensor::random(dims.seq_shape(), Distribution::Uniform(0.0, 1.0), device);
    let features = Tensor::random(dims.seq_shape(), Distribution::Uniform(-1.0, 1.0), device);
    let initial = Tensor::random(dims.state_shape(), Distribution::Uniform(-1.0, 1.0), device);
    (gates, features, initial)
}

/// Read a tensor back as `f32`, regardless of backend element type.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec().unwrap()
}

/// Build a tensor from host data.
pub fn from_vec<B: Backend, const D: usize>(
    data: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(data, shape), device)
}

/// Upstream gradient of `sum(h^2)`.
#[must_use]
pub fn sum_of_squares_grad(output: &[f32]) -> Vec<f32> {
    output.iter().map(|h| 2.0 * h).collect()
}

/// Central finite-difference gradient of `loss` at `values`.
pub fn finite_difference(values: &[f32], eps: f32, loss: impl Fn(&[f32]) -> f64) -> Vec<f32> {
    let mut probe = values.to_vec();
    (0..values.len())
        .map(|i| {
            probe[i] = values[i] + eps;
            let plus = loss(&probe);
            probe[i] = values[i] - eps;
            let minus = loss(&probe);
            probe[i] = values[i];
            ((plus - minus) / (2.0 * f64::from(eps))) as f32
        })
        .collect()
}

/// Assert two f32 slices are close within relative and absolute tolerance.
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_data_close(a: &[f32], b: &[f32], rtol: f32, atol: f32, name: &str) {
    assert_eq!(
        a.len(),
        b.len(),
        "{name}: Data sizes don't match: {} vs {}",
        a.len(),
        b.len()
    );

    for (i, (&av, &bv)) in a.iter().zip(b.iter()).enumerate() {
        let tolerance = atol + rtol * bv.abs();
        let diff = (av - bv).abs();
        assert!(
            diff <= tolerance,
            "{name}: diff={diff:.6} exceeds tolerance={tolerance:.6} at idx {i}: tested={av:.6} ref={bv:.6}",
        );
    }
}
