//! Backend capability for the fused forget-mult recurrence.
//!
//! [`ForgetMultBackend`] is the boundary between burn and the fused engines.
//! At the boundary, wrapper tensors are stripped down to the inner backend's
//! primitives, the lane-parallel kernel runs, and the results are rewrapped.
//! The `impls` module provides the implementations:
//!
//! - `CubeBackend<R, ..>`: launches the cubecl kernels, one unit per lane
//! - `NdArray<f32>`: runs the rayon host engine
//! - `NdArray<f64>`: same engine, but reports no fused support
//! - `Fusion<B>`: resolves fusion tensors and re-registers the outputs
//! - `Autodiff<B, C>`: registers a backward op on the graph
//!
//! Operands reaching this trait are already validated; shape errors are
//! reported by the public API in [`crate::forget_mult`].

use burn::tensor::{backend::Backend, ops::FloatTensor};

use crate::forget_mult::{ForgetMultInputs, ForgetMultState};

/// Backends that can run the fused forget-mult forward and backward scans.
pub trait ForgetMultBackend: Backend {
    /// Whether the fused kernel can run on `device`.
    fn fused_available(_device: &Self::Device) -> bool {
        true
    }

    /// Compute `H[1..=T]` for `[T, B, H]` gates/features and a `[B, H]`
    /// initial state, returning it with the state backward needs.
    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>);

    /// Adjoint scan: gradients of gates, features and initial state given the
    /// upstream gradient of `H[1..=T]`.
    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>>;
}
