use burn::tensor::{Tensor, TensorPrimitive, ops::FloatTensor};

use super::types::{ForgetMultInputs, ForgetMultState};
use crate::{
    error::{Result, SeqDims},
    kernel::ForgetMultBackend,
};

/// Validate operand shapes and report the sequence extent.
pub fn check_operands<B: burn::tensor::backend::Backend>(
    gates: &Tensor<B, 3>,
    features: &Tensor<B, 3>,
    initial: Option<&Tensor<B, 2>>,
) -> Result<SeqDims> {
    SeqDims::from_shapes(gates.dims(), features.dims(), initial.map(Tensor::dims))
}

fn float<B: ForgetMultBackend, const D: usize>(tensor: FloatTensor<B>) -> Tensor<B, D> {
    Tensor::from_primitive(TensorPrimitive::Float(tensor))
}

/// Saved forward state, consumed by [`backward`].
#[derive(Debug)]
pub struct ForgetMultContext<B: ForgetMultBackend> {
    dims: SeqDims,
    has_initial_state: bool,
    state: ForgetMultState<FloatTensor<B>>,
}

impl<B: ForgetMultBackend> ForgetMultContext<B> {
    #[must_use]
    pub fn dims(&self) -> SeqDims {
        self.dims
    }

    #[must_use]
    pub fn has_initial_state(&self) -> bool {
        self.has_initial_state
    }

    /// Hidden states `H[0..=T]` as a `[T + 1, B, H]` tensor.
    #[must_use]
    pub fn history(&self) -> Tensor<B, 3> {
        let initial: Tensor<B, 2> = float(self.state.initial.clone());
        let output: Tensor<B, 3> = float(self.state.output.clone());
        Tensor::cat(vec![initial.unsqueeze_dim(0), output], 0)
    }
}

/// Gradients produced by [`backward`].
#[derive(Debug, Clone)]
pub struct ForgetMultGrads<B: ForgetMultBackend> {
    pub gates: Tensor<B, 3>,
    pub features: Tensor<B, 3>,
    /// Present only when forward received an initial state.
    pub initial: Option<Tensor<B, 2>>,
}

/// Fused forward pass returning `H[1..=T]` and the context for [`backward`].
///
/// A missing `initial` state is treated as zeros. For `T = 0` nothing is
/// launched and the empty output is not attached to the autodiff graph.
pub fn forward<B: ForgetMultBackend>(
    gates: Tensor<B, 3>,
    features: Tensor<B, 3>,
    initial: Option<Tensor<B, 2>>,
) -> Result<(Tensor<B, 3>, ForgetMultContext<B>)> {
    let dims = check_operands(&gates, &features, initial.as_ref())?;
    let has_initial_state = initial.is_some();
    let device = gates.device();
    let initial = initial.unwrap_or_else(|| Tensor::zeros(dims.state_shape(), &device));

    let inputs = ForgetMultInputs {
        gates: gates.into_primitive().tensor(),
        features: features.into_primitive().tensor(),
        initial: initial.into_primitive().tensor(),
    };

    let (output, state) = if dims.is_empty() {
        // Nothing to scan; skip the launch and keep the operands as state.
        let output = Tensor::<B, 3>::zeros(dims.seq_shape(), &device)
            .into_primitive()
            .tensor();
        let state = ForgetMultState {
            gates: inputs.gates,
            features: inputs.features,
            initial: inputs.initial,
            output: output.clone(),
        };
        (output, state)
    } else {
        B::forget_mult_forward(inputs)
    };

    let context = ForgetMultContext {
        dims,
        has_initial_state,
        state,
    };
    Ok((float(output), context))
}

/// Backward pass for a context produced by [`forward`].
pub fn backward<B: ForgetMultBackend>(
    context: ForgetMultContext<B>,
    grad_output: Tensor<B, 3>,
) -> Result<ForgetMultGrads<B>> {
    let dims = context.dims;
    dims.check_grad(grad_output.dims())?;

    let grads = if dims.is_empty() {
        let device = grad_output.device();
        ForgetMultInputs {
            gates: Tensor::<B, 3>::zeros(dims.seq_shape(), &device)
                .into_primitive()
                .tensor(),
            features: Tensor::<B, 3>::zeros(dims.seq_shape(), &device)
                .into_primitive()
                .tensor(),
            initial: Tensor::<B, 2>::zeros(dims.state_shape(), &device)
                .into_primitive()
                .tensor(),
        }
    } else {
        B::forget_mult_backward(context.state, grad_output.into_primitive().tensor())
    };

    Ok(ForgetMultGrads {
        gates: float(grads.gates),
        features: float(grads.features),
        initial: context.has_initial_state.then(|| float(grads.initial)),
    })
}

/// Fused forget-mult for use inside an autodiff graph.
///
/// `H[t] = F[t] * X[t] + (1 - F[t]) * H[t-1]` over `[T, B, H]` gates and
/// features, with `H[0] = initial` or zeros. Gradients reach whichever
/// operands are tracked.
///
/// An empty sequence (`T = 0`) yields an untracked `[0, B, H]` output, so
/// autodiff reports no gradient for the operands rather than zeros; use
/// [`forward`] and [`backward`] to get the zero `dH0`.
pub fn forget_mult<B: ForgetMultBackend>(
    gates: Tensor<B, 3>,
    features: Tensor<B, 3>,
    initial: Option<Tensor<B, 2>>,
) -> Result<Tensor<B, 3>> {
    forward(gates, features, initial).map(|(output, _context)| output)
}
