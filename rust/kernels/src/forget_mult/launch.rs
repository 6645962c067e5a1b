use burn_backend::Shape;
use burn_cubecl::{
    CubeRuntime, FloatElement, kernel::into_contiguous, ops::numeric::empty_device,
    tensor::CubeTensor,
};
use tracing::trace;

use super::{
    kernel::{launch_forget_mult_backward, launch_forget_mult_forward},
    types::{ForgetMultInputs, ForgetMultState},
};

fn empty_like<R: CubeRuntime, F: FloatElement>(template: &CubeTensor<R>) -> CubeTensor<R> {
    empty_device::<R, F>(
        template.client.clone(),
        template.device.clone(),
        template.shape.clone(),
    )
}

fn lane_count(shape: &Shape) -> usize {
    shape.dims[1..].iter().product()
}

/// Forward scan on cube tensors. Inputs are made contiguous first, so the
/// saved state is too.
pub fn forward<R: CubeRuntime, F: FloatElement>(
    inputs: ForgetMultInputs<CubeTensor<R>>,
) -> (CubeTensor<R>, ForgetMultState<CubeTensor<R>>) {
    let inputs = inputs.map(into_contiguous);
    let output = empty_like::<R, F>(&inputs.gates);

    trace!(
        shape = ?inputs.gates.shape.dims,
        lanes = lane_count(&inputs.gates.shape),
        "launching forget-mult forward"
    );
    launch_forget_mult_forward::<R, F>(
        &inputs.gates.client,
        inputs.gates.as_handle_ref(),
        inputs.features.as_handle_ref(),
        inputs.initial.as_handle_ref(),
        output.as_handle_ref(),
    );

    let state = ForgetMultState {
        gates: inputs.gates,
        features: inputs.features,
        initial: inputs.initial,
        output: output.clone(),
    };
    (output, state)
}

/// Backward scan on cube tensors saved by [`forward`].
pub fn backward<R: CubeRuntime, F: FloatElement>(
    state: ForgetMultState<CubeTensor<R>>,
    grad_output: CubeTensor<R>,
) -> ForgetMultInputs<CubeTensor<R>> {
    let state = state.map(into_contiguous);
    let grad_output = into_contiguous(grad_output);

    let grad_gates = empty_like::<R, F>(&state.gates);
    let grad_features = empty_like::<R, F>(&state.features);
    let grad_initial = empty_like::<R, F>(&state.initial);

    trace!(
        shape = ?state.gates.shape.dims,
        lanes = lane_count(&state.gates.shape),
        "launching forget-mult backward"
    );
    launch_forget_mult_backward::<R, F>(
        &state.gates.client,
        state.gates.as_handle_ref(),
        state.features.as_handle_ref(),
        state.initial.as_handle_ref(),
        state.output.as_handle_ref(),
        grad_output.as_handle_ref(),
        grad_gates.as_handle_ref(),
        grad_features.as_handle_ref(),
        grad_initial.as_handle_ref(),
    );

    ForgetMultInputs {
        gates: grad_gates,
        features: grad_features,
        initial: grad_initial,
    }
}
