use burn::{
    backend::NdArray,
    tensor::{Tensor, TensorData, TensorPrimitive, backend::Backend, ops::FloatTensor},
};

use crate::{
    error::SeqDims,
    forget_mult::{ForgetMultInputs, ForgetMultState},
    host,
    kernel::ForgetMultBackend,
};

fn read<B: Backend, const D: usize>(tensor: FloatTensor<B>) -> (Vec<f32>, [usize; D], B::Device) {
    let tensor = Tensor::<B, D>::from_primitive(TensorPrimitive::Float(tensor));
    let dims = tensor.dims();
    let device = tensor.device();
    let values = tensor.into_data().iter::<f32>().collect();
    (values, dims, device)
}

fn write<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> FloatTensor<B> {
    let data = TensorData::new(values, shape).convert::<B::FloatElem>();
    Tensor::<B, D>::from_data(data, device)
        .into_primitive()
        .tensor()
}

fn host_forward<B: Backend>(
    inputs: ForgetMultInputs<FloatTensor<B>>,
) -> (FloatTensor<B>, ForgetMultState<FloatTensor<B>>) {
    let (gates, shape, device) = read::<B, 3>(inputs.gates.clone());
    let (features, _, _) = read::<B, 3>(inputs.features.clone());
    let (initial, _, _) = read::<B, 2>(inputs.initial.clone());
    let [seq_len, batch, hidden] = shape;
    let dims = SeqDims::new(seq_len, batch, hidden);

    let mut output = vec![0.0; dims.len()];
    host::scan_forward(&gates, &features, &initial, &mut output, dims);
    let output = write::<B, 3>(output, shape, &device);

    let state = ForgetMultState {
        gates: inputs.gates,
        features: inputs.features,
        initial: inputs.initial,
        output: output.clone(),
    };
    (output, state)
}

fn host_backward<B: Backend>(
    state: ForgetMultState<FloatTensor<B>>,
    grad_output: FloatTensor<B>,
) -> ForgetMultInputs<FloatTensor<B>> {
    let (gates, shape, device) = read::<B, 3>(state.gates);
    let (features, _, _) = read::<B, 3>(state.features);
    let (initial, state_shape, _) = read::<B, 2>(state.initial);
    let (output, _, _) = read::<B, 3>(state.output);
    let (grad_output, _, _) = read::<B, 3>(grad_output);
    let [seq_len, batch, hidden] = shape;
    let dims = SeqDims::new(seq_len, batch, hidden);

    let mut grad_gates = vec![0.0; dims.len()];
    let mut grad_features = vec![0.0; dims.len()];
    let mut grad_initial = vec![0.0; dims.lanes()];
    host::scan_backward(
        &gates,
        &features,
        &initial,
        &output,
        &grad_output,
        &mut grad_gates,
        &mut grad_features,
        &mut grad_initial,
        dims,
    );

    ForgetMultInputs {
        gates: write::<B, 3>(grad_gates, shape, &device),
        features: write::<B, 3>(grad_features, shape, &device),
        initial: write::<B, 2>(grad_initial, state_shape, &device),
    }
}

/// The host engine serves as the fused path on the CPU backend.
impl ForgetMultBackend for NdArray<f32> {
    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>) {
        host_forward::<Self>(inputs)
    }

    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>> {
        host_backward::<Self>(state, grad_output)
    }
}

/// The host engine scans `f32` values, so it is not offered as the fused
/// path for `f64` tensors. Calling it directly still works, rounding through
/// `f32`.
impl ForgetMultBackend for NdArray<f64> {
    fn fused_available(_device: &Self::Device) -> bool {
        false
    }

    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>) {
        host_forward::<Self>(inputs)
    }

    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>> {
        host_backward::<Self>(state, grad_output)
    }
}
