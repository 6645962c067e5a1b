use burn::{
    backend::ir::{InitOperationIr, OperationIr},
    tensor::ops::FloatTensor,
};
use burn_backend::TensorMetadata;
use burn_fusion::{
    Fusion, FusionBackend, NoOp, client::GlobalFusionClient, stream::OperationStreams,
};

use crate::{
    forget_mult::{ForgetMultInputs, ForgetMultState},
    kernel::ForgetMultBackend,
};

/// Flush pending fused ops and take the concrete tensor.
fn resolve<B: FusionBackend>(tensor: FloatTensor<Fusion<B>>) -> FloatTensor<B> {
    tensor.client.clone().resolve_tensor_float::<B>(tensor)
}

/// Register a concrete tensor with the fusion client as an init op.
fn register<B: FusionBackend>(
    tensor: FloatTensor<B>,
    client: &GlobalFusionClient<B::FusionRuntime>,
) -> FloatTensor<Fusion<B>> {
    let shape = tensor.shape();
    let dtype = tensor.dtype();
    let handle = B::float_tensor_handle(tensor);
    let desc = InitOperationIr::create(shape, dtype, || client.register_tensor_handle(handle));

    let mut registered = client.register(
        OperationStreams::default(),
        OperationIr::Init(desc),
        NoOp::<B>::new(),
    );

    assert_eq!(registered.len(), 1, "init op registers exactly one tensor");
    registered.remove(0)
}

impl<B> ForgetMultBackend for Fusion<B>
where
    B: ForgetMultBackend + FusionBackend,
{
    fn fused_available(device: &Self::Device) -> bool {
        B::fused_available(device)
    }

    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>) {
        let client = inputs.gates.client.clone();
        let (output, state) = B::forget_mult_forward(inputs.map(resolve::<B>));
        (
            register::<B>(output, &client),
            state.map(|t| register::<B>(t, &client)),
        )
    }

    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>> {
        let client = state.gates.client.clone();
        let grads = B::forget_mult_backward(state.map(resolve::<B>), resolve::<B>(grad_output));
        grads.map(|t| register::<B>(t, &client))
    }
}
