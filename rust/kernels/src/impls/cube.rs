use burn::tensor::ops::FloatTensor;
use burn_cubecl::{BoolElement, CubeBackend, CubeRuntime, FloatElement, IntElement};

use crate::{
    forget_mult::{ForgetMultInputs, ForgetMultState, launch},
    kernel::ForgetMultBackend,
};

impl<R, F, I, BT> ForgetMultBackend for CubeBackend<R, F, I, BT>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>) {
        launch::forward::<R, F>(inputs)
    }

    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>> {
        launch::backward::<R, F>(state, grad_output)
    }
}
