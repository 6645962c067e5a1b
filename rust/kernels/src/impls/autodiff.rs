use burn::{
    backend::autodiff::{
        Autodiff,
        checkpoint::{base::Checkpointer, strategy::CheckpointStrategy},
        grads::Gradients,
        ops::{Backward, Ops, OpsKind},
    },
    tensor::ops::FloatTensor,
};

use crate::{
    forget_mult::{ForgetMultInputs, ForgetMultState},
    kernel::ForgetMultBackend,
};

/// No-op backward used to wrap primitives into untracked autodiff tensors.
/// With 0 parents, `prepare([])` always yields `UnTracked`.
#[derive(Debug)]
struct Untracked;

impl<B: burn::tensor::backend::Backend> Backward<B, 0> for Untracked {
    type State = ();

    fn backward(self, _ops: Ops<(), 0>, _grads: &mut Gradients, _checkpointer: &mut Checkpointer) {}
}

fn untracked<B: ForgetMultBackend, C: CheckpointStrategy>(
    primitive: FloatTensor<B>,
) -> FloatTensor<Autodiff<B, C>> {
    match Untracked.prepare::<C>([]).compute_bound().stateful() {
        OpsKind::UnTracked(prep) => prep.finish(primitive),
        OpsKind::Tracked(_) => unreachable!("0 parents always yields UnTracked"),
    }
}

/// Graph node for one forget-mult call. Parents are `[gates, features, initial]`.
#[derive(Debug)]
struct ForgetMultBackward;

impl<B: ForgetMultBackend> Backward<B, 3> for ForgetMultBackward {
    type State = ForgetMultState<FloatTensor<B>>;

    fn backward(
        self,
        ops: Ops<Self::State, 3>,
        grads: &mut Gradients,
        _checkpointer: &mut Checkpointer,
    ) {
        let grad_output = grads.consume::<B>(&ops.node);
        let [node_gates, node_features, node_initial] = ops.parents;

        let grad_inputs = B::forget_mult_backward(ops.state, grad_output);

        if let Some(node) = node_gates {
            grads.register::<B>(node.id, grad_inputs.gates);
        }
        if let Some(node) = node_features {
            grads.register::<B>(node.id, grad_inputs.features);
        }
        // An initial state created with `zeros` is untracked, so no gradient
        // is produced for it.
        if let Some(node) = node_initial {
            grads.register::<B>(node.id, grad_inputs.initial);
        }
    }
}

impl<B, C> ForgetMultBackend for Autodiff<B, C>
where
    B: ForgetMultBackend,
    C: CheckpointStrategy,
{
    fn fused_available(device: &Self::Device) -> bool {
        B::fused_available(device)
    }

    fn forget_mult_forward(
        inputs: ForgetMultInputs<FloatTensor<Self>>,
    ) -> (FloatTensor<Self>, ForgetMultState<FloatTensor<Self>>) {
        let parents = inputs.clone().map(|t| t.node).into_array();
        let (output, state) = B::forget_mult_forward(inputs.map(|t| t.primitive));
        let saved = state.clone().map(untracked::<B, C>);

        let output = match ForgetMultBackward
            .prepare::<C>(parents)
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(prep) => prep.finish(state, output),
            OpsKind::UnTracked(prep) => prep.finish(output),
        };

        (output, saved)
    }

    /// Runs the inner backward on the primitives; the resulting gradients are
    /// not tracked, so higher-order gradients do not flow through them.
    fn forget_mult_backward(
        state: ForgetMultState<FloatTensor<Self>>,
        grad_output: FloatTensor<Self>,
    ) -> ForgetMultInputs<FloatTensor<Self>> {
        B::forget_mult_backward(state.map(|t| t.primitive), grad_output.primitive)
            .map(untracked::<B, C>)
    }
}
