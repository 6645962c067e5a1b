//! Sequential per-timestep forget-mult built from plain tensor ops.
//!
//! Runs on any backend and gets its gradient from burn's autodiff. This is
//! the CPU fallback of the selector and the oracle the fused engines are
//! tested against.

use burn::tensor::{Tensor, backend::Backend};

use crate::{error::Result, forget_mult::check_operands};

/// `H[t] = F[t] * X[t] + (1 - F[t]) * H[t-1]`, one tensor op chain per step.
///
/// Without an initial state the first step is just `F[0] * X[0]`.
pub fn forget_mult<B: Backend>(
    gates: Tensor<B, 3>,
    features: Tensor<B, 3>,
    initial: Option<Tensor<B, 2>>,
) -> Result<Tensor<B, 3>> {
    let dims = check_operands(&gates, &features, initial.as_ref())?;
    let [batch, hidden] = dims.state_shape();

    if dims.seq_len == 0 {
        return Ok(Tensor::zeros(dims.seq_shape(), &gates.device()));
    }

    let weighted = gates.clone() * features;
    let mut prev = initial;
    let mut steps = Vec::with_capacity(dims.seq_len);

    for t in 0..dims.seq_len {
        let mut h: Tensor<B, 2> = weighted.clone().slice([t..t + 1]).reshape([batch, hidden]);
        if let Some(prev) = prev {
            let gate: Tensor<B, 2> = gates.clone().slice([t..t + 1]).reshape([batch, hidden]);
            h = h + gate.neg().add_scalar(1.0) * prev;
        }
        steps.push(h.clone());
        prev = Some(h);
    }

    Ok(Tensor::stack(steps, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ForgetMultError,
        test_utils::{CpuBackend, assert_data_close, from_vec, paper_example, to_vec},
    };

    #[test]
    fn test_reference_paper_example() {
        let device = Default::default();
        let (gates, features, initial, dims) = paper_example();
        let output = forget_mult::<CpuBackend>(
            from_vec(gates, dims.seq_shape(), &device),
            from_vec(features, dims.seq_shape(), &device),
            Some(from_vec(initial, dims.state_shape(), &device)),
        )
        .unwrap();

        assert_eq!(output.dims(), [4, 1, 1]);
        assert_data_close(
            &to_vec(output),
            &[0.1875, 0.265_625, 0.582_812_5, 0.669_687_5],
            0.0,
            1e-6,
            "reference_paper",
        );
    }

    #[test]
    fn test_reference_rejects_mismatched_shapes() {
        let device = Default::default();
        let gates = Tensor::<CpuBackend, 3>::zeros([3, 2, 4], &device);
        let features = Tensor::<CpuBackend, 3>::zeros([3, 2, 5], &device);
        let err = forget_mult(gates, features, None).unwrap_err();
        assert!(matches!(err, ForgetMultError::Shape(_)));
    }
}
