//! Picks between the fused engine and the per-timestep reference.

use burn::tensor::Tensor;
use qrnn_config::{ExecutionMode, ForgetMultConfig};
use tracing::debug;

use crate::{
    error::{ForgetMultError, Result, SeqDims},
    forget_mult::{self, check_operands},
    kernel::ForgetMultBackend,
    reference,
};

/// Forget-mult front end configured with an [`ExecutionMode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForgetMult {
    config: ForgetMultConfig,
}

impl ForgetMult {
    #[must_use]
    pub fn new(config: ForgetMultConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    /// Run the recurrence on whichever path the mode allows.
    ///
    /// All operands must share a device. In [`ExecutionMode::Fused`] the
    /// backend must also support the fused kernel on that device; there is no
    /// silent fallback in that mode.
    pub fn forward<B: ForgetMultBackend>(
        &self,
        gates: Tensor<B, 3>,
        features: Tensor<B, 3>,
        initial: Option<Tensor<B, 2>>,
    ) -> Result<Tensor<B, 3>> {
        let dims = check_operands(&gates, &features, initial.as_ref())?;
        let device = gates.device();

        if features.device() != device {
            return Err(ForgetMultError::Placement(format!(
                "features on {:?}, gates on {device:?}",
                features.device()
            )));
        }
        if let Some(initial) = &initial
            && initial.device() != device
        {
            return Err(ForgetMultError::Placement(format!(
                "initial state on {:?}, gates on {device:?}",
                initial.device()
            )));
        }

        let available = B::fused_available(&device);
        if self.config.mode == ExecutionMode::Fused && !available {
            return Err(ForgetMultError::Placement(format!(
                "fused forget-mult is not available on {device:?}"
            )));
        }
        let fused = self.config.mode.allows_fused() && available;

        log_choice(self.config.mode, fused, dims);
        if fused {
            forget_mult::forget_mult(gates, features, initial)
        } else {
            reference::forget_mult(gates, features, initial)
        }
    }
}

fn log_choice(mode: ExecutionMode, fused: bool, dims: SeqDims) {
    debug!(
        %mode,
        path = if fused { "fused" } else { "reference" },
        seq_len = dims.seq_len,
        batch = dims.batch,
        hidden = dims.hidden,
        "forget-mult dispatch"
    );
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::test_utils::{
        CpuAutodiffBackend, CpuBackend, CpuF64Backend, assert_data_close, random_tensors,
        to_vec,
    };

    #[test_case(ExecutionMode::Auto ; "auto")]
    #[test_case(ExecutionMode::Fused ; "fused")]
    #[test_case(ExecutionMode::Reference ; "reference")]
    fn test_modes_agree(mode: ExecutionMode) {
        let device = Default::default();
        let dims = SeqDims::new(7, 2, 5);
        let (gates, features, initial) = random_tensors::<CpuBackend>(dims, &device);

        let expected = reference::forget_mult(
            gates.clone(),
            features.clone(),
            Some(initial.clone()),
        )
        .unwrap();
        let output = ForgetMult::new(ForgetMultConfig::new(mode))
            .forward(gates, features, Some(initial))
            .unwrap();

        assert_data_close(&to_vec(output), &to_vec(expected), 1e-4, 1e-6, "selector");
    }

    #[test]
    fn test_selector_reports_shape_errors() {
        let device = Default::default();
        let gates = Tensor::<CpuBackend, 3>::zeros([4, 2, 3], &device);
        let features = Tensor::<CpuBackend, 3>::zeros([4, 2, 3], &device);
        let initial = Tensor::<CpuBackend, 2>::zeros([3, 2], &device);

        let err = ForgetMult::default()
            .forward(gates, features, Some(initial))
            .unwrap_err();
        assert!(matches!(err, ForgetMultError::Shape(_)), "{err}");
    }

    #[test]
    fn test_selector_through_autodiff() {
        let device = Default::default();
        let dims = SeqDims::new(5, 1, 3);
        let (gates, features, _) = random_tensors::<CpuAutodiffBackend>(dims, &device);
        let gates = gates.require_grad();

        let output = ForgetMult::new(ForgetMultConfig::new(ExecutionMode::Fused))
            .forward(gates.clone(), features, None)
            .unwrap();
        let grads = output.sum().backward();

        let grad = gates.grad(&grads).expect("gates gradient");
        assert_eq!(grad.dims(), dims.seq_shape());
    }

    #[test]
    fn test_fused_mode_without_support_is_a_placement_error() {
        let device = Default::default();
        let dims = SeqDims::new(4, 2, 3);
        let (gates, features, initial) = random_tensors::<CpuF64Backend>(dims, &device);
        assert!(!CpuF64Backend::fused_available(&device));

        let err = ForgetMult::new(ForgetMultConfig::new(ExecutionMode::Fused))
            .forward(gates, features, Some(initial))
            .unwrap_err();
        assert!(matches!(err, ForgetMultError::Placement(_)), "{err}");
    }

    #[test_case(ExecutionMode::Auto ; "auto")]
    #[test_case(ExecutionMode::Reference ; "reference")]
    fn test_falls_back_to_reference_without_support(mode: ExecutionMode) {
        let device = Default::default();
        let dims = SeqDims::new(6, 2, 3);
        let (gates, features, initial) = random_tensors::<CpuF64Backend>(dims, &device);

        let expected = reference::forget_mult(
            gates.clone(),
            features.clone(),
            Some(initial.clone()),
        )
        .unwrap();
        let output = ForgetMult::new(ForgetMultConfig::new(mode))
            .forward(gates, features, Some(initial))
            .unwrap();

        // Same op sequence in f64, so no rounding through the f32 host engine.
        assert_eq!(to_vec(output), to_vec(expected));
    }
}
