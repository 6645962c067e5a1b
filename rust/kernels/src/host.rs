//! Lane-parallel forget-mult engine on host slices.
//!
//! All sequences are time-major, lane-minor `[seq_len, batch, hidden]` buffers
//! (see [`SeqDims`]). Each lane is scanned by its own rayon task into a
//! lane-owned chunk of a lane-major scratch buffer, then time rows are
//! transposed back in parallel. Lanes never share writes.

use rayon::prelude::*;
use tracing::trace;

use crate::error::{ForgetMultError, Result, SeqDims};

/// Everything backward needs from a forward pass.
///
/// `initial` together with `output` is the full history `H[0..=T]`.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    dims: SeqDims,
    gates: Vec<f32>,
    features: Vec<f32>,
    initial: Vec<f32>,
    output: Vec<f32>,
    has_initial_state: bool,
}

impl ForwardContext {
    #[must_use]
    pub fn dims(&self) -> SeqDims {
        self.dims
    }

    #[must_use]
    pub fn has_initial_state(&self) -> bool {
        self.has_initial_state
    }

    /// Hidden states `H[0..=T]`, `(seq_len + 1) * lanes` elements.
    #[must_use]
    pub fn history(&self) -> Vec<f32> {
        let mut history = Vec::with_capacity(self.initial.len() + self.output.len());
        history.extend_from_slice(&self.initial);
        history.extend_from_slice(&self.output);
        history
    }
}

/// Gradients of a host backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HostGradients {
    pub gates: Vec<f32>,
    pub features: Vec<f32>,
    /// Present only when forward received an initial state.
    pub initial: Option<Vec<f32>>,
}

fn check_len(name: &str, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(ForgetMultError::Shape(format!(
            "{name} has {got} elements, expected {expected}"
        )))
    }
}

/// Run the forward recurrence, returning `H[1..=T]` and the context for
/// [`backward`].
pub fn forward(
    gates: &[f32],
    features: &[f32],
    initial: Option<&[f32]>,
    dims: SeqDims,
) -> Result<(Vec<f32>, ForwardContext)> {
    check_len("gates", gates.len(), dims.len())?;
    check_len("features", features.len(), dims.len())?;
    if let Some(initial) = initial {
        check_len("initial state", initial.len(), dims.lanes())?;
    }

    let has_initial_state = initial.is_some();
    let initial = initial.map_or_else(|| vec![0.0; dims.lanes()], <[f32]>::to_vec);
    let mut output = vec![0.0; dims.len()];
    scan_forward(gates, features, &initial, &mut output, dims);

    let context = ForwardContext {
        dims,
        gates: gates.to_vec(),
        features: features.to_vec(),
        initial,
        output: output.clone(),
        has_initial_state,
    };
    Ok((output, context))
}

/// Run the adjoint scan for a context produced by [`forward`].
pub fn backward(context: ForwardContext, grad_output: &[f32]) -> Result<HostGradients> {
    let dims = context.dims;
    if grad_output.len() != dims.len() {
        return Err(ForgetMultError::StateConsistency(format!(
            "upstream gradient has {} elements, forward produced {}",
            grad_output.len(),
            dims.len()
        )));
    }

    let mut grad_gates = vec![0.0; dims.len()];
    let mut grad_features = vec![0.0; dims.len()];
    let mut grad_initial = vec![0.0; dims.lanes()];
    scan_backward(
        &context.gates,
        &context.features,
        &context.initial,
        &context.output,
        grad_output,
        &mut grad_gates,
        &mut grad_features,
        &mut grad_initial,
        dims,
    );

    Ok(HostGradients {
        gates: grad_gates,
        features: grad_features,
        initial: context.has_initial_state.then_some(grad_initial),
    })
}

/// Scatter a lane-major `[lanes, seq_len]` buffer into time-major `out`.
fn lanes_to_time_major(lane_major: &[f32], out: &mut [f32], dims: SeqDims) {
    let seq_len = dims.seq_len;
    out.par_chunks_mut(dims.lanes())
        .enumerate()
        .for_each(|(t, row)| {
            for (lane, value) in row.iter_mut().enumerate() {
                *value = lane_major[lane * seq_len + t];
            }
        });
}

/// Forward scan over pre-validated buffers.
///
/// `initial` is `H[0]` (`lanes` elements), `output` receives `H[1..=T]`.
pub fn scan_forward(
    gates: &[f32],
    features: &[f32],
    initial: &[f32],
    output: &mut [f32],
    dims: SeqDims,
) {
    debug_assert_eq!(gates.len(), dims.len());
    debug_assert_eq!(features.len(), dims.len());
    debug_assert_eq!(initial.len(), dims.lanes());
    debug_assert_eq!(output.len(), dims.len());

    if dims.is_empty() {
        return;
    }
    trace!(?dims, "host forget-mult forward");

    let lanes = dims.lanes();
    let mut lane_major = vec![0.0; dims.len()];
    lane_major
        .par_chunks_mut(dims.seq_len)
        .enumerate()
        .for_each(|(lane, column)| {
            let mut prev = initial[lane];
            for (t, h) in column.iter_mut().enumerate() {
                let i = t * lanes + lane;
                let f = gates[i];
                prev = f * features[i] + (1.0 - f) * prev;
                *h = prev;
            }
        });

    lanes_to_time_major(&lane_major, output, dims);
}

/// Backward scan over pre-validated buffers.
///
/// `initial` and `output` are the forward history; `grad_initial` always
/// receives the accumulator left after `t = 1`. The accumulator is carried
/// in `f64` and only rounded when written out.
pub fn scan_backward(
    gates: &[f32],
    features: &[f32],
    initial: &[f32],
    output: &[f32],
    grad_output: &[f32],
    grad_gates: &mut [f32],
    grad_features: &mut [f32],
    grad_initial: &mut [f32],
    dims: SeqDims,
) {
    debug_assert_eq!(grad_output.len(), dims.len());
    debug_assert_eq!(grad_gates.len(), dims.len());
    debug_assert_eq!(grad_features.len(), dims.len());
    debug_assert_eq!(grad_initial.len(), dims.lanes());

    if dims.seq_len == 0 {
        grad_initial.fill(0.0);
        return;
    }
    if dims.lanes() == 0 {
        return;
    }
    trace!(?dims, "host forget-mult backward");

    let lanes = dims.lanes();
    let seq_len = dims.seq_len;
    let mut grad_gates_lane_major = vec![0.0; dims.len()];
    let mut grad_features_lane_major = vec![0.0; dims.len()];

    grad_gates_lane_major
        .par_chunks_mut(seq_len)
        .zip(grad_features_lane_major.par_chunks_mut(seq_len))
        .zip(grad_initial.par_iter_mut())
        .enumerate()
        .for_each(|(lane, ((grad_f, grad_x), grad_h0))| {
            let mut acc = 0.0f64;
            for t in (0..seq_len).rev() {
                let i = t * lanes + lane;
                let prev = if t == 0 { initial[lane] } else { output[i - lanes] };
                let f = f64::from(gates[i]);
                acc += f64::from(grad_output[i]);
                grad_x[t] = (f * acc) as f32;
                grad_f[t] = (f64::from(features[i] - prev) * acc) as f32;
                acc -= f * acc;
            }
            *grad_h0 = acc as f32;
        });

    lanes_to_time_major(&grad_gates_lane_major, grad_gates, dims);
    lanes_to_time_major(&grad_features_lane_major, grad_features, dims);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        assert_data_close, finite_difference, paper_example, random_inputs, sum_of_squares_grad,
    };

    #[test]
    fn test_paper_example_forward() {
        let (gates, features, initial, dims) = paper_example();
        let (output, _) = forward(&gates, &features, Some(&initial), dims).unwrap();
        assert_data_close(
            &output,
            &[0.1875, 0.265_625, 0.582_812_5, 0.669_687_5],
            0.0,
            1e-6,
            "paper_forward",
        );
    }

    #[test]
    fn test_paper_example_backward() {
        let (gates, features, initial, dims) = paper_example();
        let (_, context) = forward(&gates, &features, Some(&initial), dims).unwrap();
        let grads = backward(context, &[1.0; 4]).unwrap();

        assert_data_close(
            &grads.features,
            &[0.5875, 0.45, 0.8, 0.4],
            0.0,
            1e-6,
            "paper_grad_features",
        );
        assert_data_close(
            &grads.gates,
            &[1.7625, 0.5625, 1.015, 0.217_187_5],
            0.0,
            1e-6,
            "paper_grad_gates",
        );
        assert_data_close(
            &grads.initial.unwrap(),
            &[1.7625],
            0.0,
            1e-6,
            "paper_grad_initial",
        );
    }

    #[test]
    fn test_recurrence_identity() {
        let dims = SeqDims::new(7, 3, 5);
        let (gates, features, initial) = random_inputs(dims, 11);
        let (output, context) = forward(&gates, &features, Some(&initial), dims).unwrap();
        let history = context.history();

        for t in 0..dims.seq_len {
            for lane in 0..dims.lanes() {
                let i = dims.index(t, lane);
                let expected = gates[i] * features[i] + (1.0 - gates[i]) * history[i];
                assert_eq!(output[i], expected, "t={t} lane={lane}");
                assert_eq!(history[i + dims.lanes()], output[i]);
            }
        }
    }

    #[test]
    fn test_zero_gates_freeze_state() {
        let dims = SeqDims::new(5, 2, 3);
        let (_, features, initial) = random_inputs(dims, 3);
        let gates = vec![0.0; dims.len()];
        let (output, _) = forward(&gates, &features, Some(&initial), dims).unwrap();
        for t in 0..dims.seq_len {
            assert_eq!(&output[t * dims.lanes()..(t + 1) * dims.lanes()], &initial[..]);
        }
    }

    #[test]
    fn test_unit_gates_copy_features() {
        let dims = SeqDims::new(5, 2, 3);
        let (_, features, initial) = random_inputs(dims, 4);
        let gates = vec![1.0; dims.len()];
        let (output, _) = forward(&gates, &features, Some(&initial), dims).unwrap();
        assert_eq!(output, features);
    }

    #[test]
    fn test_missing_initial_state_is_zero() {
        let dims = SeqDims::new(4, 2, 2);
        let (gates, features, _) = random_inputs(dims, 5);
        let zeros = vec![0.0; dims.lanes()];
        let (implicit, context) = forward(&gates, &features, None, dims).unwrap();
        let (explicit, _) = forward(&gates, &features, Some(&zeros), dims).unwrap();
        assert_eq!(implicit, explicit);

        let grads = backward(context, &vec![1.0; dims.len()]).unwrap();
        assert!(grads.initial.is_none());
    }

    #[test]
    fn test_empty_sequence() {
        let dims = SeqDims::new(0, 2, 3);
        let initial = vec![0.5; dims.lanes()];
        let (output, context) = forward(&[], &[], Some(&initial), dims).unwrap();
        assert!(output.is_empty());
        assert_eq!(context.history(), initial);

        let grads = backward(context, &[]).unwrap();
        assert!(grads.gates.is_empty());
        assert!(grads.features.is_empty());
        assert_eq!(grads.initial.unwrap(), vec![0.0; dims.lanes()]);
    }

    #[test]
    fn test_gates_outside_unit_interval_are_not_clamped() {
        let dims = SeqDims::new(2, 1, 1);
        let (output, _) = forward(&[2.0, -1.0], &[1.0, 1.0], Some(&[1.0]), dims).unwrap();
        // h1 = 2*1 + (1-2)*1 = 1, h2 = -1*1 + 2*1 = 1
        assert_eq!(output, vec![1.0, 1.0]);
        let (output, _) = forward(&[2.0, -1.0], &[3.0, 0.0], Some(&[0.0]), dims).unwrap();
        assert_eq!(output, vec![6.0, 12.0]);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let dims = SeqDims::new(3, 2, 3);
        let (gates, features, initial) = random_inputs(dims, 42);

        let loss = |g: &[f32], x: &[f32], h0: &[f32]| -> f64 {
            let (output, _) = forward(g, x, Some(h0), dims).unwrap();
            output.iter().map(|&h| f64::from(h) * f64::from(h)).sum()
        };

        let (output, context) = forward(&gates, &features, Some(&initial), dims).unwrap();
        let grads = backward(context, &sum_of_squares_grad(&output)).unwrap();

        let numeric_gates =
            finite_difference(&gates, 1e-3, |g| loss(g, &features, &initial));
        let numeric_features =
            finite_difference(&features, 1e-3, |x| loss(&gates, x, &initial));
        let numeric_initial =
            finite_difference(&initial, 1e-3, |h0| loss(&gates, &features, h0));

        assert_data_close(&grads.gates, &numeric_gates, 1e-2, 1e-2, "fd_gates");
        assert_data_close(&grads.features, &numeric_features, 1e-2, 1e-2, "fd_features");
        assert_data_close(
            &grads.initial.unwrap(),
            &numeric_initial,
            1e-2,
            1e-2,
            "fd_initial",
        );
    }

    #[test]
    fn test_long_sequence_initial_grad_matches_f64_scan() {
        let dims = SeqDims::new(200_000, 1, 1);
        let gates: Vec<f32> = (0..dims.seq_len)
            .map(|t| if t % 3 == 0 { 1e-4 } else { 1e-6 })
            .collect();
        let features = vec![0.5; dims.len()];
        let grad_output: Vec<f32> = (0..dims.seq_len)
            .map(|t| 1.0 + (t % 7) as f32 * 0.125)
            .collect();

        let (_, context) = forward(&gates, &features, Some(&[0.25]), dims).unwrap();
        let grads = backward(context, &grad_output).unwrap();

        let mut expected = 0.0f64;
        for t in (0..dims.seq_len).rev() {
            let f = f64::from(gates[t]);
            expected += f64::from(grad_output[t]);
            expected -= f * expected;
        }

        let got = f64::from(grads.initial.unwrap()[0]);
        let rel = (got - expected).abs() / expected.abs();
        assert!(rel < 1e-6, "dH0={got} f64={expected} rel={rel:e}");
    }

    #[test]
    fn test_length_errors() {
        let dims = SeqDims::new(2, 1, 2);
        let err = forward(&[0.5; 3], &[0.5; 4], None, dims).unwrap_err();
        assert!(matches!(err, ForgetMultError::Shape(_)));

        let err = forward(&[0.5; 4], &[0.5; 4], Some(&[0.0]), dims).unwrap_err();
        assert!(matches!(err, ForgetMultError::Shape(_)));

        let (_, context) = forward(&[0.5; 4], &[0.5; 4], None, dims).unwrap();
        let err = backward(context, &[1.0; 2]).unwrap_err();
        assert!(matches!(err, ForgetMultError::StateConsistency(_)));
    }
}
