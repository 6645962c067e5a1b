//! Lane-parallel forget-mult kernels.
//!
//! Every unit owns one lane (a `(batch, hidden)` pair) and scans it over time.
//! Tensors are contiguous `[T, B, H]`, so stepping one timestep moves
//! `B * H` elements and the lane index is the flat `(batch, hidden)` offset.
//! Units never read or write another lane's elements.

use burn_cubecl::CubeRuntime;
use cubecl::prelude::*;

/// `output[t] = gates[t] * features[t] + (1 - gates[t]) * output[t - 1]`,
/// with `initial` standing in for `output[-1]`.
#[cube(launch, launch_unchecked)]
pub fn forget_mult_forward_kernel<F: Float>(
    gates: &Tensor<F>,
    features: &Tensor<F>,
    initial: &Tensor<F>,
    output: &mut Tensor<F>,
) {
    let lane = ABSOLUTE_POS;
    let lanes = initial.len();

    if lane < lanes {
        let seq_len = gates.shape(0);
        let mut prev = initial[lane];

        for t in 0..seq_len {
            let i = t * lanes + lane;
            let gate = gates[i];
            let h = gate * features[i] + (F::new(1.0) - gate) * prev;
            output[i] = h;
            prev = h;
        }
    }
}

/// Reverse scan of [`forget_mult_forward_kernel`].
///
/// The accumulator is attenuated as `acc - gate * acc`, not
/// `(1 - gate) * acc`, to avoid rounding `1 - gate` when the gate is near 1.
/// It is carried in `F`, since not every runtime has `f64`; over very long
/// sequences with small gates the error grows with `T` at `F` precision.
/// The host engine carries it in `f64`.
#[cube(launch, launch_unchecked)]
pub fn forget_mult_backward_kernel<F: Float>(
    gates: &Tensor<F>,
    features: &Tensor<F>,
    initial: &Tensor<F>,
    output: &Tensor<F>,
    grad_output: &Tensor<F>,
    grad_gates: &mut Tensor<F>,
    grad_features: &mut Tensor<F>,
    grad_initial: &mut Tensor<F>,
) {
    let lane = ABSOLUTE_POS;
    let lanes = initial.len();

    if lane < lanes {
        let seq_len = gates.shape(0);
        let mut acc = F::new(0.0);

        for step in 0..seq_len {
            let t = seq_len - 1 - step;
            let i = t * lanes + lane;

            let mut prev = initial[lane];
            if t > 0 {
                prev = output[i - lanes];
            }

            let gate = gates[i];
            acc += grad_output[i];
            grad_features[i] = gate * acc;
            grad_gates[i] = (features[i] - prev) * acc;
            acc = acc - gate * acc;
        }

        grad_initial[lane] = acc;
    }
}

fn lane_launch_dims<R: CubeRuntime>(client: &ComputeClient<R>, lanes: usize) -> (CubeCount, CubeDim) {
    let cube_dim = CubeDim::new(client, lanes);
    let cube_count = (lanes as u32).div_ceil(cube_dim.num_elems());
    (CubeCount::Static(cube_count, 1, 1), cube_dim)
}

pub fn launch_forget_mult_forward<R: CubeRuntime, F: Float + CubeElement>(
    client: &ComputeClient<R>,
    gates: TensorHandleRef<R>,
    features: TensorHandleRef<R>,
    initial: TensorHandleRef<R>,
    output: TensorHandleRef<R>,
) {
    let lanes: usize = initial.shape.iter().product();
    let (cube_count, cube_dim) = lane_launch_dims(client, lanes);

    unsafe {
        cube_launch!(forget_mult_forward_kernel::<F, R>(
            client,
            cube_count,
            cube_dim,
            TensorArg::from_raw_parts::<F>(gates.handle, gates.strides, gates.shape, 1),
            TensorArg::from_raw_parts::<F>(features.handle, features.strides, features.shape, 1),
            TensorArg::from_raw_parts::<F>(initial.handle, initial.strides, initial.shape, 1),
            TensorArg::from_raw_parts::<F>(output.handle, output.strides, output.shape, 1),
        ));
    }
}

pub fn launch_forget_mult_backward<R: CubeRuntime, F: Float + CubeElement>(
    client: &ComputeClient<R>,
    gates: TensorHandleRef<R>,
    features: TensorHandleRef<R>,
    initial: TensorHandleRef<R>,
    output: TensorHandleRef<R>,
    grad_output: TensorHandleRef<R>,
    grad_gates: TensorHandleRef<R>,
    grad_features: TensorHandleRef<R>,
    grad_initial: TensorHandleRef<R>,
) {
    let lanes: usize = initial.shape.iter().product();
    let (cube_count, cube_dim) = lane_launch_dims(client, lanes);

    unsafe {
        cube_launch!(forget_mult_backward_kernel::<F, R>(
            client,
            cube_count,
            cube_dim,
            TensorArg::from_raw_parts::<F>(gates.handle, gates.strides, gates.shape, 1),
            TensorArg::from_raw_parts::<F>(features.handle, features.strides, features.shape, 1),
            TensorArg::from_raw_parts::<F>(initial.handle, initial.strides, initial.shape, 1),
            TensorArg::from_raw_parts::<F>(output.handle, output.strides, output.shape, 1),
            TensorArg::from_raw_parts::<F>(
                grad_output.handle,
                grad_output.strides,
                grad_output.shape,
                1,
            ),
            TensorArg::from_raw_parts::<F>(
                grad_gates.handle,
                grad_gates.strides,
                grad_gates.shape,
                1,
            ),
            TensorArg::from_raw_parts::<F>(
                grad_features.handle,
                grad_features.strides,
                grad_features.shape,
                1,
            ),
            TensorArg::from_raw_parts::<F>(
                grad_initial.handle,
                grad_initial.strides,
                grad_initial.shape,
                1,
            ),
        ));
    }
}
