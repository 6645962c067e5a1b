//! Fused forget-mult: cubecl kernels, their launch glue and the tensor-level
//! forward/backward API.

mod api;
pub(crate) mod kernel;
pub(crate) mod launch;
mod types;


pub use api::{
    ForgetMultContext, ForgetMultGrads, backward, check_operands, forget_mult, forward,
};
pub use kernel::{forget_mult_backward_kernel, forget_mult_forward_kernel};
pub use types::{ForgetMultInputs, ForgetMultState};
