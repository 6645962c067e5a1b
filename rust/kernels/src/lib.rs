#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(
    clippy::trivially_copy_pass_by_ref,
    reason = "erroneous false positives on #[cube] functions"
)]
#![allow(
    clippy::similar_names,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::default_trait_access,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::type_complexity
)]
//! Forget-mult recurrence kernels
//!
//! `H[t] = F[t] * X[t] + (1 - F[t]) * H[t-1]` over `[T, B, H]` tensors, the
//! pooling step of a quasi-recurrent network. This crate provides:
//! - [`forget_mult`] - fused forward/backward, dispatched through
//!   [`ForgetMultBackend`] to a cubecl kernel or the rayon host engine
//! - [`reference`] - per-timestep loop built from tensor ops
//! - [`ForgetMult`] - selector between the two, driven by [`ExecutionMode`]
//! - [`host`] - the scans on plain `f32` slices

/// Launch a CubeCL kernel with bounds checking in debug builds,
/// unchecked in release builds. Must be called inside `unsafe`.
macro_rules! cube_launch {
    ($kernel:ident :: < $($ty:ty),+ > ( $($args:expr),* $(,)? )) => {{
        #[cfg(debug_assertions)]
        { $kernel::launch::< $($ty),+ >( $($args),* ).unwrap() }
        #[cfg(not(debug_assertions))]
        { $kernel::launch_unchecked::< $($ty),+ >( $($args),* ).unwrap() }
    }};
}

pub mod bundle;
pub mod error;
pub mod forget_mult;
pub mod host;
mod impls;
pub mod kernel;
pub mod reference;
pub mod selector;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ForgetMultError, Result, SeqDims};
pub use forget_mult::{ForgetMultContext, ForgetMultGrads, ForgetMultInputs, ForgetMultState};
pub use kernel::ForgetMultBackend;
pub use qrnn_config::{ExecutionMode, ForgetMultConfig};
pub use selector::ForgetMult;
