//! [`ForgetMultBackend`](crate::ForgetMultBackend) for burn's backends and
//! backend decorators.

mod autodiff;
mod cube;
mod fusion;
mod ndarray;
