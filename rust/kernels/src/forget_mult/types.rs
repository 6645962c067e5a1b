use crate::bundle::tensor_bundle;

tensor_bundle! {
    /// Operands of the recurrence, also used for their gradients.
    ///
    /// `gates` and `features` are `[T, B, H]`, `initial` is `[B, H]`.
    pub struct ForgetMultInputs { gates, features, initial }
}

tensor_bundle! {
    /// State kept from forward for backward.
    ///
    /// `initial` followed by `output` is the hidden history `H[0..=T]`.
    pub struct ForgetMultState { gates, features, initial, output }
}
