//! Named groups of tensors that travel through the backend layers together.
//!
//! Burn wraps float tensors differently per backend: raw `CubeTensor`s,
//! `FloatTensor<Autodiff<B>>` with a graph node, `FloatTensor<Fusion<B>>` with
//! a fusion client. The forget-mult inputs, saved state and gradients are the
//! same named groups at every layer, so they are declared once, generic over
//! the tensor type, and converted with `map`:
//!
//! ```ignore
//! tensor_bundle! {
//!     pub struct Pair { lhs, rhs }
//! }
//!
//! let inner: Pair<FloatTensor<B>> = outer.map(|t| t.primitive);
//! ```

/// Helper macro to replace a token with an expression (used for counting).
#[doc(hidden)]
#[macro_export]
macro_rules! __replace_expr {
    ($_t:tt, $sub:expr) => {
        $sub
    };
}

/// Declares a struct of tensors generic over the tensor type.
///
/// Generates public fields, `Debug`/`Clone`, a field-wise `map` and
/// `into_array` in declaration order.
#[macro_export]
macro_rules! tensor_bundle {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($field:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name<T> {
            $(pub $field: T,)+
        }

        impl<T> $name<T> {
            /// Convert every tensor with `f`, keeping the field names.
            pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> $name<U> {
                $name {
                    $($field: f(self.$field),)+
                }
            }

            /// The tensors in declaration order.
            pub fn into_array(self) -> [T; 0usize $(+ $crate::__replace_expr!($field, 1usize))+] {
                [$(self.$field),+]
            }
        }
    };
}

pub use crate::tensor_bundle;
