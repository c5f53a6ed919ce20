//! Bridges between untyped wire arguments and typed native calls.
//!
//! [`Procedure`] is implemented for every `Fn(A1, .., An) -> Result<R, E>`
//! with up to ten parameters whose types implement [`WireParam`]. The bridge
//! checks the argument count, validates every argument in position order,
//! converts the validated values and finally runs the native function.

use serde_json::Value;

use crate::error::{CallError, ParamError, RpcError};
use crate::wire::{Mismatch, WireParam, WireType};

/// A native callable that can be driven by positional wire arguments.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// implementations for different arities apart.
pub trait Procedure<Args>: Send + Sync + 'static {
    type Output;

    /// Wire-type tags of the parameters, in declaration order.
    fn param_types() -> Vec<WireType>;

    /// Validates and converts `args`, then invokes the procedure.
    fn invoke(&self, args: &[Value]) -> Result<Self::Output, CallError>;
}

/// Validates one argument against the coercion table.
pub fn check_arg<T: WireParam>(position: usize, value: &Value) -> Result<(), ParamError> {
    T::check(value).map_err(|mismatch| match mismatch {
        Mismatch::Type(actual) => ParamError::Type {
            position,
            expected: T::WIRE_TYPE,
            actual,
        },
        Mismatch::Range => ParamError::Range {
            position,
            expected: T::WIRE_TYPE,
        },
    })
}

/// Converts an already validated argument to its native type.
pub fn convert_arg<T: WireParam>(position: usize, value: &Value) -> Result<T, ParamError> {
    T::deserialize(value).map_err(|err| ParamError::Conversion {
        position,
        reason: err.to_string(),
    })
}

fn check_arity(expected: usize, args: &[Value]) -> Result<(), ParamError> {
    if args.len() != expected {
        return Err(ParamError::Arity {
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

macro_rules! impl_procedure {
    ($count:expr; $($ty:ident $arg:ident $idx:tt),*) => {
        impl<F, R, E, $($ty,)*> Procedure<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Result<R, E> + Send + Sync + 'static,
            E: Into<anyhow::Error>,
            $($ty: WireParam,)*
        {
            type Output = R;

            fn param_types() -> Vec<WireType> {
                vec![$($ty::WIRE_TYPE),*]
            }

            #[allow(unused_variables)]
            fn invoke(&self, args: &[Value]) -> Result<R, CallError> {
                check_arity($count, args)?;
                $(check_arg::<$ty>($idx, &args[$idx])?;)*
                $(let $arg = convert_arg::<$ty>($idx, &args[$idx])?;)*
                (self)($($arg),*)
                    .map_err(|failure| CallError::Failed(RpcError::from_failure(failure.into())))
            }
        }
    };
}

impl_procedure!(0;);
impl_procedure!(1; A0 a0 0);
impl_procedure!(2; A0 a0 0, A1 a1 1);
impl_procedure!(3; A0 a0 0, A1 a1 1, A2 a2 2);
impl_procedure!(4; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_procedure!(5; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_procedure!(6; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);
impl_procedure!(7; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6);
impl_procedure!(8; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6, A7 a7 7);
impl_procedure!(9; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6, A7 a7 7, A8 a8 8);
impl_procedure!(10; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6, A7 a7 7, A8 a8 8, A9 a9 9);
