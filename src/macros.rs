pub use enclose::*;

/// Build a [`Derived`](crate::Derived) from an expression reading its inputs
/// through an evaluation context, with an optional capture-clone list.
#[macro_export]
macro_rules! derived {
    (( $($d_tt:tt)* ) $eval:ident => $($b:tt)*) => {
        $crate::Derived::new($crate::macros::enclose!(($( $d_tt )*) Box::new(move |$eval: &$crate::Evaluation, _| { $($b)* })))
    };
    ($eval:ident => $($b:tt)*) => {
        $crate::Derived::new(Box::new(move |$eval: &$crate::Evaluation, _| { $($b)* }))
    };
}
