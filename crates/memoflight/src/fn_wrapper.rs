// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures::future::BoxFuture;

/// Generates a cloneable wrapper around an `Arc<dyn Fn>`.
///
/// The wrapper gets a `new` constructor, a `call` method, `Clone` and an opaque `Debug`.
///
/// ```rust,ignore
/// define_fn_wrapper!(OnError<E>(Fn(error: &E)));
/// ```
macro_rules! define_fn_wrapper {
    ($name:ident<$($generics:ident),*>(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name<$($generics),*>(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl<$($generics),*> $name<$($generics),*> {
            pub(crate) fn new<F>(f: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl<$($generics),*> Clone for $name<$($generics),*> {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl<$($generics),*> std::fmt::Debug for $name<$($generics),*> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };

    ($name:ident<$($generics:ident),*>(Fn($($param_name:ident: $param_ty:ty),*))) => {
        define_fn_wrapper!($name<$($generics),*>(Fn($($param_name: $param_ty),*) -> ()));
    };
}

define_fn_wrapper!(FetchFn<A, V, E>(Fn(args: A) -> BoxFuture<'static, Result<V, E>>));
define_fn_wrapper!(OnError<E>(Fn(error: &E)));

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(FetchFn<(u32,), String, std::io::Error>: Send, Sync, Clone, std::fmt::Debug);
        static_assertions::assert_impl_all!(OnError<std::io::Error>: Send, Sync, Clone, std::fmt::Debug);
    }

    #[test]
    fn fetch_fn_call_ok() {
        let fetch = FetchFn::new(|(n,): (u32,)| async move { Ok::<_, std::io::Error>(n * 2) }.boxed());

        let result = futures::executor::block_on(fetch.clone().call((21,)));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn on_error_call_ok() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let seen = std::sync::Arc::clone(&calls);
        let on_error = OnError::new(move |_: &std::io::Error| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        on_error.call(&std::io::Error::other("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_ok() {
        let on_error = OnError::new(|_: &std::io::Error| {});
        assert_eq!(format!("{on_error:?}"), "OnError");
    }
}
