//! Fetch - the injected "has it changed?" operation

use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;

use crate::error::Result;

/// Asynchronous source of the watched value.
///
/// Each call must settle exactly once. The returned value is compared with
/// the previous observation to decide whether anything changed.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// The observed value
    type Output: PartialEq + Clone + Debug + Send + Sync + 'static;

    /// Fetch the current value
    async fn fetch(&self) -> Result<Self::Output>;
}

/// Adapter turning an async closure into a `Fetch`
pub struct FnFetch<F> {
    f: F,
}

/// Wrap `f` so it can be handed to a coordinator
pub fn fetch_fn<F, Fut, T>(f: F) -> FnFetch<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    T: PartialEq + Clone + Debug + Send + Sync + 'static,
{
    FnFetch { f }
}

#[async_trait]
impl<F, Fut, T> Fetch for FnFetch<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    T: PartialEq + Clone + Debug + Send + Sync + 'static,
{
    type Output = T;

    async fn fetch(&self) -> Result<T> {
        (self.f)().await
    }
}
