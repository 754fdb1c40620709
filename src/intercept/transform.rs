//! Caller-supplied body transforms.
//!
//! Every transform returns a future. Synchronous logic is adapted with
//! [`transform_fn`], which resolves immediately, so the pipeline awaits both
//! kinds through the same path.

use futures_util::future::{self, BoxFuture, FutureExt};
use std::future::Future;

use crate::intercept::payload::Payload;
use crate::intercept::sink::BoxError;

/// Inspects or rewrites a decoded body before it is re-emitted.
pub trait Transform: Send + Sync {
    fn transform(&self, payload: Payload) -> BoxFuture<'static, Result<Payload, BoxError>>;
}

impl<F, Fut> Transform for F
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, BoxError>> + Send + 'static,
{
    fn transform(&self, payload: Payload) -> BoxFuture<'static, Result<Payload, BoxError>> {
        self(payload).boxed()
    }
}

/// Adapt a synchronous function into a [`Transform`].
pub fn transform_fn<F>(f: F) -> impl Transform
where
    F: Fn(Payload) -> Result<Payload, BoxError> + Send + Sync,
{
    move |payload: Payload| future::ready(f(payload))
}

/// Returns the payload unchanged. Used when no transform is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn transform(&self, payload: Payload) -> BoxFuture<'static, Result<Payload, BoxError>> {
        future::ready(Ok(payload)).boxed()
    }
}
