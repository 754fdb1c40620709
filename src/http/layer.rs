//! Tower middleware applying an [`Interceptor`] to a service's responses.

use axum::body::Body;
use axum::http::{Method, Request, Response};
use futures_util::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::http::interceptor::Interceptor;

/// Wraps services so matching responses are rewritten.
#[derive(Debug, Clone)]
pub struct ModifyResponseLayer {
    interceptor: Interceptor,
}

impl ModifyResponseLayer {
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for ModifyResponseLayer {
    type Service = ModifyResponseService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ModifyResponseService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModifyResponseService<S> {
    inner: S,
    interceptor: Interceptor,
}

impl<S> Service<Request<Body>> for ModifyResponseService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + 'static,
    S::Future: Send + 'static,
    S::Error: 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // HEAD responses carry no body to rewrite.
        let skip = request.method() == Method::HEAD;
        let interceptor = self.interceptor.clone();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            if skip || !interceptor.should_intercept(&response) {
                return Ok(response);
            }
            Ok(interceptor.apply(response))
        })
    }
}
