//! Actor scope middleware
//!
//! The single integration point between request handling and the audit
//! engine: a tower layer that reads the authenticated principal off the
//! request and installs it into the task-local actor context for the
//! duration of the request. The scope ends when the request future resolves,
//! on success, error, panic, or cancellation, so a later request on the same
//! worker can never observe a stale actor.
//!
//! Authentication itself is an upstream concern: an auth layer is expected to
//! insert a [`Principal`] extension. The `x-actor-id` header fallback exists
//! for trusted internal callers and tests.

use axum::extract::Request;
use axum::response::Response;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use super::actor;

/// Authenticated principal, inserted by the auth layer.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
}

/// Layer that installs the actor context around each request.
#[derive(Clone, Default)]
pub struct ActorLayer;

impl ActorLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ActorLayer {
    type Service = ActorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ActorMiddleware { inner }
    }
}

/// Middleware service wrapping request handling in an actor scope.
#[derive(Clone)]
pub struct ActorMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for ActorMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let actor = extract_actor(&request);
        let request_id = Uuid::new_v4();

        Box::pin(async move {
            debug!(
                request_id = %request_id,
                actor = ?actor,
                uri = %request.uri(),
                "Actor scope installed"
            );
            actor::scope(actor, inner.call(request)).await
        })
    }
}

/// The acting principal for a request: the authenticated principal extension
/// when present, otherwise the `x-actor-id` header, otherwise none
/// (system-attributed).
fn extract_actor(request: &Request) -> Option<String> {
    if let Some(principal) = request.extensions().get::<Principal>() {
        return Some(principal.id.clone());
    }

    request
        .headers()
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami() -> String {
        actor::current().unwrap_or_else(|| "nobody".to_string())
    }

    fn app() -> Router {
        Router::new().route("/whoami", get(whoami)).layer(ActorLayer::new())
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_header_actor_is_installed() {
        let request = Request::builder()
            .uri("/whoami")
            .header("x-actor-id", "alice")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "alice");
    }

    #[tokio::test]
    async fn test_principal_extension_wins_over_header() {
        let mut request = Request::builder()
            .uri("/whoami")
            .header("x-actor-id", "spoofed")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(Principal {
            id: "authenticated-user".to_string(),
        });

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "authenticated-user");
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_actor() {
        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "nobody");
    }
}
