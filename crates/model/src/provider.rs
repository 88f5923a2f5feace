use std::error::Error;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// Returns `true` if the same request may succeed when sent again later.
    #[inline]
    fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::RateLimitExceeded
    }
}

/// A type that represents a chat-completion backend.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
///
/// Several agents may share one provider, so implementations must not
/// assume that consecutive requests belong to the same conversation.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends a request to the model.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}

impl<P: ModelProvider> ModelProvider for Arc<P> {
    type Error = P::Error;
    type Response = P::Response;

    #[inline]
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        (**self).send_request(req)
    }
}
