/// Errors that can occur in the transport layer.
///
/// A transport error means no HTTP response was obtained at all. A 401 or
/// 500 is a successful transport round-trip and comes back as an
/// [`HttpResponse`](crate::HttpResponse).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be delivered (DNS, refused, TLS, reset).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the client's timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response head arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    BodyRead(String),
}
