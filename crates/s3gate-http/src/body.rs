//! Body type shared by outgoing backend requests and gateway responses.
//!
//! - **Streaming**: a hyper body passed through untouched, in either direction.
//! - **Buffered**: small gateway-generated payloads such as XML errors.
//! - **Empty**: no content.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;

/// A body that is either generated by the gateway or streamed from a peer.
#[derive(Debug, Default)]
pub enum GatewayBody {
    /// Gateway-generated content.
    Buffered(Full<Bytes>),
    /// A body relayed from the client or the backend without buffering.
    Streaming(Incoming),
    /// No content.
    #[default]
    Empty,
}

impl GatewayBody {
    /// A buffered body.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl From<Incoming> for GatewayBody {
    fn from(body: Incoming) -> Self {
        Self::Streaming(body)
    }
}

impl http_body::Body for GatewayBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(incoming) => Pin::new(incoming).poll_frame(cx),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(incoming) => incoming.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(incoming) => incoming.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
