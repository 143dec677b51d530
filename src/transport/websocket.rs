//! WebSocket transport.
//!
//! Wraps a `tokio-tungstenite` stream. Only text frames carry protocol
//! traffic; binary, ping and pong frames are skipped and a close frame
//! ends the inbound sequence.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::{FrameSink, FrameSource, Transport};

// ============================================================================
// WebSocketTransport
// ============================================================================

/// A WebSocket connection to a DevTools endpoint.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use devtools_mux::transport::WebSocketTransport;
///
/// let transport = WebSocketTransport::connect(
///     "ws://127.0.0.1:9222/devtools/browser/4f1c...",
///     Duration::from_secs(30),
/// ).await?;
/// ```
pub struct WebSocketTransport<S> {
    /// Underlying stream.
    stream: WebSocketStream<S>,
}

impl WebSocketTransport<MaybeTlsStream<TcpStream>> {
    /// Connects to a `ws://` or `wss://` endpoint.
    ///
    /// `wss://` needs one of the `tokio-tungstenite` TLS features enabled
    /// by the final binary.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is invalid or not a WebSocket URL
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds `connect_timeout`
    /// - [`Error::Connection`] if the handshake fails
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let url = parse_ws_url(url)?;

        let (stream, response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout))?
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(url = %url, status = %response.status(), "WebSocket connection established");

        Ok(Self::new(stream))
    }
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an already-established WebSocket stream.
    #[inline]
    #[must_use]
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Sink = WebSocketSink<S>;
    type Source = WebSocketSource<S>;

    fn split(self) -> (Self::Sink, Self::Source) {
        let (write, read) = self.stream.split();
        (WebSocketSink { write }, WebSocketSource { read })
    }
}

/// Validates a WebSocket endpoint URL.
fn parse_ws_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| Error::config(format!("Invalid WebSocket URL '{url}': {e}")))?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        scheme => Err(Error::config(format!(
            "Unsupported URL scheme '{scheme}', expected ws or wss"
        ))),
    }
}

// ============================================================================
// WebSocketSink
// ============================================================================

/// Outbound half of a [`WebSocketTransport`].
pub struct WebSocketSink<S> {
    write: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.write.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

// ============================================================================
// WebSocketSource
// ============================================================================

/// Inbound half of a [`WebSocketTransport`].
pub struct WebSocketSource<S> {
    read: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),

                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }

                Ok(Message::Binary(bytes)) => {
                    trace!(len = bytes.len(), "Ignoring binary frame");
                }

                // Ping, Pong, raw frames
                Ok(_) => {}

                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[test]
    fn test_parse_ws_url_accepts_ws() {
        let url = parse_ws_url("ws://127.0.0.1:9222/devtools/browser/abc").expect("valid");
        assert_eq!(url.port(), Some(9222));
    }

    #[test]
    fn test_parse_ws_url_rejects_http() {
        let err = parse_ws_url("http://127.0.0.1:9222/json").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_ws_url_rejects_garbage() {
        assert!(matches!(parse_ws_url("not a url"), Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_text_frames_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            ws.send(Message::Ping(Vec::new().into())).await.expect("ping");
            ws.send(Message::Text("hello".to_string().into()))
                .await
                .expect("text");

            let echoed = loop {
                match ws.next().await.expect("frame").expect("ok") {
                    Message::Text(text) => break text.as_str().to_owned(),
                    _ => continue,
                }
            };
            ws.close(None).await.expect("close");
            echoed
        });

        let url = format!("ws://127.0.0.1:{port}");
        let transport = WebSocketTransport::connect(&url, Duration::from_secs(5))
            .await
            .expect("connect");
        let (mut sink, mut source) = transport.split();

        let first = source.next_frame().await.expect("frame").expect("ok");
        assert_eq!(first, "hello");

        sink.send_frame("world".to_string()).await.expect("send");
        assert!(source.next_frame().await.is_none());

        let echoed = server.await.expect("server task");
        assert_eq!(echoed, "world");
    }
}
