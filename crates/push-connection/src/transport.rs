//! Transport seam between the manager and the network.
//!
//! The manager only sees a [`Transport`]: a sink of outbound frames and a
//! stream of inbound ones. [`TungsteniteConnector`] produces real
//! WebSocket transports; tests substitute an in-memory connector.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use reportify_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::error::PushError;
use crate::target::ConnectionTarget;

/// Outbound half of a transport.
pub type WsSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of a transport.
pub type WsStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// An open, split transport.
pub struct Transport {
    pub sink: WsSink,
    pub stream: WsStream,
}

/// Opens transports to a target.
pub trait Connector: Send + Sync + 'static {
    /// Connects to `target`, offering `protocols` as subprotocols.
    ///
    /// The returned future must not borrow from the arguments.
    fn connect(
        &self,
        target: &ConnectionTarget,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Transport, PushError>>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(
        &self,
        target: &ConnectionTarget,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Transport, PushError>> {
        let url = target.url().to_string();
        let protocols = protocols.join(", ");
        Box::pin(async move {
            let mut request = url.as_str().into_client_request()?;
            if !protocols.is_empty() {
                let value = HeaderValue::from_str(&protocols)
                    .map_err(|e| PushError::InvalidTarget(e.to_string()))?;
                request
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", value);
            }

            let mut ws_config = WebSocketConfig::default();
            ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
            ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
            let (ws_stream, _) =
                tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false)
                    .await?;
            let (sink, stream) = ws_stream.split();

            Ok(Transport {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}
