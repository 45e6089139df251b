use std::{convert::Infallible, sync::Arc, time::Duration};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use hookverify_messages::{InboundFrame, PING, WebhookFrame};
use serde_json::{Map, Value};
use tokio::{net::TcpStream, task::JoinHandle, time};
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
    tungstenite::{self, Message, client::IntoClientRequest},
};

use crate::{
    credentials::Credentials,
    error::Error,
    webhook::{ForwardResult, WebhookForwarder},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callbacks fired by the [`Listener`] as the session progresses.
pub trait ListenerEvents {
    fn on_connect(&mut self, session_info: &Map<String, Value>);

    fn on_webhook(&mut self, frame: &WebhookFrame, result: &ForwardResult);

    /// Fired once per failed connection attempt or lost session.
    /// Reconnection follows unless [`Error::is_transient`] is false.
    fn on_error(&mut self, error: &Error);
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub reconnect_delay: Duration,
    pub keepalive_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Maps the relay's API URL onto its streaming endpoint for `api_key`.
pub fn stream_url(api_url: &str, api_key: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws/listen/{api_key}")
}

pub struct Listener<H> {
    endpoint: String,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    forwarder: WebhookForwarder,
    events: H,
    config: ListenerConfig,
}

impl<H: ListenerEvents> Listener<H> {
    pub fn new(credentials: &Credentials, forwarder: WebhookForwarder, events: H) -> Self {
        Self {
            endpoint: stream_url(&credentials.api_url, &credentials.api_key),
            tls_config: None,
            forwarder,
            events,
            config: ListenerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tls_config(mut self, tls_config: Option<Arc<rustls::ClientConfig>>) -> Self {
        self.tls_config = tls_config;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Runs sessions back to back until the relay rejects the handshake,
    /// which is the only way this returns. Transient failures are reported
    /// through [`ListenerEvents::on_error`] and retried after the reconnect delay.
    ///
    /// Dropping the future aborts the keepalive task and closes the connection.
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            let Err(err) = self.session().await;
            self.events.on_error(&err);

            if !err.is_transient() {
                return Err(err);
            }

            tracing::debug!(
                "session ended ({err}), reconnecting in {:?}",
                self.config.reconnect_delay
            );
            time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn session(&mut self) -> Result<Infallible, Error> {
        let stream = self.connect().await?;
        let (write, mut read) = stream.split();

        let handshake = next_text(&mut read).await?;
        let InboundFrame::Connected { session_info } = InboundFrame::decode(&handshake) else {
            return Err(Error::HandshakeRejected(handshake));
        };

        tracing::debug!("connected to {}", self.endpoint);
        self.events.on_connect(&session_info);

        let _keepalive = Keepalive::spawn(write, self.config.keepalive_interval);

        loop {
            let text = next_text(&mut read).await?;
            match InboundFrame::decode(&text) {
                InboundFrame::Webhook(frame) => {
                    tracing::debug!("received webhook {}", frame.delivery_id());
                    let result = self.forwarder.forward(&frame.payload, &frame.headers).await;
                    self.events.on_webhook(&frame, &result);
                }
                InboundFrame::Pong => {}
                InboundFrame::Connected { .. } | InboundFrame::Unrecognized => {
                    tracing::debug!("ignoring frame: {text}");
                }
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, Error> {
        let request = self.endpoint.as_str().into_client_request()?;
        let connector = self.tls_config.clone().map(Connector::Rustls);

        match connect_async_tls_with_config(request, None, false, connector).await {
            Ok((stream, _)) => Ok(stream),
            Err(tungstenite::Error::Http(response)) => Err(Error::UpgradeRejected {
                status: response.status().as_u16(),
                body: response
                    .body()
                    .as_ref()
                    .map(|body| String::from_utf8_lossy(body).into_owned())
                    .unwrap_or_default(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

/// Reads until the next data frame. Control frames are handled by tungstenite.
async fn next_text(read: &mut SplitStream<WsStream>) -> Result<String, Error> {
    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => return Ok(text.as_str().to_string()),
            Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => return Ok(text),
                Err(_) => tracing::debug!("ignoring non UTF-8 binary frame"),
            },
            Message::Close(frame) => return Err(Error::closed(frame)),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    Err(Error::ConnectionClosed {
        reason: "stream ended".to_string(),
    })
}

/// Sends [`PING`] on a fixed interval. The task owns the write half, the
/// listener never writes, and it is aborted when the guard is dropped.
struct Keepalive(JoinHandle<()>);

impl Keepalive {
    fn spawn(mut write: SplitSink<WsStream, Message>, interval: Duration) -> Self {
        Self(tokio::spawn(async move {
            loop {
                time::sleep(interval).await;
                if let Err(err) = write.send(Message::Text(PING.into())).await {
                    tracing::debug!("keepalive stopped: {err}");
                    break;
                }
            }
        }))
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_http_schemes_to_websocket() {
        assert_eq!(
            stream_url("https://hookverify.com", "abc123"),
            "wss://hookverify.com/ws/listen/abc123"
        );
        assert_eq!(
            stream_url("http://localhost:8000/", "abc123"),
            "ws://localhost:8000/ws/listen/abc123"
        );
    }

    #[test]
    fn default_intervals() {
        let config = ListenerConfig::default();

        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }
}
