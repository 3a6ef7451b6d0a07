//! `tokio-tungstenite` sockets for the matchmaking endpoint.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::transport::{Connector, Transport, TransportError, TransportReader, TransportWriter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn io_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Io(e.to_string())
}

/// Dials `ws://` or `wss://` matchmaking endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn open(&self, url: &str) -> Result<WsTransport, TransportError> {
        WsTransport::connect(url).await
    }
}

pub struct WsTransport {
    stream: WsStream,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = connect_async(url).await.map_err(io_error)?;
        Ok(Self { stream })
    }
}

impl Transport for WsTransport {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = self.stream.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl TransportReader for WsReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(frame) = self.stream.next().await {
            match frame.map_err(io_error)? {
                Message::Text(text) => return Ok(Some(text.to_string())),
                // A close frame is the server ending the session deliberately.
                Message::Close(_) => return Ok(None),
                // Pings are answered by tungstenite; the server never sends binary.
                _ => {}
            }
        }
        // Stream ran dry without a close frame: the network dropped us.
        Err(TransportError::ConnectionClosed)
    }
}

pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl TransportWriter for WsWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink.send(Message::text(text)).await.map_err(io_error)
    }
}
