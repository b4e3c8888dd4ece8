//! Diameter protocol client.
use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::transport::Codec;
use std::collections::HashMap;
use std::future::Future;
use std::ops::DerefMut;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::oneshot::{self, Receiver, Sender};
use tokio::sync::Mutex;

pub struct DiameterClientConfig {
    pub use_tls: bool,
    pub verify_cert: bool,
}

impl Default for DiameterClientConfig {
    fn default() -> Self {
        DiameterClientConfig {
            use_tls: false,
            verify_cert: true,
        }
    }
}

/// A Diameter client: a single outbound connection, a map of
/// hop-by-hop ids to the oneshot sender waiting on their answer, and
/// a writer shared between `send_message` callers.
pub struct DiameterClient {
    config: DiameterClientConfig,
    address: String,
    writer: Option<Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>,
    pending: Arc<Mutex<HashMap<u32, Sender<DiameterMessage>>>>,
}

impl DiameterClient {
    pub fn new(addr: &str, config: DiameterClientConfig) -> DiameterClient {
        DiameterClient {
            config,
            address: addr.into(),
            writer: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn connect(&mut self) -> Result<ClientHandler> {
        let stream = TcpStream::connect(&self.address).await?;

        if self.config.use_tls {
            let connector = tokio_native_tls::TlsConnector::from(
                native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(!self.config.verify_cert)
                    .build()
                    .map_err(|e| Error::ClientError(e.to_string()))?,
            );
            let tls_stream = connector
                .connect(&self.address, stream)
                .await
                .map_err(|e| Error::ClientError(e.to_string()))?;
            let (reader, writer) = tokio::io::split(tls_stream);
            self.writer = Some(Arc::new(Mutex::new(writer)));
            Ok(ClientHandler {
                reader: Box::new(reader),
                pending: Arc::clone(&self.pending),
            })
        } else {
            let (reader, writer) = tokio::io::split(stream);
            self.writer = Some(Arc::new(Mutex::new(writer)));
            Ok(ClientHandler {
                reader: Box::new(reader),
                pending: Arc::clone(&self.pending),
            })
        }
    }

    /// Reads answers off the wire and routes each to the sender
    /// registered for its hop-by-hop id. Runs until the connection
    /// closes or a decode error occurs; intended to be spawned.
    pub async fn handle(handler: &mut ClientHandler, dict: Arc<Dictionary>) {
        loop {
            match Codec::decode(&mut handler.reader, &dict).await {
                Ok(msg) => {
                    let hop_by_hop = msg.header.hop_by_hop_id;
                    let sender = {
                        let mut pending = handler.pending.lock().await;
                        pending.remove(&hop_by_hop)
                    };
                    match sender {
                        Some(sender) => {
                            let _ = sender.send(msg);
                        }
                        None => {
                            log::warn!("no pending request for hop-by-hop id {}", hop_by_hop);
                        }
                    }
                }
                Err(e) => {
                    log::error!("client read loop terminating: {:?}", e);
                    return;
                }
            }
        }
    }

    pub async fn send_message(&mut self, req: DiameterMessage) -> Result<ResponseFuture> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| Error::ClientError("not connected".into()))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(req.header.hop_by_hop_id, tx);
        }

        let mut writer = writer.lock().await;
        Codec::encode(writer.deref_mut(), &req).await?;
        Ok(ResponseFuture { receiver: rx })
    }
}

pub struct ClientHandler {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    pending: Arc<Mutex<HashMap<u32, Sender<DiameterMessage>>>>,
}

#[derive(Debug)]
pub struct ResponseFuture {
    pub receiver: Receiver<DiameterMessage>,
}

impl Future for ResponseFuture {
    type Output = Result<DiameterMessage>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(ctx) {
            std::task::Poll::Ready(Ok(response)) => std::task::Poll::Ready(Ok(response)),
            std::task::Poll::Ready(Err(_)) => {
                std::task::Poll::Ready(Err(Error::ClientError("response channel closed".into())))
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
