//! Diameter protocol server: a TCP/TLS accept loop that decodes one
//! request per round trip and hands it to a user-supplied handler.
use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::transport::Codec;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub struct DiameterServerConfig {
    pub native_tls: Option<native_tls::Identity>,
}

impl Default for DiameterServerConfig {
    fn default() -> Self {
        DiameterServerConfig { native_tls: None }
    }
}

pub struct DiameterServer {
    listener: TcpListener,
    config: DiameterServerConfig,
}

impl DiameterServer {
    pub async fn new(addr: &str, config: DiameterServerConfig) -> Result<DiameterServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(DiameterServer { listener, config })
    }

    pub async fn listen<F, Fut>(&mut self, dict: Arc<Dictionary>, handler: F) -> Result<()>
    where
        F: Fn(DiameterMessage) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<DiameterMessage>> + Send + 'static,
    {
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            let dict = Arc::clone(&dict);

            match &self.config.native_tls {
                Some(identity) => {
                    let acceptor = native_tls::TlsAcceptor::new(identity.clone())
                        .map_err(|e| crate::error::Error::ServerError(e.to_string()))?;
                    let acceptor = tokio_native_tls::TlsAcceptor::from(acceptor);
                    let stream = acceptor
                        .accept(stream)
                        .await
                        .map_err(|e| crate::error::Error::ServerError(e.to_string()))?;
                    Self::spawn_peer(peer_addr, stream, dict, handler.clone());
                }
                None => {
                    Self::spawn_peer(peer_addr, stream, dict, handler.clone());
                }
            }
        }
    }

    fn spawn_peer<F, Fut, S>(peer_addr: SocketAddr, stream: S, dict: Arc<Dictionary>, handler: F)
    where
        F: Fn(DiameterMessage) -> Fut + Send + 'static,
        Fut: Future<Output = Result<DiameterMessage>> + Send + 'static,
        S: AsyncReadExt + AsyncWriteExt + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            log::info!("[{}] connection established", peer_addr);
            match Self::serve_connection(stream, &dict, handler).await {
                Ok(()) => log::info!("[{}] connection closed", peer_addr),
                Err(e) => log::error!("[{}] connection error: {:?}", peer_addr, e),
            }
        });
    }

    async fn serve_connection<F, Fut, S>(mut stream: S, dict: &Dictionary, handler: F) -> Result<()>
    where
        F: Fn(DiameterMessage) -> Fut,
        Fut: Future<Output = Result<DiameterMessage>>,
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        loop {
            let req = match Codec::decode(&mut stream, dict).await {
                Ok(req) => req,
                Err(crate::error::Error::ReadEof) => return Ok(()),
                Err(e) => return Err(e),
            };

            let res = handler(req).await?;
            Codec::encode(&mut stream, &res).await?;
        }
    }
}
