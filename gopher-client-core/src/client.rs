use async_trait::async_trait;
use std::future::{pending, Future};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::gopher::{
    decode_text, parse_menu, validate, validate_selector, GopherError, GopherLine, ItemType,
    TransactionResult,
};

const READ_CHUNK_SIZE: usize = 4096;

/// Opens the byte stream a single transaction runs over.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, hostname: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP, resolving `hostname` through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, hostname: &str, port: u16) -> io::Result<TcpStream> {
        TcpStream::connect((hostname, port)).await
    }
}

/// Deadlines applied to every transaction. `None` means wait indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactOptions {
    /// Limit on resolving and connecting.
    pub connect_timeout: Option<Duration>,
    /// Limit on the whole round trip, connect included.
    pub timeout: Option<Duration>,
}

/// Gopher client. Holds only its connector and deadlines; every call opens
/// and closes its own connection.
#[derive(Debug, Clone, Default)]
pub struct GopherClient<C = TcpConnector> {
    connector: C,
    options: TransactOptions,
}

impl GopherClient<TcpConnector> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Connector> GopherClient<C> {
    pub fn with_connector(connector: C) -> Self {
        GopherClient {
            connector,
            options: TransactOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransactOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> TransactOptions {
        self.options
    }

    /// Runs one request/response cycle and interprets the body according to
    /// `item_type`.
    pub async fn transact(
        &self,
        hostname: &str,
        port: u16,
        selector: &str,
        item_type: ItemType,
    ) -> Result<TransactionResult, GopherError> {
        self.transact_until(hostname, port, selector, item_type, pending())
            .await
    }

    /// Like [`transact`](Self::transact), but gives up with
    /// [`GopherError::Cancelled`] as soon as `cancel` completes. The
    /// connection is dropped on the spot.
    pub async fn transact_until<F>(
        &self,
        hostname: &str,
        port: u16,
        selector: &str,
        item_type: ItemType,
        cancel: F,
    ) -> Result<TransactionResult, GopherError>
    where
        F: Future<Output = ()>,
    {
        validate_selector(selector)?;
        let request = format!("{}\r\n", selector);
        let raw = self.exchange(hostname, port, &request, cancel).await?;
        let result = TransactionResult::from_response(raw, item_type, hostname, port)?;
        debug!(host = %hostname, port, item_type = %item_type, "Transaction complete");
        Ok(result)
    }

    pub async fn fetch_menu(
        &self,
        hostname: &str,
        port: u16,
        selector: &str,
    ) -> Result<Vec<GopherLine>, GopherError> {
        validate_selector(selector)?;
        let raw = self
            .exchange(hostname, port, &format!("{}\r\n", selector), pending())
            .await?;
        parse_menu(&decode_text(raw), hostname, port)
    }

    pub async fn fetch_text(
        &self,
        hostname: &str,
        port: u16,
        selector: &str,
    ) -> Result<String, GopherError> {
        validate_selector(selector)?;
        let raw = self
            .exchange(hostname, port, &format!("{}\r\n", selector), pending())
            .await?;
        Ok(decode_text(raw))
    }

    /// Queries a full-text search server (item type `7`). The result is a
    /// menu like any other.
    pub async fn search(
        &self,
        hostname: &str,
        port: u16,
        selector: &str,
        query: &str,
    ) -> Result<Vec<GopherLine>, GopherError> {
        validate_selector(selector)?;
        validate("query", query)?;
        let raw = self
            .exchange(
                hostname,
                port,
                &format!("{}\t{}\r\n", selector, query),
                pending(),
            )
            .await?;
        parse_menu(&decode_text(raw), hostname, port)
    }

    async fn exchange<F>(
        &self,
        hostname: &str,
        port: u16,
        request: &str,
        cancel: F,
    ) -> Result<Vec<u8>, GopherError>
    where
        F: Future<Output = ()>,
    {
        let round_trip = async {
            match self.options.timeout {
                Some(limit) => timeout(limit, self.round_trip(hostname, port, request))
                    .await
                    .map_err(|_| GopherError::Timeout(limit))?,
                None => self.round_trip(hostname, port, request).await,
            }
        };

        tokio::select! {
            result = round_trip => result,
            _ = cancel => {
                debug!(host = %hostname, port, "Transaction cancelled");
                Err(GopherError::Cancelled)
            }
        }
    }

    async fn round_trip(
        &self,
        hostname: &str,
        port: u16,
        request: &str,
    ) -> Result<Vec<u8>, GopherError> {
        debug!(host = %hostname, port, "Connecting");
        let connect = self.connector.connect(hostname, port);
        let connected = match self.options.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| GopherError::Timeout(limit))?,
            None => connect.await,
        };
        let mut stream = connected.map_err(|source| GopherError::Connect {
            addr: format!("{}:{}", hostname, port),
            source,
        })?;

        debug!(host = %hostname, port, bytes = request.len(), "Sending selector");
        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;

        debug!(host = %hostname, port, "Receiving");
        let mut buffer = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            trace!(read, "Read chunk");
            buffer.extend_from_slice(&chunk[..read]);
        }

        debug!(host = %hostname, port, bytes = buffer.len(), "Peer closed connection");
        Ok(buffer)
    }
}

/// Single transaction over plain TCP with no deadline.
pub async fn transact(
    hostname: &str,
    port: u16,
    selector: &str,
    item_type: ItemType,
) -> Result<TransactionResult, GopherError> {
    GopherClient::new()
        .transact(hostname, port, selector, item_type)
        .await
}
