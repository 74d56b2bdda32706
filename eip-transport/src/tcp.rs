//! TCP transport implementation

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use eip_core::{EipError, EipResult, EIP_TCP_PORT};
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// `host:port` of the target; the EtherNet/IP port is assumed when omitted
    pub address: String,
    /// Deadline applied to connect, each read and each write
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: &str) -> Self {
        Self {
            address: with_default_port(address),
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(address: &str, timeout: Duration) -> Self {
        Self {
            address: with_default_port(address),
            timeout: Some(timeout),
        }
    }
}

/// Append the standard EtherNet/IP port to an address that has none
pub fn with_default_port(address: &str) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    let has_port = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.contains(':') && port.parse::<u16>().is_ok());
    if has_port {
        address.to_string()
    } else {
        format!("{}:{}", address, EIP_TCP_PORT)
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> Self {
        Self::new(TcpSettings::new(address))
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> EipResult<&mut DebugTcpStream> {
        self.stream.as_mut().ok_or(EipError::NotConnected)
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> EipResult<()> {
        if !self.closed {
            return Err(EipError::Connect(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let address = self.settings.address.as_str();
        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| {
                    EipError::Connect(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("connect to {} timed out", address),
                    ))
                })?
                .map_err(EipError::Connect)?
        } else {
            TcpStream::connect(address).await.map_err(EipError::Connect)?
        };
        // frames are written whole; do not let Nagle hold back the tail
        stream.set_nodelay(true).map_err(EipError::Connect)?;

        log::debug!("TCP connection to {} established", address);
        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> EipResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> EipResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let result = if let Some(timeout) = timeout {
            match tokio::time::timeout(timeout, stream.read(buf)).await {
                Ok(r) => r.map_err(EipError::Io),
                Err(_) => return Err(EipError::timed_out("read")),
            }
        } else {
            stream.read(buf).await.map_err(EipError::Io)
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> EipResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| EipError::timed_out("write"))?
                .map_err(EipError::Io)
        } else {
            stream.write(buf).await.map_err(EipError::Io)
        }
    }

    async fn flush(&mut self) -> EipResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(EipError::Io)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> EipResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
