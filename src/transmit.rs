//! UDP transmitter for handing ADIF records to a logging program.
//!
//! Each record goes out as exactly one datagram. Delivery is best-effort:
//! nothing is read back and nothing is retried.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default UDP port Log4OM listens on for ADIF records.
pub const DEFAULT_ADIF_PORT: u16 = 2234;

/// Upper bound on a single send, including socket setup.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while transmitting a record.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("Invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    #[error("Connection timeout - check IP and port settings")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),
}

/// Sends encoded records to a fixed UDP endpoint.
#[derive(Debug, Clone)]
pub struct Transmitter {
    target: SocketAddr,
    send_timeout: Duration,
}

impl Transmitter {
    /// Create a transmitter for the given IPv4 address and port.
    pub fn new(address: &str, port: u16) -> Result<Self, TransmitError> {
        let ip: Ipv4Addr = address
            .trim()
            .parse()
            .map_err(|_| TransmitError::InvalidAddress(address.to_string()))?;

        Ok(Self {
            target: SocketAddr::V4(SocketAddrV4::new(ip, port)),
            send_timeout: SEND_TIMEOUT,
        })
    }

    /// Override the send timeout.
    pub fn with_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// The endpoint records are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one record as a single datagram.
    ///
    /// Returns once the datagram has been handed to the OS, or fails with
    /// [`TransmitError::Timeout`] if that takes longer than the send timeout.
    pub async fn send(&self, record: &str) -> Result<(), TransmitError> {
        debug!("Sending {} bytes to {}", record.len(), self.target);

        bounded(self.send_timeout, self.send_datagram(record.as_bytes())).await?;

        info!("Record sent to {}", self.target);
        Ok(())
    }

    async fn send_datagram(&self, payload: &[u8]) -> Result<(), TransmitError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let sent = socket.send_to(payload, self.target).await?;
        if sent != payload.len() {
            return Err(TransmitError::Network(std::io::Error::other(format!(
                "short send: {} of {} bytes",
                sent,
                payload.len()
            ))));
        }
        Ok(())
    }
}

/// Run `operation`, failing with [`TransmitError::Timeout`] once `limit` elapses.
async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, TransmitError>>,
) -> Result<T, TransmitError> {
    timeout(limit, operation)
        .await
        .map_err(|_| TransmitError::Timeout)?
}
