//! A single UDP exchange with one upstream nameserver.
//!
//! The caller owns the bookkeeping around an exchange: wrapping it in
//! `start_query` / `end_query` on the tracker and feeding the outcome
//! back as `record_success` (with the measured RTT) or
//! `record_failure`.

use rand::Rng;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use dns_wire::types::{Message, Question};
use dns_wire::{deserialise, serialise};

/// Default per-exchange budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// UDP payload size advertised to upstreams via EDNS0.
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// A response received from an upstream, with its measured round-trip
/// time.  The response is NOT validated beyond matching the query id -
/// consumers must classify it themselves.  A truncated response is
/// returned as-is: this resolver does not retry over TCP.
#[derive(Debug)]
pub struct ExchangeOutcome {
    pub response: Message,
    pub rtt: Duration,
}

/// Send one iterative query to one nameserver and await its response.
pub async fn exchange(
    address: Ipv4Addr,
    port: u16,
    question: &Question,
    budget: Duration,
) -> Result<ExchangeOutcome, ExchangeError> {
    match timeout(budget, exchange_notimeout(address, port, question)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ExchangeError::Timeout),
    }
}

/// Timeout-less version of `exchange`.
async fn exchange_notimeout(
    address: Ipv4Addr,
    port: u16,
    question: &Question,
) -> Result<ExchangeOutcome, ExchangeError> {
    let id = rand::rng().random();
    let request = Message::from_question_with_edns(id, question.clone(), EDNS_PAYLOAD_SIZE);
    let serialised = request.into_octets().map_err(ExchangeError::Serialise)?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(ExchangeError::IO)?;
    socket
        .connect((address, port))
        .await
        .map_err(ExchangeError::IO)?;

    let started = Instant::now();
    socket.send(&serialised).await.map_err(ExchangeError::IO)?;

    let mut buf = vec![0u8; usize::from(EDNS_PAYLOAD_SIZE)];
    loop {
        let size = socket.recv(&mut buf).await.map_err(ExchangeError::IO)?;
        let rtt = started.elapsed();

        match Message::from_octets(&buf[..size]) {
            Ok(response) if response.header.id == id && response.header.is_response => {
                return Ok(ExchangeOutcome { response, rtt });
            }
            Ok(_) => {
                // wrong id or not a response: not ours, keep waiting
                // out the budget rather than crediting a spoofer
                tracing::debug!(%address, "dropping mismatched datagram");
            }
            Err(error) => return Err(ExchangeError::Deserialise(error)),
        }
    }
}

/// How an exchange can fail.
#[derive(Debug)]
pub enum ExchangeError {
    /// No response within the budget.
    Timeout,
    /// A socket operation failed.
    IO(io::Error),
    /// The request could not be serialised.
    Serialise(serialise::Error),
    /// The response could not be parsed.
    Deserialise(deserialise::Error),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExchangeError::Timeout => write!(f, "timed out"),
            ExchangeError::IO(error) => write!(f, "i/o error: {error}"),
            ExchangeError::Serialise(error) => write!(f, "could not serialise request: {error}"),
            ExchangeError::Deserialise(error) => write!(f, "could not parse response: {error}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExchangeError::Timeout => None,
            ExchangeError::IO(error) => Some(error),
            ExchangeError::Serialise(error) => Some(error),
            ExchangeError::Deserialise(error) => Some(error),
        }
    }
}
