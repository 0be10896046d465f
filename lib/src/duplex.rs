use crate::constants::is_reserved_token;
use bytes::Bytes;
use log::debug;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

const RECV_BUF_LEN: usize = 64 * 1024;

/// Plain datagram channel over a punched socket. One line or message per
/// datagram, no framing, no ordering, no acknowledgement.
pub struct DuplexTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    pending: Option<Bytes>,
    buf: Vec<u8>,
}

impl DuplexTransport {
    /// `first` is the datagram that completed the punch. It is delivered by
    /// the first `recv` unless it is a punch token.
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr, first: Option<Bytes>) -> Self {
        let pending = first.filter(|x| !is_reserved_token(x));
        Self {
            socket,
            peer,
            pending,
            buf: vec![0u8; RECV_BUF_LEN],
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn sender(&self) -> DuplexSender {
        DuplexSender {
            socket: self.socket.clone(),
            peer: self.peer,
        }
    }

    /// Next inbound message and its sender. Late punch probes are skipped.
    pub async fn recv(&mut self) -> io::Result<(SocketAddr, Bytes)> {
        if let Some(data) = self.pending.take() {
            return Ok((self.peer, data));
        }

        loop {
            let (len, remote_addr) = self.socket.recv_from(&mut self.buf).await?;
            let data = &self.buf[..len];

            if is_reserved_token(data) {
                debug!("skip punch token from {}", remote_addr);
                continue;
            }

            return Ok((remote_addr, Bytes::copy_from_slice(data)));
        }
    }
}

#[derive(Debug, Clone)]
pub struct DuplexSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl DuplexSender {
    pub async fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, self.peer).await
    }

    /// Sends one line without its line terminator.
    pub async fn send_line(&self, line: &str) -> io::Result<usize> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        self.send(line.as_bytes()).await
    }
}
