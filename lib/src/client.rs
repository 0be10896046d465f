use crate::binding::{decode_binding_response, encode_binding_request, ExternalEndpoint};
use crate::constants::KEEPALIVE_TOKEN;
use crate::error::DiscoveryError;
use crate::util::{new_trans_id, print_bytes};
use log::{debug, info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::watch::Receiver as WatchReceiver;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};

const RECV_BUF_LEN: usize = 2048;

/// Result of a successful discovery. Owns the socket the request was sent
/// from so the same local port can be handed on to the hole punch.
#[derive(Debug)]
pub struct Discovery {
    pub endpoint: ExternalEndpoint,
    pub local_port: u16,
    pub server: SocketAddr,
    socket: UdpSocket,
}

impl Discovery {
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub fn into_socket(self) -> UdpSocket {
        self.socket
    }
}

pub async fn resolve_v4(host: &str, port: u16) -> Result<SocketAddr, DiscoveryError> {
    let mut candidates = lookup_host((host, port))
        .await
        .map_err(|e| DiscoveryError::Resolution(format!("{}:{}, {}", host, port, e)))?;

    candidates
        .find(|x| x.is_ipv4())
        .ok_or_else(|| DiscoveryError::Resolution(format!("{}:{}, no ipv4 address", host, port)))
}

/// Queries `server_host:server_port` for the external endpoint of a freshly
/// bound ephemeral socket, waiting at most `wait` for the answer.
pub async fn discover(
    server_host: &str,
    server_port: u16,
    wait: Duration,
) -> Result<Discovery, DiscoveryError> {
    let server = resolve_v4(server_host, server_port).await?;

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let local_port = socket.local_addr()?.port();
    debug!("local addr: {:?}", socket.local_addr());

    let endpoint = query(&socket, server, wait).await?;
    info!(
        "external endpoint {} via {} (local port {})",
        endpoint, server, local_port
    );

    Ok(Discovery {
        endpoint,
        local_port,
        server,
        socket,
    })
}

/// One binding transaction over an already bound socket.
pub async fn query(
    socket: &UdpSocket,
    server: SocketAddr,
    wait: Duration,
) -> Result<ExternalEndpoint, DiscoveryError> {
    let trans_id = new_trans_id();
    let buf = encode_binding_request(trans_id);
    debug!(
        "{:?} --> {}\n{}",
        socket.local_addr(),
        server,
        print_bytes(&buf, " ", 8)
    );

    let sent = socket.send_to(&buf, server).await?;
    debug!("sent: {}", sent);

    let deadline = Instant::now() + wait;
    let mut recv_buf = vec![0u8; RECV_BUF_LEN];

    loop {
        let (len, remote_addr) = match timeout_at(deadline, socket.recv_from(&mut recv_buf)).await
        {
            Ok(v) => v?,
            Err(_) => {
                return Err(DiscoveryError::Timeout {
                    server: server.to_string(),
                    waited_ms: wait.as_millis(),
                })
            }
        };

        let data = &recv_buf[..len];
        debug!(
            "{:?} <-- {}\n{}",
            socket.local_addr(),
            remote_addr,
            print_bytes(data, " ", 8)
        );

        // a peer may already be punching toward this port
        if remote_addr != server {
            debug!("ignore datagram from {}, waiting for {}", remote_addr, server);
            continue;
        }

        return Ok(decode_binding_response(data, &trans_id)?);
    }
}

/// Sends a small datagram to the STUN server every `every` so the NAT keeps
/// the mapping alive, until `stop_rx` changes. Returns the number of
/// datagrams sent.
pub async fn keep_alive(
    socket: &UdpSocket,
    server: SocketAddr,
    every: Duration,
    mut stop_rx: WatchReceiver<bool>,
) -> u32 {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0_u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match socket.send_to(KEEPALIVE_TOKEN, server).await {
                    Ok(_) => {
                        sent += 1;
                        debug!("keepalive #{} --> {}", sent, server);
                    }
                    Err(e) => {
                        warn!("error, keepalive --> {}, {:?}", server, e);
                    }
                }
            },
            _ = stop_rx.changed() => {
                debug!("recv signal, keep_alive will exit.");
                break;
            }
        }
    }

    sent
}
