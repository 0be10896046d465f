//! Simultaneous-send UDP hole punching.
//!
//! A [`PunchSession`] owns one socket and runs two loops over it while
//! punching: the probe loop in the [`PunchSession::start`] future sends a
//! probe every `probe_interval`, and a spawned receiver task waits for the
//! first inbound datagram from anyone. Only the receiver moves the session
//! from `Punching` to `Connected`. The receiver is always stopped through a
//! watch channel and joined before `start` returns.

use crate::constants::{PUNCH_ACK_TOKEN, PUNCH_TOKEN};
use crate::duplex::DuplexTransport;
use crate::error::PunchError;
use crate::util::is_transient;
use bytes::Bytes;
use log::{debug, info, warn};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};
use tokio::sync::Notify;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};

const RECV_BUF_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PunchState {
    Idle = 0,
    Punching = 1,
    Connected = 2,
    Failed = 3,
}

impl PunchState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PunchState::Idle,
            1 => PunchState::Punching,
            2 => PunchState::Connected,
            _ => PunchState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PunchState::Connected | PunchState::Failed)
    }
}

impl fmt::Display for PunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PunchState::Idle => "idle",
            PunchState::Punching => "punching",
            PunchState::Connected => "connected",
            PunchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PunchConfig {
    pub probe_interval: Duration,
    pub max_attempts: u32,
    /// Upper bound of one receive wait, the receiver rechecks its stop
    /// signal at least this often.
    pub poll_timeout: Duration,
    pub probe: Bytes,
}

impl PunchConfig {
    pub fn new(probe_interval: Duration, max_attempts: u32) -> Self {
        Self {
            probe_interval,
            max_attempts,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), PunchError> {
        if self.probe_interval.is_zero() {
            return Err(PunchError::InvalidConfig("probe interval is 0".to_string()));
        }
        if self.poll_timeout.is_zero() {
            return Err(PunchError::InvalidConfig("poll timeout is 0".to_string()));
        }
        Ok(())
    }
}

impl Default for PunchConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(400),
            max_attempts: 300,
            poll_timeout: Duration::from_millis(200),
            probe: Bytes::from_static(PUNCH_TOKEN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    Exhausted,
    Aborted,
}

#[derive(Debug, Clone)]
pub enum PunchOutcome {
    Connected {
        /// Source of the first datagram, may differ from the target when
        /// the peer's NAT picked another mapping.
        peer: SocketAddr,
        first_datagram: Bytes,
        attempts: u32,
        elapsed: Duration,
    },
    Failed {
        reason: FailReason,
        attempts: u32,
        elapsed: Duration,
    },
}

impl PunchOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, PunchOutcome::Connected { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PunchOutcome::Connected { attempts, .. } | PunchOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: AtomicU8,
    attempts_sent: AtomicU32,
    connect_transitions: AtomicU32,
}

impl Shared {
    fn state(&self) -> PunchState {
        PunchState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: PunchState, to: PunchState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if moved {
            if to == PunchState::Connected {
                self.connect_transitions.fetch_add(1, Ordering::AcqRel);
            }
            debug!("punch state {} -> {}", from, to);
        }
        moved
    }
}

/// Ends a running [`PunchSession`] early; the outcome is `Failed` with
/// [`FailReason::Aborted`].
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<WatchSender<bool>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

// signals the receiver task on every exit path of `start`, a session whose
// `start` future was dropped mid-punch ends up `Failed`
struct StopGuard {
    tx: WatchSender<bool>,
    shared: Arc<Shared>,
}

impl StopGuard {
    fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.stop();
        self.shared.transition(PunchState::Punching, PunchState::Failed);
    }
}

enum LoopEnd {
    Received,
    Exhausted,
    Aborted,
}

pub struct PunchSession {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    config: PunchConfig,
    shared: Arc<Shared>,
    abort_tx: Arc<WatchSender<bool>>,
    abort_rx: WatchReceiver<bool>,
    connected: Option<(SocketAddr, Bytes)>,
}

impl PunchSession {
    /// Creates an `Idle` session. The peer must be a routable IPv4 endpoint
    /// with a non-zero port.
    pub fn new(
        socket: impl Into<Arc<UdpSocket>>,
        peer: SocketAddr,
        config: PunchConfig,
    ) -> Result<Self, PunchError> {
        check_peer(&peer)?;
        config.validate()?;

        let (abort_tx, abort_rx) = watch::channel(false);

        Ok(Self {
            socket: socket.into(),
            target: peer,
            config,
            shared: Arc::new(Shared::default()),
            abort_tx: Arc::new(abort_tx),
            abort_rx,
            connected: None,
        })
    }

    pub fn state(&self) -> PunchState {
        self.shared.state()
    }

    pub fn attempts_sent(&self) -> u32 {
        self.shared.attempts_sent.load(Ordering::Acquire)
    }

    /// How many times the session entered `Connected`; never more than one.
    pub fn connect_transitions(&self) -> u32 {
        self.shared.connect_transitions.load(Ordering::Acquire)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// The recorded peer once connected.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.connected.as_ref().map(|(addr, _)| *addr)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: self.abort_tx.clone(),
        }
    }

    /// Gives the socket back, e.g. to retry after `Failed`.
    pub fn into_socket(self) -> Arc<UdpSocket> {
        self.socket
    }

    /// Hands the punched socket to the chat transport. Returns the session
    /// unchanged when it is not connected.
    pub fn into_duplex(mut self) -> Result<DuplexTransport, Self> {
        match self.connected.take() {
            Some((peer, first)) => Ok(DuplexTransport::new(self.socket, peer, Some(first))),
            None => Err(self),
        }
    }

    /// Runs `Idle -> Punching -> {Connected | Failed}`. A session runs at
    /// most once, terminal states are final.
    pub async fn start(&mut self) -> Result<PunchOutcome, PunchError> {
        if !self.shared.transition(PunchState::Idle, PunchState::Punching) {
            return Err(PunchError::AlreadyStarted(self.state()));
        }

        info!(
            "punching {} from {:?}, every {:?}, max {} probes",
            self.target,
            self.socket.local_addr(),
            self.config.probe_interval,
            self.config.max_attempts
        );

        let started = Instant::now();
        let (stop_tx, stop_rx) = watch::channel(false);
        let guard = StopGuard {
            tx: stop_tx,
            shared: self.shared.clone(),
        };
        let notify = Arc::new(Notify::new());

        let receiver = tokio::spawn(recv_first(
            self.socket.clone(),
            self.shared.clone(),
            self.config.poll_timeout,
            notify.clone(),
            stop_rx,
        ));

        let ended = self.probe_loop(&notify).await;

        guard.stop();
        let received = match receiver.await {
            Ok(v) => v,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        };

        let attempts = self.attempts_sent();
        let elapsed = started.elapsed();

        match received {
            Ok(Some((peer, first_datagram))) => {
                info!("connected with {} after {} probes, {:?}", peer, attempts, elapsed);
                if peer != self.target {
                    info!("peer answered from {}, not {}", peer, self.target);
                }

                if let Err(e) = self.socket.send_to(PUNCH_ACK_TOKEN, peer).await {
                    warn!("error, punch ack --> {}, {:?}", peer, e);
                }

                self.connected = Some((peer, first_datagram.clone()));
                Ok(PunchOutcome::Connected {
                    peer,
                    first_datagram,
                    attempts,
                    elapsed,
                })
            }
            Ok(None) => {
                self.shared.transition(PunchState::Punching, PunchState::Failed);

                let reason = match ended? {
                    LoopEnd::Aborted => FailReason::Aborted,
                    _ => FailReason::Exhausted,
                };
                info!(
                    "no answer from {} after {} probes, {:?}",
                    self.target, attempts, elapsed
                );

                Ok(PunchOutcome::Failed {
                    reason,
                    attempts,
                    elapsed,
                })
            }
            Err(e) => {
                self.shared.transition(PunchState::Punching, PunchState::Failed);
                Err(e.into())
            }
        }
    }

    async fn probe_loop(&self, notify: &Notify) -> io::Result<LoopEnd> {
        let mut ticker = interval(self.config.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut abort_rx = self.abort_rx.clone();

        if *abort_rx.borrow() {
            return Ok(LoopEnd::Aborted);
        }

        loop {
            tokio::select! {
                biased;

                _ = notify.notified() => {
                    return Ok(LoopEnd::Received);
                },
                _ = abort_rx.changed() => {
                    debug!("recv abort, probe loop will exit.");
                    return Ok(LoopEnd::Aborted);
                },
                _ = ticker.tick() => {
                    // the tick after the last probe is the grace period for a late answer
                    if self.attempts_sent() >= self.config.max_attempts {
                        return Ok(LoopEnd::Exhausted);
                    }
                    self.send_probe().await?;
                }
            }
        }
    }

    async fn send_probe(&self) -> io::Result<()> {
        match self.socket.send_to(&self.config.probe, self.target).await {
            Ok(_) => {}
            Err(e) if is_transient(&e) => {
                warn!("error, probe --> {}, {:?}", self.target, e);
            }
            Err(e) => return Err(e),
        }

        let n = self.shared.attempts_sent.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("probe #{} --> {}", n, self.target);
        Ok(())
    }
}

/// Creates a session and runs it once.
pub async fn punch(
    socket: impl Into<Arc<UdpSocket>>,
    peer: SocketAddr,
    config: PunchConfig,
) -> Result<(PunchSession, PunchOutcome), PunchError> {
    let mut session = PunchSession::new(socket, peer, config)?;
    let outcome = session.start().await?;
    Ok((session, outcome))
}

async fn recv_first(
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
    poll_timeout: Duration,
    notify: Arc<Notify>,
    mut stop_rx: WatchReceiver<bool>,
) -> io::Result<Option<(SocketAddr, Bytes)>> {
    let mut buf = vec![0u8; RECV_BUF_LEN];

    let result = loop {
        if *stop_rx.borrow() {
            break Ok(None);
        }

        tokio::select! {
            r = timeout(poll_timeout, socket.recv_from(&mut buf)) => match r {
                Err(_) => continue,
                Ok(Ok((len, remote_addr))) => {
                    if shared.transition(PunchState::Punching, PunchState::Connected) {
                        debug!("first datagram from {}, len {}", remote_addr, len);
                        break Ok(Some((remote_addr, Bytes::copy_from_slice(&buf[..len]))));
                    }
                    break Ok(None);
                }
                Ok(Err(e)) if is_transient(&e) => {
                    debug!("recv error, {:?}", e);
                    continue;
                }
                Ok(Err(e)) => break Err(e),
            },
            _ = stop_rx.changed() => {
                debug!("recv signal, punch receiver will exit.");
                break Ok(None);
            }
        }
    };

    notify.notify_one();
    result
}

fn check_peer(peer: &SocketAddr) -> Result<(), PunchError> {
    match peer {
        SocketAddr::V4(v4) if v4.port() != 0 && !v4.ip().is_unspecified() => Ok(()),
        _ => Err(PunchError::InvalidPeer(peer.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_once() {
        let shared = Shared::default();
        assert!(shared.transition(PunchState::Idle, PunchState::Punching));
        assert!(shared.transition(PunchState::Punching, PunchState::Connected));
        assert!(!shared.transition(PunchState::Punching, PunchState::Connected));
        assert!(!shared.transition(PunchState::Punching, PunchState::Failed));
        assert_eq!(shared.state(), PunchState::Connected);
        assert_eq!(shared.connect_transitions.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_check_peer() {
        assert!(check_peer(&"203.0.113.5:54321".parse().unwrap()).is_ok());
        assert!(check_peer(&"203.0.113.5:0".parse().unwrap()).is_err());
        assert!(check_peer(&"0.0.0.0:4000".parse().unwrap()).is_err());
        assert!(check_peer(&"[::1]:4000".parse().unwrap()).is_err());
    }

    #[test]
    fn test_state_from_u8() {
        for s in [
            PunchState::Idle,
            PunchState::Punching,
            PunchState::Connected,
            PunchState::Failed,
        ] {
            assert_eq!(PunchState::from_u8(s as u8), s);
        }
        assert!(!PunchState::Punching.is_terminal());
        assert!(PunchState::Failed.is_terminal());
    }
}
