use super::error::Error;
use super::message::{AnnounceRequest, ConnectRequest, Response};
use crate::data_structures::ID;
use crate::identity::PeerId;
use crate::metainfo::Torrent;
use crate::peer::Peer;
use crate::shutdown;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// BEP 15 retransmit schedule: 15 * 2^n seconds, at most 8 retransmits,
/// counted across both phases of the handshake.
const RETRY_BASE_SECS: u64 = 15;
const MAX_RETRANSMITS: u32 = 8;

/// A connection id older than this is stale and the handshake restarts.
const CONNECTION_ID_TTL: Duration = Duration::from_secs(60);

const TRACKER_MTU: usize = 1300;

/// What an announce exchange yields: swarm statistics and the peer list.
#[derive(Debug)]
pub struct Swarm {
    pub interval: u32,
    pub leechers: u32,
    pub seeders: u32,
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitingConnect,
    AwaitingAnnounce {
        connection_id: u64,
        connected_at: Instant,
    },
}

#[derive(Debug)]
enum Step {
    Transmit(Vec<u8>),
    Deliver(Swarm),
    Fail(Error),
    Ignore,
}

/// The connect→announce state machine, separated from the socket so every
/// transition can be driven deterministically. Exactly one request is in
/// flight at a time; the current `transaction_id` names it, and datagrams
/// carrying any other id fall through without touching the state.
#[derive(Debug)]
struct Machine {
    state: State,
    transaction_id: u32,
    retransmits: u32,
    info_hash: ID,
    peer_id: ID,
    left: u64,
    key: u32,
    port: u16,
}

impl Machine {
    fn new(info_hash: ID, peer_id: ID, left: u64, port: u16) -> Self {
        Self {
            state: State::AwaitingConnect,
            transaction_id: rand::random(),
            retransmits: 0,
            info_hash,
            peer_id,
            left,
            key: rand::random(),
            port,
        }
    }

    fn start(&self) -> Vec<u8> {
        self.connect_request()
    }

    /// Seconds the in-flight request gets before it is declared lost.
    fn timeout(&self) -> Duration {
        Duration::from_secs(RETRY_BASE_SECS << self.retransmits)
    }

    fn connect_request(&self) -> Vec<u8> {
        ConnectRequest::new(self.transaction_id).into_bytes()
    }

    fn announce_request(&self, connection_id: u64) -> Vec<u8> {
        AnnounceRequest::new(
            connection_id,
            self.transaction_id,
            &self.info_hash,
            &self.peer_id,
            self.left,
            self.key,
            self.port,
        )
        .into_bytes()
    }

    fn on_datagram(&mut self, buf: &[u8], now: Instant) -> Step {
        let response = match Response::from_buf(buf) {
            Ok(response) => response,
            Err(e) => return Step::Fail(e),
        };

        if response.transaction_id() != self.transaction_id {
            debug!("transaction id mismatch, datagram dropped");
            return Step::Ignore;
        }

        match response {
            Response::Failure { message, .. } => Step::Fail(Error::Protocol(message)),
            Response::Connect { connection_id, .. } => match self.state {
                State::AwaitingConnect => {
                    self.state = State::AwaitingAnnounce {
                        connection_id,
                        connected_at: now,
                    };
                    self.transaction_id = rand::random();
                    Step::Transmit(self.announce_request(connection_id))
                }
                State::AwaitingAnnounce { .. } => Step::Fail(Error::Protocol(
                    "connect response while an announce was pending".to_string(),
                )),
            },
            Response::Announce {
                interval,
                leechers,
                seeders,
                peers,
                ..
            } => match self.state {
                State::AwaitingAnnounce { .. } => Step::Deliver(Swarm {
                    interval,
                    leechers,
                    seeders,
                    peers,
                }),
                State::AwaitingConnect => Step::Fail(Error::Protocol(
                    "announce response while a connect was pending".to_string(),
                )),
            },
        }
    }

    fn on_timeout(&mut self, now: Instant) -> Step {
        if self.retransmits >= MAX_RETRANSMITS {
            return Step::Fail(Error::Timeout);
        }

        self.retransmits += 1;
        self.transaction_id = rand::random();

        match self.state {
            State::AwaitingConnect => Step::Transmit(self.connect_request()),
            State::AwaitingAnnounce { connected_at, .. }
                if now.duration_since(connected_at) > CONNECTION_ID_TTL =>
            {
                // stale connection id, redo the handshake
                self.state = State::AwaitingConnect;
                Step::Transmit(self.connect_request())
            }
            State::AwaitingAnnounce { connection_id, .. } => {
                Step::Transmit(self.announce_request(connection_id))
            }
        }
    }
}

/// One discovery exchange against one tracker. Owns its UDP socket for the
/// whole session; events (datagram, retransmit deadline, shutdown) are
/// handled one at a time on the session task.
pub struct Session;

pub struct SessionHandle {
    swarm: oneshot::Receiver<Result<Swarm, Error>>,
}

impl SessionHandle {
    /// Resolves exactly once. A session aborted by shutdown resolves with
    /// `Error::Aborted` and never delivers a late result.
    pub async fn swarm(self) -> Result<Swarm, Error> {
        self.swarm.await.unwrap_or(Err(Error::Aborted))
    }
}

impl Session {
    pub fn start(
        tracker_url: String,
        torrent: &Torrent,
        peer_id: &PeerId,
        port: u16,
        mut shutdown: shutdown::Receiver,
    ) -> SessionHandle {
        let (deliver, swarm) = oneshot::channel();
        let machine = Machine::new(
            torrent.info_hash,
            *peer_id.id(),
            torrent.info.length(),
            port,
        );

        tokio::spawn(async move {
            tokio::select! {
                result = run(&tracker_url, machine) => {
                    if let Err(e) = &result {
                        warn!("tracker session failed: {e}");
                    }
                    let _ = deliver.send(result);
                }
                _ = shutdown.recv() => {
                    debug!("session shut down before settling");
                }
            }
        });

        SessionHandle { swarm }
    }
}

#[instrument(skip(machine))]
async fn run(tracker: &str, mut machine: Machine) -> Result<Swarm, Error> {
    let tracker_addr = resolve(tracker).await?;

    let sock = UdpSocket::bind("0.0.0.0:0").await.map_err(Error::Network)?;
    sock.connect(tracker_addr).await.map_err(Error::Network)?;

    let mut buf = vec![0u8; 2 * TRACKER_MTU];
    let mut request = machine.start();

    // transport errors (icmp unreachable and friends) count as lost
    // packets: retried on the retransmit schedule, surfaced only once the
    // budget runs out
    let mut transport_error = None;

    loop {
        if let Err(e) = sock.send(&request).await {
            warn!("send failed: {e}");
            transport_error = Some(e);
        }
        let deadline = tokio::time::Instant::now() + machine.timeout();

        let step = loop {
            tokio::select! {
                received = sock.recv(&mut buf) => {
                    match received {
                        Ok(len) => match machine.on_datagram(&buf[..len], Instant::now()) {
                            Step::Ignore => continue,
                            step => break step,
                        },
                        Err(e) => {
                            warn!("recv failed: {e}");
                            transport_error = Some(e);
                            tokio::time::sleep_until(deadline).await;
                            break machine.on_timeout(Instant::now());
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    break machine.on_timeout(Instant::now());
                }
            }
        };

        match step {
            Step::Transmit(next) => {
                debug!(retransmits = machine.retransmits, "transmitting");
                request = next;
            }
            Step::Deliver(swarm) => return Ok(swarm),
            Step::Fail(Error::Timeout) => {
                return Err(match transport_error.take() {
                    Some(e) => Error::Network(e),
                    None => Error::Timeout,
                })
            }
            Step::Fail(error) => return Err(error),
            Step::Ignore => unreachable!("ignored datagrams stay in the receive loop"),
        }
    }
}

async fn resolve(tracker: &str) -> Result<SocketAddr, Error> {
    let rest = tracker
        .strip_prefix("udp://")
        .ok_or_else(|| Error::Protocol(format!("not a udp tracker url: {tracker}")))?;
    let host_port = rest.split('/').next().unwrap_or(rest);

    lookup_host(host_port)
        .await
        .map_err(Error::Network)?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            Error::Network(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no ipv4 address for {host_port}"),
            ))
        })
}
