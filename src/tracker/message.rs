use super::error::Error;
use crate::data_structures::{ID, ID_LEN};
use crate::peer::{Peer, COMPACT_PEER_LEN};
use bincode::Options;
use serde::Serialize;

/// Magic connection id every connect request must carry.
pub const PROTOCOL_MAGIC: u64 = 0x41727101980;

const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
const ACTION_ERROR: u32 = 3;

const RESPONSE_HEADER_LEN: usize = 8;
const CONNECT_RESPONSE_LEN: usize = 16;
const ANNOUNCE_RESPONSE_MIN_LEN: usize = 20;

const ACTION_IDX: usize = 0;
const TRANSACTION_ID_IDX: usize = 4;
const CONNECTION_ID_IDX: usize = 8;
const INTERVAL_IDX: usize = 8;
const LEECHERS_IDX: usize = 12;
const SEEDERS_IDX: usize = 16;
const PEERS_IDX: usize = 20;

macro_rules! u32_from_be_slice {
    ($slice:expr) => {
        (($slice[0] as u32) << 24)
            + (($slice[1] as u32) << 16)
            + (($slice[2] as u32) << 8)
            + ($slice[3] as u32)
    };
}

macro_rules! u64_from_be_slice {
    ($slice:expr) => {
        ((u32_from_be_slice!($slice) as u64) << 32) + (u32_from_be_slice!($slice[4..]) as u64)
    };
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

/// Connect request, 16 bytes: magic · action 0 · transaction id.
#[derive(Debug, Serialize)]
pub struct ConnectRequest {
    magic: u64,
    action: u32,
    transaction_id: u32,
}

impl ConnectRequest {
    pub fn new(transaction_id: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            action: ACTION_CONNECT,
            transaction_id,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        wire_options().serialize(&self).unwrap()
    }
}

/// Announce request, 98 bytes. `downloaded`/`uploaded` stay zero and
/// `event` stays "none": a discovery session reports no progress.
#[derive(Debug, Serialize)]
pub struct AnnounceRequest {
    connection_id: u64,
    action: u32,
    transaction_id: u32,
    info_hash: [u8; ID_LEN],
    peer_id: [u8; ID_LEN],
    downloaded: u64,
    left: u64,
    uploaded: u64,
    event: u32,
    ip: u32,
    key: u32,
    num_want: i32,
    port: u16,
}

impl AnnounceRequest {
    pub fn new(
        connection_id: u64,
        transaction_id: u32,
        info_hash: &ID,
        peer_id: &ID,
        left: u64,
        key: u32,
        port: u16,
    ) -> Self {
        Self {
            connection_id,
            action: ACTION_ANNOUNCE,
            transaction_id,
            info_hash: *info_hash.as_array(),
            peer_id: *peer_id.as_array(),
            downloaded: 0,
            left,
            uploaded: 0,
            event: 0,
            ip: 0, // tracker falls back to the datagram's source address
            key,
            num_want: -1, // tracker picks how many peers to return
            port,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        wire_options().serialize(&self).unwrap()
    }
}

/// A decoded tracker datagram.
#[derive(Debug, PartialEq)]
pub enum Response {
    Connect {
        transaction_id: u32,
        connection_id: u64,
    },
    Announce {
        transaction_id: u32,
        interval: u32,
        leechers: u32,
        seeders: u32,
        peers: Vec<Peer>,
    },
    Failure {
        transaction_id: u32,
        message: String,
    },
}

impl Response {
    pub fn from_buf(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < RESPONSE_HEADER_LEN {
            return Err(Error::Parse(format!(
                "response of {} bytes cannot hold action and transaction id",
                buf.len()
            )));
        }

        let action = u32_from_be_slice!(buf[ACTION_IDX..]);
        let transaction_id = u32_from_be_slice!(buf[TRANSACTION_ID_IDX..]);

        match action {
            ACTION_CONNECT => {
                if buf.len() < CONNECT_RESPONSE_LEN {
                    return Err(Error::Parse(format!(
                        "connect response is {} bytes, expected {}",
                        buf.len(),
                        CONNECT_RESPONSE_LEN
                    )));
                }

                Ok(Response::Connect {
                    transaction_id,
                    connection_id: u64_from_be_slice!(buf[CONNECTION_ID_IDX..]),
                })
            }
            ACTION_ANNOUNCE => {
                if buf.len() < ANNOUNCE_RESPONSE_MIN_LEN {
                    return Err(Error::Parse(format!(
                        "announce response is {} bytes, expected at least {}",
                        buf.len(),
                        ANNOUNCE_RESPONSE_MIN_LEN
                    )));
                }

                let peer_bytes = &buf[PEERS_IDX..];
                if peer_bytes.len() % COMPACT_PEER_LEN != 0 {
                    return Err(Error::Parse(format!(
                        "peer list of {} bytes is not divisible into {}-byte entries",
                        peer_bytes.len(),
                        COMPACT_PEER_LEN
                    )));
                }

                let peers = peer_bytes
                    .chunks_exact(COMPACT_PEER_LEN)
                    .map(|chunk| Peer::from_compact_bytes(chunk))
                    .collect::<anyhow::Result<Vec<Peer>>>()
                    .map_err(|e| Error::Parse(e.to_string()))?;

                Ok(Response::Announce {
                    transaction_id,
                    interval: u32_from_be_slice!(buf[INTERVAL_IDX..]),
                    leechers: u32_from_be_slice!(buf[LEECHERS_IDX..]),
                    seeders: u32_from_be_slice!(buf[SEEDERS_IDX..]),
                    peers,
                })
            }
            ACTION_ERROR => Ok(Response::Failure {
                transaction_id,
                message: String::from_utf8_lossy(&buf[RESPONSE_HEADER_LEN..]).into_owned(),
            }),
            unsupported => Err(Error::Protocol(format!("unknown action {unsupported}"))),
        }
    }

    pub fn transaction_id(&self) -> u32 {
        match self {
            Response::Connect { transaction_id, .. } => *transaction_id,
            Response::Announce { transaction_id, .. } => *transaction_id,
            Response::Failure { transaction_id, .. } => *transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn connect_request_layout() {
        let bytes = ConnectRequest::new(0x2b5f9e11).into_bytes();

        assert_eq!(bytes.len(), 16);
        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x04, 0x17, 0x27, 0x10, 0x19, 0x80, // magic
                0x00, 0x00, 0x00, 0x00, // action = connect
                0x2b, 0x5f, 0x9e, 0x11, // transaction id
            ]
        );
    }

    #[test]
    fn announce_request_layout() {
        let info_hash = ID::new([0x11; ID_LEN]);
        let peer_id = ID::new([0x22; ID_LEN]);

        let bytes = AnnounceRequest::new(
            0xc0ffeec0ffee,
            0x0badf00d,
            &info_hash,
            &peer_id,
            3826831360,
            0x5eed,
            6887,
        )
        .into_bytes();

        assert_eq!(bytes.len(), 98);
        assert_eq!(&bytes[0..8], 0xc0ffeec0ffee_u64.to_be_bytes());
        assert_eq!(&bytes[8..12], [0, 0, 0, 1]);
        assert_eq!(&bytes[12..16], 0x0badf00d_u32.to_be_bytes());
        assert_eq!(&bytes[16..36], info_hash.as_byte_ref());
        assert_eq!(&bytes[36..56], peer_id.as_byte_ref());
        assert_eq!(&bytes[56..64], [0; 8]); // downloaded
        assert_eq!(&bytes[64..72], 3826831360_u64.to_be_bytes());
        assert_eq!(&bytes[72..80], [0; 8]); // uploaded
        assert_eq!(&bytes[80..84], [0; 4]); // event = none
        assert_eq!(&bytes[84..88], [0; 4]); // ip = default
        assert_eq!(&bytes[88..92], 0x5eed_u32.to_be_bytes());
        assert_eq!(&bytes[92..96], (-1_i32).to_be_bytes());
        assert_eq!(&bytes[96..98], 6887_u16.to_be_bytes());
    }

    #[test]
    fn connect_response_round_trip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&0x7e57ab1e_u32.to_be_bytes());
        bytes.extend_from_slice(&0x0102030405060708_u64.to_be_bytes());

        let response = Response::from_buf(&bytes).unwrap();

        assert_eq!(
            response,
            Response::Connect {
                transaction_id: 0x7e57ab1e,
                connection_id: 0x0102030405060708,
            }
        );
    }

    #[test]
    fn announce_response_with_three_peers() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&0x7e57ab1e_u32.to_be_bytes());
        bytes.extend_from_slice(&1800_u32.to_be_bytes());
        bytes.extend_from_slice(&3_u32.to_be_bytes());
        bytes.extend_from_slice(&7_u32.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4, 0x1a, 0xe1]); // 1.2.3.4:6881
        bytes.extend_from_slice(&[5, 6, 7, 8, 0xc8, 0xd5]); // 5.6.7.8:51413
        bytes.extend_from_slice(&[9, 10, 11, 12, 0x00, 0x50]); // 9.10.11.12:80

        let response = Response::from_buf(&bytes).unwrap();

        let Response::Announce {
            transaction_id,
            interval,
            leechers,
            seeders,
            peers,
        } = response
        else {
            panic!("expected an announce response");
        };

        assert_eq!(transaction_id, 0x7e57ab1e);
        assert_eq!(interval, 1800);
        assert_eq!(leechers, 3);
        assert_eq!(seeders, 7);
        assert_eq!(
            peers,
            vec![
                Peer::new(SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 6881)),
                Peer::new(SocketAddrV4::new(Ipv4Addr::new(5, 6, 7, 8), 51413)),
                Peer::new(SocketAddrV4::new(Ipv4Addr::new(9, 10, 11, 12), 80)),
            ]
        );
    }

    #[test]
    fn announce_response_with_ragged_peer_list() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&[0; 16]);
        bytes.extend_from_slice(&[1, 2, 3, 4]); // 4 stray bytes

        assert!(matches!(
            Response::from_buf(&bytes),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn short_responses() {
        assert!(matches!(
            Response::from_buf(&[0, 0, 0, 0]),
            Err(Error::Parse(_))
        ));

        // connect action but only 12 bytes
        let mut bytes = vec![0, 0, 0, 0];
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(Response::from_buf(&bytes), Err(Error::Parse(_))));

        // announce action but only 16 bytes
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(&[0; 12]);
        assert!(matches!(Response::from_buf(&bytes), Err(Error::Parse(_))));
    }

    #[test]
    fn failure_carries_tracker_message() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0, 0, 0, 3]);
        bytes.extend_from_slice(&0x7e57ab1e_u32.to_be_bytes());
        bytes.extend_from_slice(b"torrent not registered");

        let response = Response::from_buf(&bytes).unwrap();

        assert_eq!(
            response,
            Response::Failure {
                transaction_id: 0x7e57ab1e,
                message: "torrent not registered".to_string(),
            }
        );
    }

    #[test]
    fn unknown_action() {
        let mut bytes = vec![0, 0, 0, 7];
        bytes.extend_from_slice(&[0; 12]);

        assert!(matches!(
            Response::from_buf(&bytes),
            Err(Error::Protocol(_))
        ));
    }
}
