use anyhow::{bail, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

pub const COMPACT_PEER_LEN: usize = 6;

/// One entry of a compact peer list: 4-octet IPv4 address + big-endian port.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Peer(SocketAddrV4);

impl Peer {
    pub fn new(addr: SocketAddrV4) -> Self {
        Self(addr)
    }

    pub fn from_compact_bytes(buf: &[u8]) -> Result<Self> {
        match buf.len() {
            COMPACT_PEER_LEN => Ok(Peer(SocketAddrV4::new(
                Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]),
                ((buf[4] as u16) << 8) | buf[5] as u16,
            ))),
            _ => bail!(
                "Peer::from_compact_bytes: buffer len expected {} found {}",
                COMPACT_PEER_LEN,
                buf.len()
            ),
        }
    }

    pub fn addr(&self) -> &SocketAddrV4 {
        &self.0
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Peer;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn from_compact_bytes() {
        let peer = Peer::from_compact_bytes(&[0x9f, 0x45, 0x41, 0x9d, 0x1a, 0xe7]).unwrap();

        assert_eq!(
            peer,
            Peer::new(SocketAddrV4::new(Ipv4Addr::new(0x9f, 0x45, 0x41, 0x9d), 6887))
        );
    }

    #[test]
    fn from_compact_bytes_wrong_len() {
        assert!(Peer::from_compact_bytes(&[1, 2, 3, 4, 5]).is_err());
        assert!(Peer::from_compact_bytes(&[1, 2, 3, 4, 5, 6, 7]).is_err());
    }
}
