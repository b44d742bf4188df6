use crate::data_structures::ID;
use crate::ok_or_missing_field;
use anyhow::{anyhow, Result};
use bendy::decoding::{Decoder, FromBencode, Object};
use bendy::encoding::AsString;
use openssl::sha;
use std::collections::HashSet;
use std::fmt;
use std::fs::File as fsFile;
use std::io::Read;

#[derive(Debug)]
pub struct File {
    pub path: Vec<String>,
    pub length: u64,
}

#[derive(Debug)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub pieces: Vec<u8>,
    pub length: Option<u64>,
    pub files: Option<Vec<File>>,
}

/// Decoded metainfo. Immutable once decoded; `info_hash` is computed over
/// the raw bencoded `info` slice exactly as it appeared in the document,
/// which is the canonical encoding (dictionary keys sorted by raw byte).
#[derive(Debug)]
pub struct Torrent {
    pub info: Info,
    pub info_hash: ID,
    pub announce: HashSet<TrackerAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackerAddr {
    Http(String),
    Udp(String),
}

pub fn from_buffer(buffer: &[u8]) -> Result<Torrent> {
    Torrent::from_bencode(buffer).map_err(|e| anyhow!("malformed metainfo: {e}"))
}

pub fn from_file(filename: &str) -> Result<Torrent> {
    let mut buffer = Vec::new();

    let mut file = fsFile::open(filename)?;
    file.read_to_end(&mut buffer)?;

    from_buffer(buffer.as_slice())
}

impl FromBencode for File {
    const EXPECTED_RECURSION_DEPTH: usize = 10;

    fn decode_bencode_object(object: Object) -> Result<Self, bendy::decoding::Error> {
        let mut path = None;
        let mut length = None;

        let mut file = object.try_into_dictionary()?;
        while let Some(kv) = file.next_pair()? {
            match kv {
                (b"path", value) => {
                    path = Some(Vec::<String>::decode_bencode_object(value)?);
                }
                (b"length", value) => {
                    length = Some(u64::decode_bencode_object(value)?);
                }
                _ => (),
            }
        }

        Ok(File {
            path: ok_or_missing_field!(path)?,
            length: ok_or_missing_field!(length)?,
        })
    }
}

impl Info {
    /// Total payload size in bytes: the single `length`, or the sum over
    /// every file entry. Summed in u64, so multi-file sizes are exact up
    /// to the full range of the type.
    pub fn length(&self) -> u64 {
        match &self.files {
            Some(files) => files.iter().map(|f| f.length).sum(),
            None => self.length.unwrap(),
        }
    }
}

impl FromBencode for Info {
    const EXPECTED_RECURSION_DEPTH: usize = 10;

    fn decode_bencode_object(object: Object) -> Result<Self, bendy::decoding::Error> {
        let mut piece_length = None;
        let mut pieces = None;
        let mut length = None;
        let mut name = None;
        let mut files = None;

        let mut info = object.try_into_dictionary()?;
        while let Some(kv) = info.next_pair()? {
            match kv {
                (b"name", value) => {
                    name = Some(String::decode_bencode_object(value)?);
                }
                (b"pieces", value) => {
                    pieces = AsString::decode_bencode_object(value).map(|bytes| Some(bytes.0))?;
                }
                (b"length", value) => {
                    length = Some(u64::decode_bencode_object(value)?);
                }
                (b"piece length", value) => {
                    piece_length = Some(u64::decode_bencode_object(value)?);
                }
                (b"files", value) => {
                    files = Some(Vec::<File>::decode_bencode_object(value)?);
                }
                _ => (),
            }
        }

        if length.is_none() && files.is_none() {
            return Err(bendy::decoding::Error::missing_field("length and files"));
        }

        Ok(Info {
            piece_length: ok_or_missing_field!(piece_length)?,
            pieces: ok_or_missing_field!(pieces)?,
            name: ok_or_missing_field!(name)?,
            length,
            files,
        })
    }
}

impl FromBencode for Torrent {
    const EXPECTED_RECURSION_DEPTH: usize = 10;

    fn decode_bencode_object(object: Object) -> Result<Self, bendy::decoding::Error> {
        let mut info = None;
        let mut info_hash = None;
        let mut announce = HashSet::new();

        let mut torrent = object.try_into_dictionary()?;
        while let Some(kv) = torrent.next_pair()? {
            match kv {
                (b"info", value) => {
                    let bytes = value.try_into_dictionary()?.into_raw()?;

                    let mut hasher = sha::Sha1::new();
                    hasher.update(bytes);
                    info_hash = Some(ID::new(hasher.finish()));

                    let mut decoder = Decoder::new(bytes);
                    let obj = decoder.next_object()?;

                    if let Some(object) = obj {
                        info = Some(Info::decode_bencode_object(object)?);
                    }
                }
                (b"announce", value) => {
                    if let Some(tracker_addr) =
                        TrackerAddr::from_string(String::decode_bencode_object(value)?)
                    {
                        announce.insert(tracker_addr);
                    }
                }
                (b"announce-list", value) => {
                    let list = Vec::<Vec<String>>::decode_bencode_object(value)?;
                    for intermediate in list {
                        for url_string in intermediate {
                            if let Some(tracker_addr) = TrackerAddr::from_string(url_string) {
                                announce.insert(tracker_addr);
                            }
                        }
                    }
                }
                _ => (),
            }
        }

        Ok(Torrent {
            announce: ok_or_missing_field!((!announce.is_empty()).then(|| announce), "announce")?,
            info: ok_or_missing_field!(info)?,
            info_hash: ok_or_missing_field!(info_hash, "info")?,
        })
    }
}

impl TrackerAddr {
    fn from_string(s: String) -> Option<TrackerAddr> {
        if s.starts_with("udp") {
            Some(TrackerAddr::Udp(s))
        } else if s.starts_with("http") {
            Some(TrackerAddr::Http(s))
        } else {
            None
        }
    }
}

impl Torrent {
    pub fn udp_trackers(&self) -> impl Iterator<Item = &String> {
        self.announce.iter().filter_map(|x| match x {
            TrackerAddr::Udp(s) => Some(s),
            _ => None,
        })
    }
}

impl fmt::Display for Torrent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut formatted_files = Vec::new();

        if let Some(files) = &self.info.files {
            for (i, file) in files.iter().enumerate() {
                formatted_files.push(format!(
                    "file_{:?} length:\t{}\tpath:\t{:?}\n",
                    i, file.length, file.path
                ));
            }
        };

        write!(
            f,
            "announce:\t{:?}\n\
            name:\t\t{}\n\
            piece length:\t{:?}\n\
            piece count:\t{:?}\n\
            length:\t\t{}\n\
            {}",
            self.announce,
            self.info.name,
            self.info.piece_length,
            self.info.pieces.len() / 20,
            self.info.length(),
            formatted_files.join(""),
        )
    }
}
