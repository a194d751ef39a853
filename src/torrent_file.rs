use std::{borrow::Cow, collections::HashMap, fs, io::{self, Read}, path::Path};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::bencode::{self, Node};

pub const HASH_LEN: usize = 20;

/// `info` dictionary exactly as found in the torrent file. Strings keep their original bytes,
/// whatever their encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInfo {
    pub pieces: Vec<u8>,
    pub piece_length: i64,
    pub length: i64,
    pub name: Vec<u8>,
}

/// Top-level torrent dictionary exactly as found in the torrent file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTorrent {
    pub announce: Vec<u8>,
    pub info: RawInfo,
}

/// Decoded torrent: tracker, identity hash and piece layout.
///
/// Only [`RawTorrent::to_torrent_file`] creates one, and nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    announce: Vec<u8>,
    info_hash: [u8; HASH_LEN],
    piece_hashes: Vec<[u8; HASH_LEN]>,
    piece_length: i64,
    length: i64,
    name: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Invalid bencode: {0}")]
    Bencode(#[from] bencode::ParseError),
    #[error("Torrent root is not a dictionary")]
    NotADictionary,
    #[error("Field {field} should be a {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("hash data length {0} is not a multiple of 20")]
pub struct MalformedPieces(pub usize);

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("pieces field is empty")]
    PiecesEmpty,
    #[error("{source}")]
    MalformedPieces {
        /// Every field except the piece hashes, which are left empty.
        partial: Box<TorrentFile>,
        source: MalformedPieces,
    },
}

impl BuildError {
    pub fn partial(&self) -> Option<&TorrentFile> {
        match self {
            BuildError::PiecesEmpty => None,
            BuildError::MalformedPieces { partial, .. } => Some(&**partial),
        }
    }
}

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Error of parsing torrent file: {0}")]
    Decode(#[from] DecodeError),
    #[error("Can't convert bencode to torrent: {0}")]
    Build(#[from] BuildError),
}

/// Splits the concatenated `pieces` string into one SHA-1 per piece, in piece order.
pub fn split_piece_hashes(pieces: &[u8]) -> Result<Vec<[u8; HASH_LEN]>, MalformedPieces> {
    if pieces.is_empty() || pieces.len() % HASH_LEN != 0 {
        return Err(MalformedPieces(pieces.len()));
    }

    let mut hashes = Vec::with_capacity(pieces.len() / HASH_LEN);
    for chunk in pieces.chunks_exact(HASH_LEN) {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(chunk);
        hashes.push(hash);
    }

    Ok(hashes)
}

fn bytes_field(dict: &HashMap<String, Node>, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    dict.get(field)
        .map(|node| bytes_of(node, field).map(|bytes| bytes.to_vec()))
        .unwrap_or_else(|| Ok(Vec::new()))
}

fn integer_field(dict: &HashMap<String, Node>, field: &'static str) -> Result<i64, DecodeError> {
    let Some(node) = dict.get(field) else {
        return Ok(0);
    };
    node.as_integer().ok_or(DecodeError::WrongType {
        field,
        expected: "integer",
        found: node.kind(),
    })
}

fn bytes_of<'a>(node: &'a Node, field: &'static str) -> Result<&'a [u8], DecodeError> {
    node.as_byte_string().ok_or(DecodeError::WrongType {
        field,
        expected: "byte string",
        found: node.kind(),
    })
}

impl RawTorrent {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let file = fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads `reader` to the end and decodes it. Missing keys keep their zero value and unknown
    /// keys are ignored.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, DecodeError> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Self::from_bytes(&content)
    }

    pub fn from_bytes(content: &[u8]) -> Result<Self, DecodeError> {
        let root = bencode::parse(content)?;
        let root_dict = root.as_dictionary().ok_or(DecodeError::NotADictionary)?;

        let announce = bytes_field(root_dict, "announce")?;

        let info = match root_dict.get("info") {
            None => RawInfo::default(),
            Some(node) => {
                let info_dict = node.as_dictionary().ok_or(DecodeError::WrongType {
                    field: "info",
                    expected: "dictionary",
                    found: node.kind(),
                })?;

                RawInfo {
                    pieces: bytes_field(info_dict, "pieces")?,
                    piece_length: integer_field(info_dict, "piece length")?,
                    length: integer_field(info_dict, "length")?,
                    name: bytes_field(info_dict, "name")?,
                }
            }
        };

        Ok(RawTorrent { announce, info })
    }

    /// Builds the descriptor.
    ///
    /// The info hash is the SHA-1 of the raw `name` bytes only, not of the bencoded `info`
    /// dictionary, so it will not match the hash real trackers expect.
    pub fn to_torrent_file(&self) -> Result<TorrentFile, BuildError> {
        if self.info.pieces.is_empty() {
            return Err(BuildError::PiecesEmpty);
        }

        let mut info_hash = [0u8; HASH_LEN];
        info_hash.copy_from_slice(&Sha1::digest(&self.info.name));

        let hashes = split_piece_hashes(&self.info.pieces);

        let mut torrent = TorrentFile {
            announce: self.announce.clone(),
            info_hash,
            piece_hashes: Vec::new(),
            piece_length: self.info.piece_length,
            length: self.info.length,
            name: self.info.name.clone(),
        };

        match hashes {
            Ok(hashes) => {
                torrent.piece_hashes = hashes;
                Ok(torrent)
            }
            Err(source) => Err(BuildError::MalformedPieces {
                partial: Box::new(torrent),
                source,
            }),
        }
    }
}

impl TorrentFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Ok(RawTorrent::open(path)?.to_torrent_file()?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, OpenError> {
        Ok(RawTorrent::from_reader(reader)?.to_torrent_file()?)
    }

    /// Announce url for display; invalid utf-8 is replaced.
    pub fn announce(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.announce)
    }

    pub fn announce_bytes(&self) -> &[u8] {
        &self.announce
    }

    pub fn info_hash(&self) -> &[u8; HASH_LEN] {
        &self.info_hash
    }

    pub fn piece_hashes(&self) -> &[[u8; HASH_LEN]] {
        &self.piece_hashes
    }

    pub fn piece_length(&self) -> i64 {
        self.piece_length
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    /// Display name; invalid utf-8 is replaced.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Display name exactly as stored in the torrent, the input of the info hash.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(announce: &str, name: &str, pieces: Vec<u8>) -> RawTorrent {
        RawTorrent {
            announce: announce.as_bytes().to_vec(),
            info: RawInfo {
                pieces,
                piece_length: 512,
                length: 1024,
                name: name.as_bytes().to_vec(),
            },
        }
    }

    #[test]
    fn split_returns_one_hash_per_window() {
        let pieces = (0..60u8).collect::<Vec<u8>>();
        let hashes = split_piece_hashes(&pieces).unwrap();

        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes[1][0], 20);
        assert_eq!(hashes[2][19], 59);
        assert_eq!(hashes.concat(), pieces);
    }

    #[test]
    fn split_rejects_lengths_not_multiple_of_20() {
        for len in [0, 1, 19, 21, 39, 41] {
            assert_eq!(split_piece_hashes(&vec![7u8; len]), Err(MalformedPieces(len)));
        }
    }

    #[test]
    fn decodes_torrent_dictionary() {
        let content = b"d8:announce31:http://tracker.example/announce7:comment3:hey\
4:infod6:lengthi1024e4:name6:sample12:piece lengthi512e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        let raw = RawTorrent::from_bytes(content).unwrap();

        assert_eq!(raw.announce, b"http://tracker.example/announce");
        assert_eq!(raw.info.name, b"sample");
        assert_eq!(raw.info.length, 1024);
        assert_eq!(raw.info.piece_length, 512);
        assert_eq!(raw.info.pieces, vec![b'a'; 20]);
    }

    #[test]
    fn missing_keys_keep_zero_values() {
        let raw = RawTorrent::from_bytes(b"d4:infod4:name1:xee").unwrap();

        assert!(raw.announce.is_empty());
        assert_eq!(raw.info.name, b"x");
        assert_eq!(raw.info.length, 0);
        assert!(raw.info.pieces.is_empty());
    }

    #[test]
    fn truncated_stream_is_a_decode_error() {
        let err = RawTorrent::from_reader(&b"d8:announce3:abc4:infod"[..]).unwrap_err();
        assert!(matches!(err, DecodeError::Bencode(bencode::ParseError::UnexpectedEof)));
    }

    #[test]
    fn wrong_field_types_are_decode_errors() {
        assert!(matches!(
            RawTorrent::from_bytes(b"d8:announcei1ee"),
            Err(DecodeError::WrongType { field: "announce", .. })
        ));
        assert!(matches!(
            RawTorrent::from_bytes(b"d4:infod6:length3:abcee"),
            Err(DecodeError::WrongType { field: "length", .. })
        ));
        assert!(matches!(
            RawTorrent::from_bytes(b"d4:infoi1ee"),
            Err(DecodeError::WrongType { field: "info", .. })
        ));
        assert!(matches!(RawTorrent::from_bytes(b"li1ee"), Err(DecodeError::NotADictionary)));
    }

    #[test]
    fn negative_lengths_are_kept() {
        let raw = RawTorrent::from_bytes(b"d4:infod6:lengthi-1e12:piece lengthi-16384eee").unwrap();

        assert_eq!(raw.info.length, -1);
        assert_eq!(raw.info.piece_length, -16384);
    }

    #[test]
    fn non_utf8_name_is_decoded_and_hashed() {
        let content = b"d8:announce17:http://a/announce4:infod4:name2:\xC4\xE36:pieces20:bbbbbbbbbbbbbbbbbbbbee";
        let torrent = RawTorrent::from_bytes(content).unwrap().to_torrent_file().unwrap();

        let expected = Sha1::digest([0xC4, 0xE3]);
        assert_eq!(&torrent.info_hash()[..], &expected[..]);
        assert_eq!(torrent.name_bytes(), &[0xC4u8, 0xE3]);
        assert_eq!(torrent.name(), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn empty_pieces_are_rejected() {
        let err = raw("http://a/announce", "x", Vec::new()).to_torrent_file().unwrap_err();
        assert!(matches!(err, BuildError::PiecesEmpty));
        assert!(err.partial().is_none());
    }

    #[test]
    fn info_hash_is_sha1_of_name() {
        let torrent = raw("http://a/announce", "sample", vec![0; 20]).to_torrent_file().unwrap();
        let expected = Sha1::digest(b"sample");
        assert_eq!(&torrent.info_hash()[..], &expected[..]);
    }

    #[test]
    fn info_hash_only_depends_on_name() {
        let first = raw("http://a/announce", "same", vec![1; 20]).to_torrent_file().unwrap();
        let second = raw("udp://b:80", "same", vec![2; 40]).to_torrent_file().unwrap();
        assert_eq!(first.info_hash(), second.info_hash());

        let other = raw("http://a/announce", "other", vec![1; 20]).to_torrent_file().unwrap();
        assert_ne!(first.info_hash(), other.info_hash());
    }

    #[test]
    fn malformed_pieces_keep_partial_torrent() {
        let err = raw("http://a/announce", "sample", vec![0; 30]).to_torrent_file().unwrap_err();

        assert_eq!(err.to_string(), "hash data length 30 is not a multiple of 20");
        let partial = err.partial().unwrap();
        assert_eq!(partial.announce(), "http://a/announce");
        assert_eq!(partial.name(), "sample");
        assert_eq!(partial.length(), 1024);
        assert_eq!(partial.piece_length(), 512);
        assert!(partial.piece_hashes().is_empty());
    }
}
