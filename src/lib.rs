//! Turns a `.torrent` file into the HTTP announce url a tracker expects.
//!
//! ```no_run
//! use torrent_announce::{peer_id, TorrentFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = TorrentFile::open("data.torrent")?;
//! let url = torrent.build_tracker_url(&peer_id::generate(), 6881)?;
//! println!("{}", url);
//! # Ok(())
//! # }
//! ```

pub mod bencode;
pub mod peer_id;
pub mod torrent_file;
pub mod tracker;

pub use torrent_file::{
    split_piece_hashes, BuildError, DecodeError, MalformedPieces, OpenError, RawInfo, RawTorrent,
    TorrentFile,
};
pub use tracker::{AnnounceError, AnnounceResponse, Peer, TrackerUrlError};
