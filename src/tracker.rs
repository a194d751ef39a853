use std::{
    borrow::Cow,
    str,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use thiserror::Error;
use url::Url;
use urlencoding;

use crate::bencode;
use crate::torrent_file::TorrentFile;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const COMPACT_PEER_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum TrackerUrlError {
    #[error("Invalid announce url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("Announce url is not valid utf-8")]
    NotUtf8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: Option<Vec<u8>>,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub interval: Duration,
    pub min_interval: Option<Duration>,
    pub complete: Option<u64>,
    pub incomplete: Option<u64>,
    pub warning_message: Option<String>,
    pub peers: Vec<Peer>,
}

#[derive(Error, Debug)]
pub enum AnnounceError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Response contains invalid bencode: {0}")]
    InvalidBencode(#[from] bencode::ParseError),
    #[error("Response missing field {0}")]
    MissingField(&'static str),
    #[error("Response contains negative interval")]
    NegativeInterval,
    #[error("Response contains malformed peers")]
    InvalidPeers,
    #[error("Tracker responded with error: {0}")]
    ErrorResponse(String),
}

impl TorrentFile {
    /// Builds the HTTP announce url for this torrent, replacing any query already present in
    /// the announce field.
    ///
    /// `info_hash` and `peer_id` are sent as raw bytes, percent-encoded one byte at a time.
    pub fn build_tracker_url(&self, peer_id: &[u8; 20], port: u16) -> Result<String, TrackerUrlError> {
        let announce = str::from_utf8(self.announce_bytes()).map_err(|_| TrackerUrlError::NotUtf8)?;
        let mut base = Url::parse(announce)?;

        // Keys in ascending order.
        let params: [(&str, Cow<str>); 7] = [
            ("compact", "1".into()),
            ("downloaded", "0".into()),
            ("info_hash", urlencoding::encode_binary(self.info_hash())),
            ("left", self.length().to_string().into()),
            ("peer_id", urlencoding::encode_binary(peer_id)),
            ("port", port.to_string().into()),
            ("uploaded", "0".into()),
        ];
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<String>>()
            .join("&");

        base.set_query(Some(&query));
        Ok(base.into())
    }
}

pub async fn announce(url: &str) -> Result<AnnounceResponse, AnnounceError> {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    tracing::debug!(url, "sending announce");
    let bencode_response = client.get(url).send().await?.error_for_status()?.bytes().await?;
    tracing::debug!(bytes = bencode_response.len(), "tracker responded");

    let response = parse_response(&bencode_response)?;
    if let Some(warning) = &response.warning_message {
        tracing::warn!(warning = %warning, "tracker warning");
    }

    Ok(response)
}

/// Decodes a bencoded tracker reply, accepting both compact and dictionary peer lists.
pub fn parse_response(body: &[u8]) -> Result<AnnounceResponse, AnnounceError> {
    let response_value = bencode::parse(body)?;
    tracing::trace!(response = %response_value, "decoded tracker response");

    let response_dict = response_value
        .as_dictionary()
        .ok_or(AnnounceError::MissingField("root"))?;

    if let Some(failure_reason) = response_dict
        .get("failure reason")
        .and_then(|failure_reason| failure_reason.as_byte_string())
    {
        return Err(AnnounceError::ErrorResponse(
            String::from_utf8_lossy(failure_reason).into_owned(),
        ));
    }

    let interval = response_dict
        .get("interval")
        .and_then(|interval| interval.as_integer())
        .ok_or(AnnounceError::MissingField("interval"))
        .and_then(|interval| u64::try_from(interval).map_err(|_| AnnounceError::NegativeInterval))?;

    let optional_count = |key: &str| {
        response_dict
            .get(key)
            .and_then(|value| value.as_integer())
            .and_then(|value| u64::try_from(value).ok())
    };

    let warning_message = response_dict
        .get("warning message")
        .and_then(|warning| warning.as_byte_string())
        .map(|warning| String::from_utf8_lossy(warning).into_owned());

    let peers_value = response_dict
        .get("peers")
        .ok_or(AnnounceError::MissingField("peers"))?;

    let peers = if let Some(compact) = peers_value.as_byte_string() {
        parse_compact_peers(compact)?
    } else {
        peers_value
            .as_list()
            .ok_or(AnnounceError::InvalidPeers)?
            .iter()
            .map(|peer_value| {
                let peer_dict = peer_value
                    .as_dictionary()
                    .ok_or(AnnounceError::MissingField("peer"))?;

                let id = peer_dict
                    .get("peer id")
                    .and_then(|id| id.as_byte_string())
                    .map(|id| id.to_vec());

                let ip = peer_dict
                    .get("ip")
                    .and_then(|ip| ip.as_str())
                    .ok_or(AnnounceError::MissingField("ip"))?
                    .parse::<IpAddr>()
                    .map_err(|_| AnnounceError::InvalidPeers)?;

                let port = peer_dict
                    .get("port")
                    .and_then(|port| port.as_integer())
                    .ok_or(AnnounceError::MissingField("port"))
                    .and_then(|port| u16::try_from(port).map_err(|_| AnnounceError::InvalidPeers))?;

                Ok(Peer { id, addr: SocketAddr::new(ip, port) })
            })
            .collect::<Result<Vec<Peer>, AnnounceError>>()?
    };

    Ok(AnnounceResponse {
        interval: Duration::from_secs(interval),
        min_interval: optional_count("min interval").map(Duration::from_secs),
        complete: optional_count("complete"),
        incomplete: optional_count("incomplete"),
        warning_message,
        peers,
    })
}

fn parse_compact_peers(compact: &[u8]) -> Result<Vec<Peer>, AnnounceError> {
    if compact.len() % COMPACT_PEER_LEN != 0 {
        return Err(AnnounceError::InvalidPeers);
    }

    Ok(compact
        .chunks_exact(COMPACT_PEER_LEN)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            Peer { id: None, addr: SocketAddr::new(IpAddr::V4(ip), port) }
        })
        .collect())
}
