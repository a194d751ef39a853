use rand::Rng;
use thiserror::Error;

pub const PEER_ID_LEN: usize = 20;

// Azureus-style client tag: -TA0100-
const CLIENT_PREFIX: &[u8; 8] = b"-TA0100-";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("peer id must be exactly 20 bytes, got {0}")]
pub struct InvalidPeerId(pub usize);

/// Fresh peer id for this session: the client prefix followed by printable random bytes.
pub fn generate() -> [u8; PEER_ID_LEN] {
    let mut id = [0u8; PEER_ID_LEN];
    id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);

    let mut rng = rand::thread_rng();
    for byte in &mut id[CLIENT_PREFIX.len()..] {
        *byte = rng.gen_range(33..=126);
    }

    id
}

pub fn parse(value: &str) -> Result<[u8; PEER_ID_LEN], InvalidPeerId> {
    value
        .as_bytes()
        .try_into()
        .map_err(|_| InvalidPeerId(value.len()))
}
