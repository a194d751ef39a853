use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build (and optionally send) a tracker announce for a torrent file")]
pub struct Args {
    /// Path to the torrent file
    #[arg(default_value = "data.torrent")]
    pub torrent: PathBuf,

    /// Port reported to the tracker
    #[arg(short, long, default_value_t = 6881)]
    pub port: u16,

    /// 20 byte peer id, generated when omitted
    #[arg(long)]
    pub peer_id: Option<String>,

    /// Send the announce and print the peers the tracker returns
    #[arg(long)]
    pub send: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["torrent-announce"]).unwrap();
        assert_eq!(args.torrent, PathBuf::from("data.torrent"));
        assert_eq!(args.port, 6881);
        assert!(args.peer_id.is_none());
        assert!(!args.send);
    }

    #[test]
    fn explicit_flags() {
        let args = Args::try_parse_from([
            "torrent-announce",
            "linux.torrent",
            "--port",
            "51413",
            "--peer-id",
            "-XX0001-abcdefghijkl",
            "--send",
        ])
        .unwrap();
        assert_eq!(args.torrent, PathBuf::from("linux.torrent"));
        assert_eq!(args.port, 51413);
        assert_eq!(args.peer_id.as_deref(), Some("-XX0001-abcdefghijkl"));
        assert!(args.send);
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert!(Args::try_parse_from(["torrent-announce", "--port", "70000"]).is_err());
    }
}
