mod cli;

use std::{error::Error, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use torrent_announce::{peer_id, tracker, BuildError, OpenError, TorrentFile};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = cli::Args::parse();

    if let Err(err) = run(args).await {
        tracing::error!("{}", err);
        process::exit(1);
    }
}

async fn run(args: cli::Args) -> Result<(), Box<dyn Error>> {
    let torrent = match TorrentFile::open(&args.torrent) {
        Ok(torrent) => torrent,
        Err(OpenError::Build(err @ BuildError::MalformedPieces { .. })) => {
            if let Some(partial) = err.partial() {
                tracing::warn!(name = %partial.name(), length = partial.length(), "torrent only partially decoded");
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        name = %torrent.name(),
        length = torrent.length(),
        piece_length = torrent.piece_length(),
        pieces = torrent.piece_hashes().len(),
        "opened {}",
        args.torrent.display()
    );

    let peer_id = match &args.peer_id {
        Some(peer_id) => peer_id::parse(peer_id)?,
        None => peer_id::generate(),
    };

    let url = torrent.build_tracker_url(&peer_id, args.port)?;
    println!("{}", url);

    if args.send {
        let response = tracker::announce(&url).await?;
        tracing::info!(
            interval = response.interval.as_secs(),
            seeders = response.complete,
            leechers = response.incomplete,
            "tracker returned {} peers",
            response.peers.len()
        );
        for peer in &response.peers {
            println!("{}", peer.addr);
        }
    }

    Ok(())
}
