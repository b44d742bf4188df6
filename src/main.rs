pub mod config;
pub mod data_structures;
pub mod identity;
pub mod macros;
pub mod metainfo;
pub mod peer;
pub mod shutdown;
pub mod tracker;

use anyhow::{bail, Result};
use futures::future;
use identity::PeerId;
use std::collections::HashSet;
use tracker::Session;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::new();
    let torrent = metainfo::from_file(&config.file)?;
    info!("{torrent}");

    let peer_id = PeerId::generate();
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let handles: Vec<_> = torrent
        .udp_trackers()
        .map(|tracker| {
            Session::start(
                tracker.clone(),
                &torrent,
                &peer_id,
                config.port,
                shutdown_rx.clone(),
            )
        })
        .collect();
    drop(shutdown_rx);

    if handles.is_empty() {
        bail!("{} does not name any udp trackers", config.file);
    }

    let results = tokio::select! {
        results = future::join_all(handles.into_iter().map(|handle| handle.swarm())) => results,
        _ = tokio::signal::ctrl_c() => {
            shutdown_tx.shutdown().await;
            return Ok(());
        }
    };

    let mut peers = HashSet::new();
    for result in results {
        match result {
            Ok(swarm) => {
                info!(
                    interval = swarm.interval,
                    seeders = swarm.seeders,
                    leechers = swarm.leechers,
                    "tracker answered"
                );
                peers.extend(swarm.peers);
            }
            Err(e) => warn!("{e}"),
        }
    }

    let mut peers: Vec<_> = peers.into_iter().collect();
    peers.sort_by_key(|peer| *peer.addr());

    for peer in &peers {
        println!("{peer}");
    }

    Ok(())
}
