//! tinyssb-node: the gossip replication daemon.
//!
//! Single OS process running a Tokio runtime with three long-lived tasks
//! (I/O, GOset beacon, ARQ) per §5, wired together in [`main`].

mod config;
mod identity;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use tinyssb_engine::Engine;
use tinyssb_goset::GOset;
use tinyssb_store::Store;
use tinyssb_transport::Link;

use crate::config::NodeConfig;

/// Node-wide shared state handed to every spawned task.
struct NodeState {
    engine: Engine,
    links: Vec<Arc<Link>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl NodeState {
    /// Broadcast `frames` to every open transport.
    fn broadcast(&self, frames: Vec<Vec<u8>>) {
        for frame in frames {
            for link in &self.links {
                link.enqueue(frame.clone());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("tinyssb=info".parse()?),
        )
        .init();

    info!("tinyssb node starting");

    // 1. Load config, ensure the data directory tree exists.
    let config = NodeConfig::load()?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(data_dir.join("_logs"))?;
    std::fs::create_dir_all(data_dir.join("_blob"))?;
    std::fs::create_dir_all(data_dir.join("_backed"))?;

    // 2. Load or generate the node's own signing key.
    let keypair = identity::load_or_generate(&config.signing_key_path())?;
    info!(fid = %hex::encode(keypair.verifying_key().to_bytes()), "node identity ready");

    // 3. Open the log store (reseeds GOset keys, re-arms front-of-feed DMX
    //    handlers per §7 recovery).
    let store = Store::open(&data_dir)?;

    // 4. Construct GOset and re-derive state from the reseeded keys.
    let mut goset = GOset::new();
    for fid in store.known_fids() {
        let mut events = Vec::new();
        goset.add_key(fid, &mut events);
    }

    // 5. Construct the engine, reading pending_chains.json and re-arming
    //    blob handlers.
    let engine = Engine::open(store, goset, &data_dir.join("_backed"))?;

    // 6. Open configured transports.
    let mut links = Vec::new();
    for uri in &config.network.transports {
        match tinyssb_transport::open(uri).await {
            Ok(link) => links.push(Arc::new(link)),
            Err(err) => warn!(%uri, %err, "failed to open transport, skipping"),
        }
    }
    if links.is_empty() {
        warn!("no transports configured or openable; node will run isolated");
    }

    // 7. Shutdown channel.
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    let state = Arc::new(NodeState {
        engine,
        links,
        shutdown_tx: shutdown_tx.clone(),
    });

    // 8. Spawn the three long-lived tasks: one receive loop per link (a
    //    link's own recv may block for arbitrarily long, e.g. a serial
    //    read), a shared send pump, and the GOset/ARQ round tasks.
    let mut io_tasks: Vec<_> = state
        .links
        .iter()
        .cloned()
        .map(|link| tokio::spawn(run_recv_task(state.clone(), link)))
        .collect();
    io_tasks.push(tokio::spawn(run_pump_task(state.clone())));

    let goset_task = tokio::spawn(run_goset_beacon_task(
        state.clone(),
        config.network.goset_round_secs,
    ));
    let arq_task = tokio::spawn(run_arq_task(state.clone(), config.network.arq_round_secs));

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    let _ = shutdown_tx.send(());
    for task in io_tasks {
        task.abort();
    }
    goset_task.abort();
    arq_task.abort();

    info!("tinyssb node stopped");
    Ok(())
}

/// Receive loop for a single link: dispatch every inbound frame through the
/// engine and broadcast any reply frames it produces to every link.
async fn run_recv_task(state: Arc<NodeState>, link: Arc<Link>) {
    loop {
        match link.recv().await {
            Ok(Some(frame)) => match state.engine.on_rx(&frame) {
                Ok(replies) => state.broadcast(replies),
                Err(err) => error!(%err, "engine dispatch failed"),
            },
            Ok(None) => {}
            Err(err) => {
                error!(%err, "transport receive failed");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

/// Drain each link's outbound queue at a steady cadence; transports impose
/// their own duty-cycle gating internally (§4.G).
async fn run_pump_task(state: Arc<NodeState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(200));
    loop {
        interval.tick().await;
        for link in &state.links {
            if let Err(err) = link.pump().await {
                error!(%err, "transport send failed");
            }
        }
    }
}

/// Fixed-interval GOset beacon (§4.E, §5): emit novelty/claims each round.
async fn run_goset_beacon_task(state: Arc<NodeState>, round_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(round_secs));
    loop {
        interval.tick().await;
        let frames = state.engine.run_goset_beacon();
        state.broadcast(frames);
    }
}

/// Fixed-interval ARQ round (§4.F, §5): emit WANT/CHNK for outstanding work.
async fn run_arq_task(state: Arc<NodeState>, round_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(round_secs));
    loop {
        interval.tick().await;
        let frames = state.engine.run_arq_round();
        state.broadcast(frames);
    }
}
